//! OpenAI-compatible chat-completions client
//!
//! One client serves both callers: the preprocessor uses plain completions
//! for chunk titles/descriptions, the agent uses SSE streaming with tool
//! calls. Requests are sequential; there is no retry or backoff, a failed
//! call surfaces to the caller.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4.1-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors from the LLM client
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("LLM API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

/// Client configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl LlmConfig {
    /// Read `OPENAI_API_KEY` (required), `OPENAI_BASE_URL` and `LLM_MODEL`
    /// (optional) from the environment, honoring `.env` files.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| LlmError::MissingApiKey)?;

        Ok(Self {
            api_key,
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }
}

/// A chat message in OpenAI wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain("assistant", content)
    }

    /// Assistant turn that requested tool invocations.
    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Tool result message answering a specific tool call.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A complete tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them
    pub arguments: String,
}

/// The assembled outcome of one streamed model turn.
#[derive(Debug, Clone, Default)]
pub struct ChatTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a serde_json::Value>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

/// Extract the payload of one SSE line; `None` for keep-alives, comments
/// and the `[DONE]` sentinel.
fn sse_payload(line: &str) -> Option<&str> {
    let payload = line.trim().strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        None
    } else {
        Some(payload)
    }
}

/// Accumulator merging streamed tool-call fragments by index.
#[derive(Default)]
struct ToolCallAssembler {
    partial: BTreeMap<usize, (String, String, String)>,
}

impl ToolCallAssembler {
    fn apply(&mut self, delta: ToolCallDelta) {
        let entry = self.partial.entry(delta.index).or_default();
        if let Some(id) = delta.id {
            entry.0 = id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                entry.1.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                entry.2.push_str(&arguments);
            }
        }
    }

    fn finish(self) -> Vec<ToolCall> {
        self.partial
            .into_values()
            .map(|(id, name, arguments)| ToolCall {
                id,
                kind: "function".to_string(),
                function: FunctionCall { name, arguments },
            })
            .collect()
    }
}

/// Chat-completions client over reqwest.
pub struct ChatClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LlmConfig::from_env()?)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Single non-streaming completion; returns the first choice's text.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            tools: None,
            stream: false,
        };

        debug!("Completion request ({} messages)", messages.len());

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("response carried no choices".to_string()))
    }

    /// Streamed completion with optional tools.
    ///
    /// Text deltas are handed to `on_delta` as they arrive; tool-call
    /// fragments are assembled and returned with the finished turn.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&serde_json::Value>,
        mut on_delta: impl FnMut(&str),
    ) -> Result<ChatTurn> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            tools,
            stream: true,
        };

        debug!("Streaming request ({} messages)", messages.len());

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let mut turn = ChatTurn::default();
        let mut assembler = ToolCallAssembler::default();
        let mut buffer = String::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=pos).collect();
                let Some(payload) = sse_payload(&line) else {
                    continue;
                };

                let parsed: StreamChunk = serde_json::from_str(payload)
                    .map_err(|e| LlmError::Parse(format!("bad stream payload: {}", e)))?;

                for choice in parsed.choices {
                    if let Some(text) = choice.delta.content {
                        on_delta(&text);
                        turn.content.push_str(&text);
                    }
                    if let Some(deltas) = choice.delta.tool_calls {
                        for delta in deltas {
                            assembler.apply(delta);
                        }
                    }
                    if choice.finish_reason.is_some() {
                        turn.finish_reason = choice.finish_reason;
                    }
                }
            }
        }

        turn.tool_calls = assembler.finish();
        Ok(turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_payload_extraction() {
        assert_eq!(sse_payload("data: {\"x\":1}"), Some("{\"x\":1}"));
        assert_eq!(sse_payload("data: [DONE]"), None);
        assert_eq!(sse_payload(""), None);
        assert_eq!(sse_payload(": keep-alive"), None);
    }

    #[test]
    fn test_stream_chunk_parses_content_delta() {
        let payload = r#"{"choices":[{"delta":{"content":"مرح"},"finish_reason":null}]}"#;
        let chunk: StreamChunk = serde_json::from_str(payload).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("مرح"));
        assert!(chunk.choices[0].finish_reason.is_none());
    }

    #[test]
    fn test_tool_call_fragments_assemble_in_order() {
        let mut assembler = ToolCallAssembler::default();

        let first: StreamChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"tool_calls":[
                {"index":0,"id":"call_1","function":{"name":"search_knowledge_graph","arguments":""}}
            ]},"finish_reason":null}]}"#,
        )
        .unwrap();
        let second: StreamChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"tool_calls":[
                {"index":0,"function":{"arguments":"{\"query\":\"النحو\"}"}}
            ]},"finish_reason":"tool_calls"}]}"#,
        )
        .unwrap();

        for chunk in [first, second] {
            for choice in chunk.choices {
                for delta in choice.delta.tool_calls.unwrap_or_default() {
                    assembler.apply(delta);
                }
            }
        }

        let calls = assembler.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "search_knowledge_graph");
        assert_eq!(calls[0].function.arguments, "{\"query\":\"النحو\"}");
    }

    #[test]
    fn test_tool_message_wire_shape() {
        let message = ChatMessage::tool("call_1", "[]");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert!(json.get("tool_calls").is_none());
    }
}
