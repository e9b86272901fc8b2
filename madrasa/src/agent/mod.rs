//! Conversational agent over the knowledge graph
//!
//! A terminal REPL around a chat-completions tool loop: the model is given
//! one tool that performs node search against the graph, and its streamed
//! answer is printed as the deltas arrive.

use crate::llm::{ChatClient, ChatMessage, ToolCall};
use anyhow::{Context, Result};
use madrasa_kg::{search, KnowledgeGraph, DEFAULT_SEARCH_LIMIT};
use serde::Deserialize;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, warn};

const SYSTEM_PROMPT: &str = "You are an expert Arabic language teacher specializing in the \
official curriculum for the 2nd secondary year, with access to a knowledge graph filled with \
temporal data about the Arabic subject for that year. When the user asks you a question, use \
your search tool to query the knowledge graph and then answer honestly. Be willing to admit \
when you did not find the information necessary to answer the question. Use the available \
information to answer and never repeat the same piece of information.";

const SEARCH_TOOL_NAME: &str = "search_knowledge_graph";

/// Upper bound on tool rounds within a single user turn.
const MAX_TOOL_ROUNDS: usize = 4;

fn search_tool_spec() -> serde_json::Value {
    serde_json::json!([{
        "type": "function",
        "function": {
            "name": SEARCH_TOOL_NAME,
            "description": "Search the Arabic curriculum knowledge graph. Returns up to 5 \
                            matching nodes with uuid, name and summary.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query, in Arabic or English"
                    }
                },
                "required": ["query"]
            }
        }
    }])
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

/// The conversational agent with its accumulated message history.
pub struct Agent {
    llm: ChatClient,
    kg: Arc<KnowledgeGraph>,
    history: Vec<ChatMessage>,
}

impl Agent {
    pub fn new(llm: ChatClient, kg: Arc<KnowledgeGraph>) -> Self {
        Self {
            llm,
            kg,
            history: vec![ChatMessage::system(SYSTEM_PROMPT)],
        }
    }

    /// Run the terminal REPL until EOF or an exit word.
    ///
    /// Errors within a turn are printed and the loop continues; only I/O
    /// failures on stdin end the session abnormally.
    pub async fn run_repl(&mut self) -> Result<()> {
        println!("Enter 'exit' to quit the program.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("\n[You] ");
            std::io::stdout().flush().context("Failed to flush stdout")?;

            let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
                break;
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if matches!(
                input.to_lowercase().as_str(),
                "exit" | "quit" | "bye" | "goodbye"
            ) {
                println!("Goodbye!");
                break;
            }

            println!("\n[Assistant]");
            if let Err(e) = self.turn(input).await {
                error!("Agent turn failed: {}", e);
                println!("\n[Error] An error occurred: {}", e);
            }
            println!();
        }

        Ok(())
    }

    /// Process one user message: stream the model's answer, resolving tool
    /// calls between rounds.
    async fn turn(&mut self, input: &str) -> Result<()> {
        self.history.push(ChatMessage::user(input));
        let tools = search_tool_spec();

        for _ in 0..MAX_TOOL_ROUNDS {
            let turn = self
                .llm
                .stream_chat(&self.history, Some(&tools), |delta| {
                    print!("{}", delta);
                    let _ = std::io::stdout().flush();
                })
                .await?;

            if turn.tool_calls.is_empty() {
                self.history.push(ChatMessage::assistant(turn.content));
                return Ok(());
            }

            let content = (!turn.content.is_empty()).then(|| turn.content.clone());
            self.history
                .push(ChatMessage::assistant_tool_calls(content, turn.tool_calls.clone()));

            for call in &turn.tool_calls {
                let result = self.execute_tool(call).await?;
                self.history.push(ChatMessage::tool(call.id.clone(), result));
            }
        }

        warn!("Tool round limit reached without a final answer");
        Ok(())
    }

    /// Dispatch a tool call to the graph and serialize the results for the
    /// model.
    async fn execute_tool(&self, call: &ToolCall) -> Result<String> {
        if call.function.name != SEARCH_TOOL_NAME {
            warn!("Model requested unknown tool '{}'", call.function.name);
            return Ok(serde_json::json!({
                "error": format!("unknown tool {}", call.function.name)
            })
            .to_string());
        }

        let args: SearchArgs = serde_json::from_str(&call.function.arguments)
            .context("Malformed search tool arguments")?;

        let hits = search::search_nodes(self.kg.graph(), &args.query, DEFAULT_SEARCH_LIMIT)
            .await
            .context("Knowledge graph search failed")?;

        Ok(serde_json::to_string(&hits)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_spec_declares_query_parameter() {
        let spec = search_tool_spec();
        let function = &spec[0]["function"];
        assert_eq!(function["name"], SEARCH_TOOL_NAME);
        assert_eq!(function["parameters"]["required"][0], "query");
    }

    #[test]
    fn test_search_args_parse_from_model_output() {
        let args: SearchArgs = serde_json::from_str(r#"{"query": "أهمية اللغة"}"#).unwrap();
        assert_eq!(args.query, "أهمية اللغة");
    }
}
