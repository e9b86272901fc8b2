//! Episode submission for the knowledge graph
//!
//! An episode is a unit of raw text submitted to the graph for downstream
//! fact/entity extraction. This module persists `Episodic` nodes with the
//! bi-temporal fields (`created_at`, `valid_at`) and maintains the indexes
//! and constraints the search layer depends on.

use crate::error::{KgError, Result};
use chrono::{DateTime, Utc};
use neo4rs::{query, Graph};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The source type of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeType {
    Message,
    Json,
    Text,
}

impl EpisodeType {
    /// Wire name used in `episodes.json` and node properties.
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeType::Message => "message",
            EpisodeType::Json => "json",
            EpisodeType::Text => "text",
        }
    }

    /// Parse a wire name back into the enum.
    pub fn parse(s: &str) -> Option<EpisodeType> {
        match s {
            "message" => Some(EpisodeType::Message),
            "json" => Some(EpisodeType::Json),
            "text" => Some(EpisodeType::Text),
            _ => None,
        }
    }
}

/// An episode record as read from `episodes.json`.
///
/// Exactly the four keys of the ingestion file format. `content` is kept as
/// a JSON value: string content is submitted verbatim, anything else is
/// serialized to JSON text on submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub name: String,
    pub content: serde_json::Value,
    #[serde(rename = "type")]
    pub source: EpisodeType,
    pub description: String,
}

impl Episode {
    /// The episode body as submitted to the graph.
    pub fn body(&self) -> String {
        match &self.content {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Statements run by [`build_indices_and_constraints`]. Each is idempotent.
const INDEX_STATEMENTS: &[&str] = &[
    "CREATE CONSTRAINT entity_uuid IF NOT EXISTS FOR (n:Entity) REQUIRE n.uuid IS UNIQUE",
    "CREATE CONSTRAINT episodic_uuid IF NOT EXISTS FOR (n:Episodic) REQUIRE n.uuid IS UNIQUE",
    "CREATE INDEX entity_name IF NOT EXISTS FOR (n:Entity) ON (n.name)",
    "CREATE INDEX episodic_valid_at IF NOT EXISTS FOR (n:Episodic) ON (n.valid_at)",
    "CREATE FULLTEXT INDEX node_name_and_summary IF NOT EXISTS \
     FOR (n:Entity|Episodic) ON EACH [n.name, n.summary, n.content]",
    "CREATE FULLTEXT INDEX edge_name_and_fact IF NOT EXISTS \
     FOR ()-[r:RELATES_TO]-() ON EACH [r.name, r.fact]",
];

/// Create the constraints, range indexes and fulltext indexes used by the
/// search layer. Safe to call on every startup.
pub async fn build_indices_and_constraints(graph: &Graph) -> Result<()> {
    info!("Building graph indices and constraints");

    for statement in INDEX_STATEMENTS {
        graph
            .run(query(statement))
            .await
            .map_err(|e| KgError::QueryError(format!("Failed to run '{}': {}", statement, e)))?;
    }

    Ok(())
}

/// Submit an episode to the graph.
///
/// Creates an `Episodic` node carrying the raw content plus the bi-temporal
/// fields: `created_at` (transaction time) and `valid_at` (the caller's
/// reference time for when the content holds in the real world).
///
/// # Returns
/// * `Ok(String)` - uuid of the created episode node
/// * `Err(KgError)` on failure; the caller re-runs manually, there is no retry
pub async fn add_episode(
    graph: &Graph,
    episode: &Episode,
    reference_time: DateTime<Utc>,
) -> Result<String> {
    let uuid = uuid::Uuid::new_v4().to_string();

    debug!("Submitting episode '{}' as {}", episode.name, uuid);

    let cypher = query(
        "CREATE (e:Episodic {
            uuid: $uuid,
            name: $name,
            content: $content,
            source: $source,
            source_description: $source_description,
            group_id: $group_id,
            created_at: datetime($created_at),
            valid_at: datetime($valid_at)
        })
        RETURN e.uuid as uuid",
    )
    .param("uuid", uuid)
    .param("name", episode.name.clone())
    .param("content", episode.body())
    .param("source", episode.source.as_str().to_string())
    .param("source_description", episode.description.clone())
    .param("group_id", String::new())
    .param("created_at", Utc::now().to_rfc3339())
    .param("valid_at", reference_time.to_rfc3339());

    let mut result = graph
        .execute(cypher)
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to create episode: {}", e)))?;

    if let Some(row) = result
        .next()
        .await
        .map_err(|e| KgError::QueryError(format!("Failed to read result: {}", e)))?
    {
        let uuid: String = row
            .get("uuid")
            .map_err(|e| KgError::QueryError(format!("Failed to extract uuid: {}", e)))?;
        Ok(uuid)
    } else {
        Err(KgError::QueryError("No result returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_type_wire_names() {
        assert_eq!(EpisodeType::Message.as_str(), "message");
        assert_eq!(EpisodeType::Json.as_str(), "json");
        assert_eq!(EpisodeType::Text.as_str(), "text");

        assert_eq!(EpisodeType::parse("text"), Some(EpisodeType::Text));
        assert_eq!(EpisodeType::parse("json"), Some(EpisodeType::Json));
        assert_eq!(EpisodeType::parse("episode"), None);
    }

    #[test]
    fn test_episode_deserializes_ingestion_record() {
        let raw = r#"{
            "content": "اللغة العربية من أقدم اللغات",
            "type": "text",
            "description": "أهمية اللغة العربية",
            "name": "مقدمة"
        }"#;

        let episode: Episode = serde_json::from_str(raw).unwrap();
        assert_eq!(episode.source, EpisodeType::Text);
        assert_eq!(episode.name, "مقدمة");
        assert_eq!(episode.body(), "اللغة العربية من أقدم اللغات");
    }

    #[test]
    fn test_episode_missing_key_is_rejected() {
        // "description" absent - the four keys are mandatory.
        let raw = r#"{"content": "x", "type": "text", "name": "y"}"#;
        assert!(serde_json::from_str::<Episode>(raw).is_err());
    }

    #[test]
    fn test_structured_content_is_serialized() {
        let raw = r#"{
            "content": {"lesson": 3, "unit": "النحو"},
            "type": "json",
            "description": "سجل منظم",
            "name": "درس"
        }"#;

        let episode: Episode = serde_json::from_str(raw).unwrap();
        let body = episode.body();
        assert!(body.contains("\"lesson\":3"));
        assert!(body.contains("النحو"));
    }
}
