//! # Madrasa Knowledge Graph (madrasa-kg)
//!
//! Neo4j layer for the madrasa RAG assistant: connection management,
//! episode submission, hybrid retrieval and the mutation operations backing
//! the HTTP API.
//!
//! The heavy lifting (keyword relevance, graph-distance reranking, index
//! maintenance) is delegated to Neo4j itself; this crate only issues Cypher
//! and shapes the results.
//!
//! ## Connecting
//!
//! Connection settings come from the environment (`NEO4J_URI`,
//! `NEO4J_USER`, `NEO4J_PASSWORD`, optional `NEO4J_DATABASE`), with `.env`
//! files honored:
//!
//! ```no_run
//! use madrasa_kg::KnowledgeGraph;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let kg = KnowledgeGraph::from_env().await?;
//!     let healthy = kg.health_check().await?;
//!     println!("Database healthy: {}", healthy);
//!     Ok(())
//! }
//! ```
//!
//! ## Ingesting episodes
//!
//! ```no_run
//! use madrasa_kg::{episode, Episode, KnowledgeGraph};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let kg = KnowledgeGraph::from_env().await?;
//!     episode::build_indices_and_constraints(kg.graph()).await?;
//!
//!     let record: Episode = serde_json::from_str(
//!         r#"{"content": "اللغة العربية", "type": "text",
//!             "description": "مقدمة", "name": "الدرس الأول"}"#,
//!     )?;
//!     let uuid = episode::add_episode(kg.graph(), &record, chrono::Utc::now()).await?;
//!     println!("Created episode {}", uuid);
//!     Ok(())
//! }
//! ```
//!
//! ## Searching
//!
//! ```no_run
//! use madrasa_kg::{search, KnowledgeGraph};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let kg = KnowledgeGraph::from_env().await?;
//!     let hits = search::search_nodes(kg.graph(), "أهمية اللغة العربية", 5).await?;
//!     for hit in hits {
//!         println!("{}: {}", hit.name, hit.summary);
//!     }
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod episode;
pub mod error;
pub mod mutation;
pub mod schema;
pub mod search;

// Re-export main types for convenience
pub use connection::{GraphConfig, HealthStatus, KnowledgeGraph};
pub use episode::{add_episode, build_indices_and_constraints, Episode, EpisodeType};
pub use error::{KgError, Result};
pub use mutation::{delete_node, run_cypher, update_edge};
pub use schema::{inspect_schema, GraphSchema};
pub use search::{
    search_facts, search_facts_reranked, search_nodes, FactSearchResult, NodeSearchResult,
    DEFAULT_SEARCH_LIMIT,
};
