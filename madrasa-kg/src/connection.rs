//! Neo4j connection management and health checks
//!
//! This module provides the main client for interacting with the Neo4j
//! instance that backs the knowledge graph, including environment-based
//! configuration and a two-tier health check.

use crate::error::{KgError, Result};
use neo4rs::{query, ConfigBuilder, Graph};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Connection settings for the graph database.
///
/// Built from the environment (`NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASSWORD`,
/// optional `NEO4J_DATABASE`), with `.env` files honored via `dotenv`.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl GraphConfig {
    /// Load connection settings from the environment.
    ///
    /// # Errors
    /// Returns `KgError::ConfigError` when any of `NEO4J_URI`, `NEO4J_USER`
    /// or `NEO4J_PASSWORD` is unset. `NEO4J_DATABASE` defaults to `"neo4j"`.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let read = |key: &str| {
            std::env::var(key).map_err(|_| KgError::ConfigError(format!("{} is not set", key)))
        };

        Ok(Self {
            uri: read("NEO4J_URI")?,
            user: read("NEO4J_USER")?,
            password: read("NEO4J_PASSWORD")?,
            database: std::env::var("NEO4J_DATABASE").unwrap_or_else(|_| "neo4j".to_string()),
        })
    }
}

/// Health status of the graph database connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Database is responsive
    Healthy,
    /// Database is not responsive or erroring
    Unhealthy,
}

impl HealthStatus {
    /// Convert to HTTP status code equivalent
    pub fn to_http_status_code(&self) -> u16 {
        match self {
            HealthStatus::Healthy => 200,
            HealthStatus::Unhealthy => 503,
        }
    }

    /// Check if the database can serve requests
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Main knowledge graph client with connection pooling
pub struct KnowledgeGraph {
    graph: Graph,
}

impl KnowledgeGraph {
    /// Connect to Neo4j with the given configuration.
    ///
    /// # Example
    /// ```no_run
    /// use madrasa_kg::{GraphConfig, KnowledgeGraph};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let config = GraphConfig::from_env()?;
    ///     let kg = KnowledgeGraph::connect(&config).await?;
    ///     kg.health_check().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        info!(
            "Connecting to Neo4j at {} (database: {})",
            config.uri, config.database
        );

        let driver_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .fetch_size(500)
            .max_connections(16)
            .build()
            .map_err(|e| KgError::ConfigError(e.to_string()))?;

        let graph = Graph::connect(driver_config)
            .await
            .map_err(|e| KgError::ConnectionError(e.to_string()))?;

        info!("Successfully connected to Neo4j");

        Ok(Self { graph })
    }

    /// Connect using environment configuration.
    pub async fn from_env() -> Result<Self> {
        let config = GraphConfig::from_env()?;
        Self::connect(&config).await
    }

    /// Simple health check using RETURN 1
    ///
    /// Fastest probe with minimal overhead, suitable for liveness endpoints.
    pub async fn health_check(&self) -> Result<bool> {
        debug!("Executing simple health check (RETURN 1)");

        self.graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| KgError::ConnectionError(e.to_string()))?;

        debug!("Simple health check passed");
        Ok(true)
    }

    /// Standard health check using CALL db.ping()
    ///
    /// Uses the official Neo4j health check procedure (4.1+) and falls back
    /// to the simple probe when the procedure is unavailable.
    pub async fn health_check_ping(&self) -> HealthStatus {
        debug!("Executing standard health check (CALL db.ping())");

        let mut result = match self.graph.execute(query("CALL db.ping()")).await {
            Ok(result) => result,
            Err(e) => {
                warn!("db.ping() failed, falling back to RETURN 1: {}", e);
                return match self.health_check().await {
                    Ok(_) => HealthStatus::Healthy,
                    Err(_) => HealthStatus::Unhealthy,
                };
            }
        };

        match result.next().await {
            Ok(Some(row)) => {
                let success: bool = row.get("success").unwrap_or(false);
                if success {
                    HealthStatus::Healthy
                } else {
                    warn!("Standard health check returned success=false");
                    HealthStatus::Unhealthy
                }
            }
            _ => HealthStatus::Unhealthy,
        }
    }

    /// Get a reference to the underlying Neo4j Graph instance
    ///
    /// This allows direct access to the neo4rs Graph for custom queries.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_http_codes() {
        assert_eq!(HealthStatus::Healthy.to_http_status_code(), 200);
        assert_eq!(HealthStatus::Unhealthy.to_http_status_code(), 503);
    }

    #[test]
    fn test_health_status_operational() {
        assert!(HealthStatus::Healthy.is_operational());
        assert!(!HealthStatus::Unhealthy.is_operational());
    }

    #[test]
    fn test_config_from_env_missing_uri() {
        // Serialize access to the process environment across tests.
        std::env::remove_var("NEO4J_URI");
        let result = GraphConfig::from_env();
        if let Err(KgError::ConfigError(msg)) = result {
            assert!(msg.contains("NEO4J_URI"));
        }
        // A .env file on the test machine can legitimately satisfy the
        // lookup, so only the error message shape is asserted.
    }
}
