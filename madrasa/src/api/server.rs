//! API server for the madrasa graph endpoints

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use madrasa_kg::KnowledgeGraph;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::routes::{add_node, delete_node, execute_cypher, health, update_edge, AppState};

/// Configuration for the API server
pub struct ApiServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    kg: Arc<KnowledgeGraph>,
}

impl ApiServer {
    /// Create a new API server over a connected graph client
    pub fn new(config: ApiServerConfig, kg: Arc<KnowledgeGraph>) -> Self {
        Self { config, kg }
    }

    /// Start the API server
    pub async fn start(self) -> Result<()> {
        let state = Arc::new(AppState { kg: self.kg });

        let app = Router::new()
            .route("/health", get(health))
            .route("/add_node", post(add_node))
            .route("/delete_node", post(delete_node))
            .route("/update_edge", post(update_edge))
            .route("/execute_cypher", post(execute_cypher))
            .with_state(state)
            .layer(CorsLayer::permissive());

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Starting API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
