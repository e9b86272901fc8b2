//! Error types for knowledge graph operations
//!
//! This module defines custom error types for the madrasa-kg library,
//! covering configuration, connection and query failures.

use thiserror::Error;

/// Main error type for knowledge graph operations
#[derive(Error, Debug)]
pub enum KgError {
    /// Configuration error - missing or invalid environment settings
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Connection error - network or connection pool issues
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query error: {0}")]
    QueryError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid caller-supplied input (bad episode type, unsafe identifier)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Neo4rs driver error (wrapper)
    #[error("Neo4rs driver error: {0}")]
    DriverError(#[from] neo4rs::Error),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for knowledge graph operations
pub type Result<T> = std::result::Result<T, KgError>;

impl From<String> for KgError {
    fn from(s: String) -> Self {
        KgError::Other(s)
    }
}

impl From<&str> for KgError {
    fn from(s: &str) -> Self {
        KgError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = KgError::ConnectionError("Failed to connect".to_string());
        assert_eq!(error.to_string(), "Connection error: Failed to connect");

        let error = KgError::ConfigError("NEO4J_URI is not set".to_string());
        assert!(error.to_string().contains("NEO4J_URI"));

        let error = KgError::InvalidInput("bad relationship type".to_string());
        assert_eq!(error.to_string(), "Invalid input: bad relationship type");
    }

    #[test]
    fn test_error_conversion() {
        let error: KgError = "test error".into();
        assert!(matches!(error, KgError::Other(_)));

        let error: KgError = "test error".to_string().into();
        assert!(matches!(error, KgError::Other(_)));
    }
}
