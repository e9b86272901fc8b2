//! HTTP API module for the madrasa server

pub mod routes;
pub mod server;

pub use routes::{ApiError, AppState, Envelope};
pub use server::{ApiServer, ApiServerConfig};
