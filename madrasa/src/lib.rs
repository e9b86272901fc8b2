pub mod agent;
pub mod api;
pub mod llm;
pub mod preprocess;

pub use agent::Agent;
pub use api::{ApiServer, ApiServerConfig};
pub use llm::{ChatClient, ChatMessage, LlmConfig, LlmError};
pub use preprocess::{ArabicPreprocessor, PreprocessOptions};
