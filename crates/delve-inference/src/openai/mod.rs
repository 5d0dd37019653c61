//! OpenAI-compatible inference backend.
//!
//! This module provides a generation backend that works with any
//! OpenAI-compatible chat completions endpoint, including:
//!
//! - OpenAI cloud API
//! - Azure OpenAI
//! - OpenRouter
//! - Ollama (in OpenAI compatibility mode)
//! - vLLM
//!
//! # Example
//!
//! ```rust,no_run
//! use delve_inference::openai::{OpenAIBackend, ProviderConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     // From environment variables
//!     let backend = OpenAIBackend::from_env().unwrap();
//!
//!     // Or with custom config — one backend per job, carrying that job's
//!     // credentials
//!     let config = ProviderConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         api_key: None, // not needed for local endpoints
//!         model: "llama3".to_string(),
//!         timeout_seconds: 120,
//!         web_search: false,
//!     };
//!     let backend = OpenAIBackend::new(config).unwrap();
//! }
//! ```

mod backend;
mod streaming;
mod types;

pub use backend::{
    OpenAIBackend, ProviderConfig, DEFAULT_MODEL, DEFAULT_PROVIDER_URL, DEFAULT_TIMEOUT_SECS,
};
pub use streaming::{collect_stream, parse_sse_stream, StreamingGeneration, TokenStream};
pub use types::*;
