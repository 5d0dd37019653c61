//! # delve-inference
//!
//! LLM inference backend for the delve research service.
//!
//! Provides an OpenAI-compatible backend with SSE streaming support and a
//! deterministic mock backend for tests. Backends are constructed per job:
//! the API key is an immutable construction parameter, never process-global
//! state, so concurrently running jobs with different credentials cannot
//! race.

pub mod mock;
pub mod openai;

pub use mock::MockBackend;
pub use openai::{
    collect_stream, parse_sse_stream, OpenAIBackend, ProviderConfig, StreamingGeneration,
    TokenStream,
};
