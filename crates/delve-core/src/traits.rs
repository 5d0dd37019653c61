//! Trait definitions for delve backend seams.

use async_trait::async_trait;

use crate::error::Result;

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend capable of text generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend with a liveness probe.
#[async_trait]
pub trait InferenceBackend: GenerationBackend {
    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool>;
}
