//! OpenAI-compatible inference backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use delve_core::{Error, GenerationBackend, InferenceBackend, Result};

use super::streaming::{parse_sse_stream, StreamingGeneration, TokenStream};
use super::types::*;

/// Default OpenAI API endpoint.
pub const DEFAULT_PROVIDER_URL: &str = delve_core::defaults::PROVIDER_BASE_URL;

/// Default generation model.
pub const DEFAULT_MODEL: &str = delve_core::defaults::THINKING_MODEL;

/// Default timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = delve_core::defaults::GEN_TIMEOUT_SECS;

/// Configuration for an OpenAI-compatible backend.
///
/// One backend instance is constructed per job and per model role, carrying
/// that job's credentials. The API key is immutable after construction;
/// per-request key overrides produce a fresh backend instead of mutating
/// shared state.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for generation.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Whether to request grounded web retrieval on this model.
    pub web_search: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            web_search: false,
        }
    }
}

impl ProviderConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `OPENAI_BASE_URL` | `https://api.openai.com/v1` | API endpoint |
    /// | `OPENAI_API_KEY` | (none) | API key |
    /// | `OPENAI_MODEL` | `gpt-4o` | Generation model |
    /// | `OPENAI_TIMEOUT` | `300` | Request timeout (seconds) |
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PROVIDER_URL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            timeout_seconds: std::env::var("OPENAI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            web_search: false,
        }
    }

    /// Set the generation model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Enable or disable grounded web retrieval.
    pub fn with_web_search(mut self, web_search: bool) -> Self {
        self.web_search = web_search;
        self
    }
}

/// OpenAI-compatible inference backend.
pub struct OpenAIBackend {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Initializing provider backend: url={}, model={}",
            config.base_url, config.model
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ProviderConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Build a POST request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }

    /// Build a GET request with authentication.
    fn build_get_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.get(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req
    }

    fn chat_request(&self, system: &str, prompt: &str, stream: bool) -> ChatCompletionRequest {
        let mut messages = Vec::new();

        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }

        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: None,
            max_tokens: None,
            stream,
            web_search_options: self.config.web_search.then(WebSearchOptions::default),
        }
    }

    async fn send_chat(&self, request: &ChatCompletionRequest) -> Result<reqwest::Response> {
        let response = self
            .build_request("/chat/completions")
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: ProviderErrorResponse = response
                .json()
                .await
                .unwrap_or_else(|_| ProviderErrorResponse::unknown());
            return Err(Error::Inference(format!(
                "Provider returned {}: {}",
                status, body.error.message
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        debug!(
            "Generating with model {}, prompt length: {}",
            self.config.model,
            prompt.len()
        );

        let request = self.chat_request(system, prompt, false);
        let response = self.send_chat(&request).await?;

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        debug!("Generation complete, response length: {}", content.len());
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl InferenceBackend for OpenAIBackend {
    async fn health_check(&self) -> Result<bool> {
        // For OpenAI-compatible APIs, we try a minimal models list request
        let response = self
            .build_get_request("/models")
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Provider health check passed");
                    Ok(true)
                } else {
                    warn!("Provider health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Provider health check error: {}", e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl StreamingGeneration for OpenAIBackend {
    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream> {
        self.generate_with_system_stream("", prompt).await
    }

    async fn generate_with_system_stream(&self, system: &str, prompt: &str) -> Result<TokenStream> {
        debug!(
            "Streaming generation with model {}, prompt length: {}",
            self.config.model,
            prompt.len()
        );

        let request = self.chat_request(system, prompt, true);
        let response = self.send_chat(&request).await?;

        Ok(parse_sse_stream(response.bytes_stream()))
    }
}
