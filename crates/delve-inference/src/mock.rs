//! Mock inference backend for deterministic testing.
//!
//! Scripted replies are consumed in call order, which matches how the
//! research pipeline issues its calls: first query expansion, then one
//! retrieval call per query item, then report synthesis. Each reply can be
//! a whole text, a chunked stream, an up-front error, or a mid-stream
//! fault.
//!
//! ## Usage
//!
//! ```rust
//! use delve_inference::mock::MockBackend;
//!
//! let backend = MockBackend::new()
//!     .with_reply(r#"[{"query": "q1", "researchGoal": "g1"}]"#)
//!     .with_error("model overloaded")
//!     .with_reply("# Report");
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use delve_core::{Error, GenerationBackend, Result};

use crate::openai::{StreamingGeneration, TokenStream};

/// One scripted reply.
#[derive(Debug, Clone)]
enum MockReply {
    /// Full text delivered as a single stream chunk.
    Text(String),
    /// Text delivered as multiple stream chunks, in order.
    Chunks(Vec<String>),
    /// Call fails before any content is produced.
    Error(String),
    /// Some chunks arrive, then the stream faults.
    StreamFault { prefix: Vec<String>, message: String },
}

/// A recorded backend call, for assertions.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
}

/// Mock generation backend with scripted, ordered replies.
#[derive(Clone)]
pub struct MockBackend {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    model: String,
}

impl MockBackend {
    /// Create a new mock backend with no scripted replies.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            model: "mock-model".to_string(),
        }
    }

    /// Set the reported model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Queue a full-text reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(MockReply::Text(text.into()));
        self
    }

    /// Queue a reply delivered as multiple stream chunks.
    pub fn with_chunked_reply<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(MockReply::Chunks(
            chunks.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Queue a call that fails before producing content.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(MockReply::Error(message.into()));
        self
    }

    /// Queue a stream that delivers some chunks and then faults.
    pub fn with_stream_fault<I, S>(self, prefix: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(MockReply::StreamFault {
            prefix: prefix.into_iter().map(Into::into).collect(),
            message: message.into(),
        });
        self
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn push(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn next_reply(&self, system: &str, prompt: &str) -> Result<MockReply> {
        self.calls.lock().unwrap().push(MockCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Inference("mock reply queue exhausted".to_string()))
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        match self.next_reply(system, prompt)? {
            MockReply::Text(text) => Ok(text),
            MockReply::Chunks(chunks) => Ok(chunks.concat()),
            MockReply::Error(message) => Err(Error::Inference(message)),
            MockReply::StreamFault { message, .. } => Err(Error::Inference(message)),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl StreamingGeneration for MockBackend {
    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream> {
        self.generate_with_system_stream("", prompt).await
    }

    async fn generate_with_system_stream(&self, system: &str, prompt: &str) -> Result<TokenStream> {
        let items: Vec<Result<String>> = match self.next_reply(system, prompt)? {
            MockReply::Text(text) => vec![Ok(text)],
            MockReply::Chunks(chunks) => chunks.into_iter().map(Ok).collect(),
            MockReply::Error(message) => return Err(Error::Inference(message)),
            MockReply::StreamFault { prefix, message } => {
                let mut items: Vec<Result<String>> = prefix.into_iter().map(Ok).collect();
                items.push(Err(Error::Inference(message)));
                items
            }
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::collect_stream;

    #[tokio::test]
    async fn test_replies_consumed_in_order() {
        let backend = MockBackend::new().with_reply("first").with_reply("second");

        assert_eq!(backend.generate("a").await.unwrap(), "first");
        assert_eq!(backend.generate("b").await.unwrap(), "second");
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_queue_is_an_error() {
        let backend = MockBackend::new();
        let result = backend.generate("anything").await;
        assert!(matches!(result, Err(Error::Inference(_))));
    }

    #[tokio::test]
    async fn test_chunked_reply_streams_in_order() {
        let backend = MockBackend::new().with_chunked_reply(["[{\"query\"", ": \"x\"}]"]);
        let stream = backend.generate_stream("q").await.unwrap();
        let text = collect_stream(stream).await.unwrap();
        assert_eq!(text, "[{\"query\": \"x\"}]");
    }

    #[tokio::test]
    async fn test_error_reply_fails_before_streaming() {
        let backend = MockBackend::new().with_error("model overloaded");
        let result = backend.generate_stream("q").await;
        assert!(matches!(result, Err(Error::Inference(_))));
    }

    #[tokio::test]
    async fn test_stream_fault_after_prefix() {
        let backend = MockBackend::new().with_stream_fault(["partial "], "stream dropped");
        let stream = backend.generate_stream("q").await.unwrap();
        let result = collect_stream(stream).await;
        assert!(matches!(result, Err(Error::Inference(_))));
    }

    #[tokio::test]
    async fn test_call_log_records_system_and_prompt() {
        let backend = MockBackend::new().with_reply("ok");
        backend
            .generate_with_system("sys", "user prompt")
            .await
            .unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system, "sys");
        assert_eq!(calls[0].prompt, "user prompt");
    }
}
