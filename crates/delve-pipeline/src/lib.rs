//! # delve-pipeline
//!
//! The asynchronous research pipeline for the delve research service.
//!
//! This crate provides:
//! - Streaming JSON extraction of model-generated query plans, with a
//!   tolerant repairer for the malformed output LLMs routinely produce
//! - The research orchestrator: query expansion → per-query retrieval →
//!   report synthesis → persistence → notification
//! - Per-query fault isolation (a failed sub-query never fails the job)
//! - A retrying webhook notifier with an exactly-once terminal message
//! - The report store abstraction with HTTP-blob and in-memory backends
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use delve_core::ResearchJob;
//! use delve_inference::{OpenAIBackend, ProviderConfig};
//! use delve_pipeline::{InMemoryStore, PipelineConfig, ResearchPipeline, WebhookNotifier};
//!
//! let thinking = Arc::new(OpenAIBackend::from_env()?);
//! let networking = Arc::new(OpenAIBackend::new(
//!     ProviderConfig::from_env().with_model("gpt-4o-mini-search-preview").with_web_search(true),
//! )?);
//!
//! let pipeline = ResearchPipeline::new(
//!     thinking,
//!     networking,
//!     Arc::new(InMemoryStore::new()),
//!     WebhookNotifier::new()?,
//!     PipelineConfig::default(),
//! );
//!
//! let outcome = pipeline.run(ResearchJob::new("history of tea")).await;
//! ```

pub mod extract;
pub mod notify;
pub mod orchestrator;
pub mod processor;
pub mod prompts;
pub mod sink;

// Re-export core types
pub use delve_core::{Error, JobStatus, QueryItem, QueryItemState, Report, ResearchJob, Result};

pub use extract::{
    strip_code_fences, tolerant_parse, validate_query_plan, ExtractionMode, ParseOutcome,
    QueryPlanExtractor,
};
pub use notify::{is_transient_transport_error, RetryConfig, WebhookNotifier};
pub use orchestrator::{JobOutcome, PipelineConfig, ResearchPipeline};
pub use sink::{HttpBlobStore, InMemoryStore, ReportStore, StoredObject};
