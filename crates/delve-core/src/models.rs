//! Core data models for research jobs, query items, and reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a research job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

/// Processing state of a single planned sub-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryItemState {
    Unprocessed,
    Processed,
    Failed,
}

/// One planned sub-query within a research job.
///
/// Items are produced by the query-expansion step, processed in generation
/// order, and transitioned in place — never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryItem {
    /// The sub-query to research.
    pub query: String,
    /// What this sub-query is meant to establish.
    pub research_goal: String,
    /// Current processing state.
    #[serde(default = "QueryItem::initial_state")]
    pub state: QueryItemState,
    /// Retrieved/summarized text; empty until `Processed`.
    #[serde(default)]
    pub learning: String,
}

impl QueryItem {
    /// Create a new unprocessed item.
    pub fn new(query: impl Into<String>, research_goal: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            research_goal: research_goal.into(),
            state: QueryItemState::Unprocessed,
            learning: String::new(),
        }
    }

    fn initial_state() -> QueryItemState {
        QueryItemState::Unprocessed
    }
}

/// One research request's lifecycle state, owned by the orchestrator for the
/// duration of the job. Never persisted — only the resulting report is.
#[derive(Debug, Clone)]
pub struct ResearchJob {
    /// The research question. Non-empty, immutable.
    pub query: String,
    /// Optional response-language directive.
    pub language: Option<String>,
    /// Model used for query expansion and report synthesis.
    pub thinking_model: String,
    /// Model used for per-query retrieval.
    pub networking_model: String,
    /// Webhook target for progress and terminal notifications.
    pub callback_url: Option<String>,
    /// Job start time, used for elapsed-duration reporting.
    pub started_at: DateTime<Utc>,
    /// Current status.
    pub status: JobStatus,
}

impl ResearchJob {
    /// Start a new running job for the given query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            language: None,
            thinking_model: crate::defaults::THINKING_MODEL.to_string(),
            networking_model: crate::defaults::NETWORKING_MODEL.to_string(),
            callback_url: None,
            started_at: Utc::now(),
            status: JobStatus::Running,
        }
    }

    /// Set the response language.
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.trim().is_empty());
        self
    }

    /// Set the synthesis model.
    pub fn with_thinking_model(mut self, model: impl Into<String>) -> Self {
        self.thinking_model = model.into();
        self
    }

    /// Set the retrieval model.
    pub fn with_networking_model(mut self, model: impl Into<String>) -> Self {
        self.networking_model = model.into();
        self
    }

    /// Set the webhook callback target.
    pub fn with_callback_url(mut self, url: Option<String>) -> Self {
        self.callback_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    /// Seconds elapsed since the job started, to one decimal place.
    pub fn elapsed_secs(&self) -> f64 {
        let millis = (Utc::now() - self.started_at).num_milliseconds().max(0);
        (millis as f64 / 100.0).round() / 10.0
    }
}

/// Final synthesized artifact. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Opaque unique identifier, generated on successful non-empty synthesis.
    pub id: String,
    /// Markdown report body.
    pub content: String,
    /// Public URL of the stored report, when the store produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,
}

/// Inbound trigger request body (external HTTP contract).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    /// The research question (required, non-empty).
    pub query: String,
    /// Optional response-language directive.
    #[serde(default)]
    pub language: Option<String>,
    /// Optional synthesis model override.
    #[serde(default)]
    pub thinking_model: Option<String>,
    /// Optional retrieval model override.
    #[serde(default)]
    pub networking_model: Option<String>,
    /// Optional per-request provider API key override.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Optional webhook callback target.
    #[serde(default)]
    pub callback_url: Option<String>,
}

/// Outbound trigger response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TriggerResponse {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Webhook payload: a single human-readable status line per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub text: String,
}
