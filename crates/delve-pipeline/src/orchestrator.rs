//! Research pipeline orchestrator.
//!
//! One cooperative task per job, stepping through a linear state machine:
//! Generating → Retrieving → Synthesizing → Persisting → Notifying. Any
//! fatal step failure short-circuits straight to Notifying; the terminal
//! notification is attempted exactly once per job, whatever happened before
//! it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use delve_core::defaults;
use delve_core::{Error, JobStatus, QueryItem, QueryItemState, Report, ResearchJob, Result};
use delve_inference::{collect_stream, StreamingGeneration};

use crate::extract::{ExtractionMode, QueryPlanExtractor};
use crate::notify::WebhookNotifier;
use crate::processor;
use crate::prompts;
use crate::sink::ReportStore;

/// Pipeline-level configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Public base address used to build viewer links in success messages.
    /// When absent, success messages carry the raw report id instead.
    pub public_base_url: Option<String>,
    /// Query-plan extraction strategy. Full accumulation unless configured
    /// otherwise.
    pub extraction_mode: ExtractionMode,
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `PUBLIC_BASE_URL` | (none) | Base address for report viewer links |
    pub fn from_env() -> Self {
        Self {
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            extraction_mode: ExtractionMode::default(),
        }
    }
}

/// Terminal state of a finished job.
#[derive(Debug)]
pub struct JobOutcome {
    /// Final job status.
    pub status: JobStatus,
    /// The query plan with per-item terminal states.
    pub items: Vec<QueryItem>,
    /// The synthesized report, when synthesis succeeded (present even when
    /// storage degraded the job to failed).
    pub report: Option<Report>,
    /// The fatal error, when the job failed.
    pub error: Option<Error>,
}

impl JobOutcome {
    fn failed(error: Error, items: Vec<QueryItem>) -> Self {
        Self {
            status: JobStatus::Failed,
            items,
            report: None,
            error: Some(error),
        }
    }

    fn succeeded(report: Report, items: Vec<QueryItem>) -> Self {
        Self {
            status: JobStatus::Succeeded,
            items,
            report: Some(report),
            error: None,
        }
    }

    /// Learnings of processed items, in generation order.
    pub fn learnings(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|i| i.state == QueryItemState::Processed)
            .map(|i| i.learning.as_str())
            .collect()
    }
}

/// The research pipeline: owns the per-job backends, the report store, and
/// the notifier.
pub struct ResearchPipeline {
    thinking: Arc<dyn StreamingGeneration>,
    networking: Arc<dyn StreamingGeneration>,
    store: Arc<dyn ReportStore>,
    notifier: WebhookNotifier,
    config: PipelineConfig,
}

impl ResearchPipeline {
    /// Create a pipeline over the given backends and store.
    pub fn new(
        thinking: Arc<dyn StreamingGeneration>,
        networking: Arc<dyn StreamingGeneration>,
        store: Arc<dyn ReportStore>,
        notifier: WebhookNotifier,
        config: PipelineConfig,
    ) -> Self {
        Self {
            thinking,
            networking,
            store,
            notifier,
            config,
        }
    }

    /// The notifier, for progress pings issued at the trigger boundary.
    pub fn notifier(&self) -> &WebhookNotifier {
        &self.notifier
    }

    /// Run the job to completion.
    ///
    /// Exactly one terminal notification is attempted, whether the job
    /// succeeded, failed, or ended ambiguously. Notification delivery
    /// failure never changes the job outcome.
    pub async fn run(&self, job: ResearchJob) -> JobOutcome {
        info!(query = %job.query, "Research job started");

        let outcome = self.execute(&job).await;

        // Elapsed time is measured up to just before notification
        let elapsed = job.elapsed_secs();
        let message = self.terminal_message(&outcome, elapsed);
        self.notifier
            .notify_terminal(job.callback_url.as_deref(), &message)
            .await;

        match outcome.status {
            JobStatus::Succeeded => info!(duration_s = elapsed, "Research job succeeded"),
            _ => {
                let reason = outcome
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                warn!(duration_s = elapsed, error = %reason, "Research job failed");
            }
        }

        outcome
    }

    async fn execute(&self, job: &ResearchJob) -> JobOutcome {
        let system = prompts::system_instruction(Utc::now());

        // Generating
        let mut items = match self.generate_queries(job, &system).await {
            Ok(items) => items,
            Err(e) => return JobOutcome::failed(e, Vec::new()),
        };
        info!(query_count = items.len(), "Query plan generated");

        // Retrieving — sequential by design: keeps learnings ordered and
        // bounds concurrent load on the rate-limited provider
        for item in items.iter_mut() {
            processor::process_query(
                self.networking.as_ref(),
                &system,
                item,
                job.language.as_deref(),
            )
            .await;
        }
        let learnings: Vec<String> = items
            .iter()
            .filter(|i| i.state == QueryItemState::Processed)
            .map(|i| i.learning.clone())
            .collect();
        info!(
            learning_count = learnings.len(),
            query_count = items.len(),
            "Retrieval finished"
        );

        // Synthesizing
        let content = match self.synthesize(job, &learnings, &system).await {
            Ok(content) => content,
            Err(e) => return JobOutcome::failed(e, items),
        };

        // Persisting
        let id = Uuid::new_v4().to_string();
        let path = defaults::report_path(&id);
        match self
            .store
            .put(&path, &content, defaults::REPORT_CONTENT_TYPE)
            .await
        {
            Ok(stored) => {
                info!(report_id = %id, url = %stored.url, "Report stored");
                JobOutcome::succeeded(
                    Report {
                        id,
                        content,
                        storage_url: Some(stored.url),
                    },
                    items,
                )
            }
            Err(e) => {
                // Degraded outcome: keep the content readable in whatever
                // channel carries the body, with the failure visible in it
                warn!(report_id = %id, error = %e, "Report storage failed, keeping content inline");
                let content = format!("> Report storage failed: {}\n\n{}", e, content);
                JobOutcome {
                    status: JobStatus::Failed,
                    items,
                    report: Some(Report {
                        id,
                        content,
                        storage_url: None,
                    }),
                    error: Some(e),
                }
            }
        }
    }

    async fn generate_queries(&self, job: &ResearchJob, system: &str) -> Result<Vec<QueryItem>> {
        let prompt = prompts::with_language(
            prompts::query_expansion_prompt(&job.query),
            job.language.as_deref(),
        );
        let stream = self
            .thinking
            .generate_with_system_stream(system, &prompt)
            .await
            .map_err(|e| Error::QueryGeneration(e.to_string()))?;

        let items = QueryPlanExtractor::with_mode(self.config.extraction_mode)
            .extract(stream)
            .await?;

        if items.is_empty() {
            return Err(Error::QueryGeneration(
                "model produced no usable queries".to_string(),
            ));
        }
        Ok(items)
    }

    async fn synthesize(
        &self,
        job: &ResearchJob,
        learnings: &[String],
        system: &str,
    ) -> Result<String> {
        let prompt = prompts::with_language(
            prompts::synthesis_prompt(&job.query, learnings),
            job.language.as_deref(),
        );
        let stream = self
            .thinking
            .generate_with_system_stream(system, &prompt)
            .await
            .map_err(|e| Error::ReportSynthesis(e.to_string()))?;

        let content = collect_stream(stream)
            .await
            .map_err(|e| Error::ReportSynthesis(e.to_string()))?;

        let content = content.trim();
        if content.is_empty() {
            return Err(Error::ReportSynthesis(
                "model produced an empty report".to_string(),
            ));
        }
        Ok(content.to_string())
    }

    /// Select the terminal message for an outcome. Exactly one of four
    /// shapes: failure, success with viewer link, success with raw id, or
    /// the ambiguous no-identifier outcome.
    fn terminal_message(&self, outcome: &JobOutcome, elapsed: f64) -> String {
        if outcome.status != JobStatus::Succeeded {
            let reason = outcome
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            return format!("Research failed after {:.1}s: {}", elapsed, reason);
        }

        match outcome.report {
            Some(ref report) => match self.viewer_url(&report.id) {
                Some(link) => format!(
                    "Research complete in {:.1}s. Read the report: {}",
                    elapsed, link
                ),
                None => format!(
                    "Research complete in {:.1}s. Report id: {}. Configure a \
                     public base URL to receive report links.",
                    elapsed, report.id
                ),
            },
            None => format!(
                "Research finished in {:.1}s, but no report identifier was produced.",
                elapsed
            ),
        }
    }

    fn viewer_url(&self, id: &str) -> Option<String> {
        self.config
            .public_base_url
            .as_ref()
            .map(|base| format!("{}/api/reports/{}", base.trim_end_matches('/'), id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::InMemoryStore;
    use delve_inference::MockBackend;

    fn pipeline_with(config: PipelineConfig) -> ResearchPipeline {
        ResearchPipeline::new(
            Arc::new(MockBackend::new()),
            Arc::new(MockBackend::new()),
            Arc::new(InMemoryStore::new()),
            WebhookNotifier::new().unwrap(),
            config,
        )
    }

    fn report(id: &str) -> Report {
        Report {
            id: id.to_string(),
            content: "# Report".to_string(),
            storage_url: None,
        }
    }

    #[test]
    fn test_terminal_message_failure_carries_elapsed_and_error() {
        let pipeline = pipeline_with(PipelineConfig::default());
        let outcome = JobOutcome::failed(
            Error::QueryGeneration("no usable queries".to_string()),
            Vec::new(),
        );

        let message = pipeline.terminal_message(&outcome, 12.3);
        assert!(message.contains("failed after 12.3s"));
        assert!(message.contains("no usable queries"));
    }

    #[test]
    fn test_terminal_message_success_with_viewer_link() {
        let pipeline = pipeline_with(PipelineConfig {
            public_base_url: Some("https://delve.example.com/".to_string()),
            ..Default::default()
        });
        let outcome = JobOutcome::succeeded(report("abc-123"), Vec::new());

        let message = pipeline.terminal_message(&outcome, 4.0);
        assert!(message.contains("complete in 4.0s"));
        assert!(message.contains("https://delve.example.com/api/reports/abc-123"));
    }

    #[test]
    fn test_terminal_message_success_without_base_url_warns() {
        let pipeline = pipeline_with(PipelineConfig::default());
        let outcome = JobOutcome::succeeded(report("abc-123"), Vec::new());

        let message = pipeline.terminal_message(&outcome, 4.0);
        assert!(message.contains("Report id: abc-123"));
        assert!(message.contains("public base URL"));
    }

    #[test]
    fn test_terminal_message_ambiguous_outcome() {
        let pipeline = pipeline_with(PipelineConfig::default());
        let outcome = JobOutcome {
            status: JobStatus::Succeeded,
            items: Vec::new(),
            report: None,
            error: None,
        };

        let message = pipeline.terminal_message(&outcome, 4.0);
        assert!(message.contains("no report identifier was produced"));
    }

    #[test]
    fn test_outcome_learnings_keep_order_and_skip_failures() {
        let mut processed_a = QueryItem::new("a", "g");
        processed_a.state = QueryItemState::Processed;
        processed_a.learning = "first".to_string();
        let mut failed = QueryItem::new("b", "g");
        failed.state = QueryItemState::Failed;
        let mut processed_c = QueryItem::new("c", "g");
        processed_c.state = QueryItemState::Processed;
        processed_c.learning = "second".to_string();

        let outcome = JobOutcome {
            status: JobStatus::Succeeded,
            items: vec![processed_a, failed, processed_c],
            report: None,
            error: None,
        };

        assert_eq!(outcome.learnings(), vec!["first", "second"]);
    }
}
