//! Webhook notifier with bounded retry for transient transport faults.
//!
//! Two delivery classes exist:
//! - progress notifications are fire-and-forget: spawned, logged, never
//!   awaited by the caller;
//! - the terminal notification is awaited, but its failure is logged only —
//!   a job's outcome is independent of whether the webhook heard about it.
//!
//! Retries apply only to faults classified as transient transport failures
//! (timeout, refused/reset connections, handshake failures). Anything else,
//! including a non-2xx response from the target, surfaces after a single
//! attempt.

use std::time::Duration;

use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use delve_core::defaults;
use delve_core::{Error, NotificationPayload, Result};

/// Configuration for retry behavior on transient webhook delivery faults.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::WEBHOOK_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(defaults::WEBHOOK_BACKOFF_BASE_SECS),
            max_delay: Duration::from_secs(defaults::WEBHOOK_BACKOFF_MAX_SECS),
        }
    }
}

impl RetryConfig {
    /// Backoff delay after the given number of completed attempts (1-based).
    pub fn delay_after(&self, completed_attempts: u32) -> Duration {
        let factor = 1u32 << (completed_attempts.saturating_sub(1)).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Detect transient transport faults eligible for retry.
///
/// The predicate is intentionally narrow: connection-level failures resolve
/// on their own, while application-level rejections (a 4xx body, a malformed
/// URL) never do and must not be hammered.
pub fn is_transient_transport_error(e: &reqwest::Error) -> bool {
    if e.is_timeout() || e.is_connect() {
        return true;
    }

    // Resets and handshake faults surface deeper in the source chain
    let mut source: Option<&dyn std::error::Error> = Some(e);
    while let Some(err) = source {
        let msg = err.to_string().to_lowercase();
        if msg.contains("connection reset")
            || msg.contains("connection closed")
            || msg.contains("broken pipe")
            || msg.contains("handshake")
        {
            return true;
        }
        source = err.source();
    }

    false
}

/// Delivers `{text}` payloads to a webhook target.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    retry: RetryConfig,
}

impl WebhookNotifier {
    /// Create a notifier with the default retry policy.
    pub fn new() -> Result<Self> {
        Self::with_retry(RetryConfig::default())
    }

    /// Create a notifier with an explicit retry policy.
    pub fn with_retry(retry: RetryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::WEBHOOK_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Notification(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, retry })
    }

    /// Deliver one payload, retrying transient transport faults with
    /// exponential backoff.
    pub async fn deliver(&self, url: &str, text: &str) -> Result<()> {
        let payload = NotificationPayload {
            text: text.to_string(),
        };

        let mut attempt = 1u32;
        loop {
            match self.client.post(url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(attempt, "Webhook delivered");
                    return Ok(());
                }
                Ok(response) => {
                    // Application-level rejection: never retried
                    return Err(Error::Notification(format!(
                        "webhook target returned {}",
                        response.status()
                    )));
                }
                Err(e) if attempt < self.retry.max_attempts
                    && is_transient_transport_error(&e) =>
                {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient webhook delivery fault, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(Error::Notification(format!(
                        "delivery failed after {} attempt(s): {}",
                        attempt, e
                    )));
                }
            }
        }
    }

    /// Fire-and-forget progress notification. Absent target is a no-op.
    pub fn notify_progress(&self, url: Option<&str>, text: impl Into<String>) {
        let Some(url) = url else { return };
        let notifier = self.clone();
        let url = url.to_string();
        let text = text.into();
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(&url, &text).await {
                warn!(error = %e, "Progress notification failed");
            }
        });
    }

    /// Terminal notification: awaited, failure logged but never escalated.
    /// Absent target is a no-op.
    pub async fn notify_terminal(&self, url: Option<&str>, text: &str) {
        let Some(url) = url else { return };
        if let Err(e) = self.deliver(url, text).await {
            error!(error = %e, "Terminal notification failed");
        }
    }
}
