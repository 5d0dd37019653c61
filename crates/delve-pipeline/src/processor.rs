//! Per-query processor: one retrieval call per planned sub-query, with the
//! item as the failure boundary.

use tracing::{debug, warn};

use delve_core::{Error, QueryItem, QueryItemState, Result};
use delve_inference::{collect_stream, StreamingGeneration};

use crate::prompts;

/// Process a single query item against the retrieval backend.
///
/// On success the item transitions to `Processed` with the retrieved text as
/// its learning. Any fault — backend error or mid-stream failure — marks the
/// item `Failed` and is contained here; it never propagates to the job.
pub async fn process_query(
    networking: &dyn StreamingGeneration,
    system: &str,
    item: &mut QueryItem,
    language: Option<&str>,
) {
    match retrieve(networking, system, item, language).await {
        Ok(learning) => {
            debug!(
                query = %item.query,
                response_len = learning.len(),
                "Query processed"
            );
            item.learning = learning;
            item.state = QueryItemState::Processed;
        }
        Err(e) => {
            warn!(query = %item.query, error = %e, "Query processing failed, continuing");
            item.state = QueryItemState::Failed;
        }
    }
}

async fn retrieve(
    networking: &dyn StreamingGeneration,
    system: &str,
    item: &QueryItem,
    language: Option<&str>,
) -> Result<String> {
    let prompt = prompts::with_language(prompts::retrieval_prompt(item), language);
    let stream = networking
        .generate_with_system_stream(system, &prompt)
        .await
        .map_err(|e| Error::ItemProcessing(e.to_string()))?;
    collect_stream(stream)
        .await
        .map_err(|e| Error::ItemProcessing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_inference::MockBackend;

    #[tokio::test]
    async fn test_success_transitions_to_processed() {
        let backend = MockBackend::new().with_reply("tea was first cultivated in China");
        let mut item = QueryItem::new("tea origins", "establish earliest cultivation");

        process_query(&backend, "system", &mut item, None).await;

        assert_eq!(item.state, QueryItemState::Processed);
        assert_eq!(item.learning, "tea was first cultivated in China");
    }

    #[tokio::test]
    async fn test_backend_error_marks_item_failed_without_raising() {
        let backend = MockBackend::new().with_error("model overloaded");
        let mut item = QueryItem::new("tea origins", "goal");

        process_query(&backend, "system", &mut item, None).await;

        assert_eq!(item.state, QueryItemState::Failed);
        assert!(item.learning.is_empty());
    }

    #[tokio::test]
    async fn test_mid_stream_fault_marks_item_failed() {
        let backend = MockBackend::new().with_stream_fault(["partial "], "stream dropped");
        let mut item = QueryItem::new("tea origins", "goal");

        process_query(&backend, "system", &mut item, None).await;

        assert_eq!(item.state, QueryItemState::Failed);
        assert!(item.learning.is_empty());
    }

    #[tokio::test]
    async fn test_language_directive_reaches_prompt() {
        let backend = MockBackend::new().with_reply("ok");
        let mut item = QueryItem::new("q", "g");

        process_query(&backend, "system", &mut item, Some("zh-CN")).await;

        let calls = backend.calls();
        assert!(calls[0].prompt.contains("Respond in zh-CN."));
    }
}
