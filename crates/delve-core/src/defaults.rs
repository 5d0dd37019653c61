//! Centralized default constants for the delve research service.
//!
//! **This module is the single source of truth** for all shared default
//! values. All crates should reference these constants instead of defining
//! their own magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default OpenAI-compatible API endpoint.
pub const PROVIDER_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for query expansion and report synthesis.
pub const THINKING_MODEL: &str = "gpt-4o";

/// Default model for per-query retrieval.
pub const NETWORKING_MODEL: &str = "gpt-4o-mini-search-preview";

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 300;

/// Model-identifier substrings that mark a model as capable of grounded
/// web retrieval. Membership is configuration, not pipeline logic;
/// override with the `SEARCH_MODELS` env var (comma-separated).
pub const SEARCH_CAPABLE_MODELS: &[&str] = &["search-preview", "search", "sonar"];

/// Whether a model identifier matches the search-capable allow-list.
pub fn search_capable(model: &str, allow_list: &[String]) -> bool {
    allow_list.iter().any(|entry| model.contains(entry.as_str()))
}

/// Search-capable allow-list from the `SEARCH_MODELS` env var, falling back
/// to [`SEARCH_CAPABLE_MODELS`].
pub fn search_models_from_env() -> Vec<String> {
    match std::env::var("SEARCH_MODELS") {
        Ok(value) if !value.trim().is_empty() => value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => SEARCH_CAPABLE_MODELS.iter().map(|s| s.to_string()).collect(),
    }
}

// =============================================================================
// WEBHOOK DELIVERY
// =============================================================================

/// Default webhook HTTP request timeout in seconds.
pub const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Maximum delivery attempts per webhook call (including the initial one).
pub const WEBHOOK_MAX_ATTEMPTS: u32 = 3;

/// Initial backoff delay before the first retry, in seconds.
pub const WEBHOOK_BACKOFF_BASE_SECS: u64 = 2;

/// Cap on the exponential backoff delay, in seconds.
pub const WEBHOOK_BACKOFF_MAX_SECS: u64 = 8;

// =============================================================================
// REPORT STORAGE
// =============================================================================

/// Path prefix for persisted reports.
pub const REPORT_PATH_PREFIX: &str = "reports/";

/// Content type for persisted reports.
pub const REPORT_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Build the storage path for a report id.
pub fn report_path(id: &str) -> String {
    format!("{}{}.md", REPORT_PATH_PREFIX, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_is_consistent() {
        const {
            assert!(WEBHOOK_BACKOFF_BASE_SECS < WEBHOOK_BACKOFF_MAX_SECS);
            assert!(WEBHOOK_MAX_ATTEMPTS >= 1);
        }
        // 2s, 4s, 8s: doubling from base reaches exactly the cap
        assert_eq!(
            WEBHOOK_BACKOFF_BASE_SECS * 2 * 2,
            WEBHOOK_BACKOFF_MAX_SECS
        );
    }

    #[test]
    fn report_path_layout() {
        assert_eq!(report_path("abc-123"), "reports/abc-123.md");
    }

    #[test]
    fn search_capable_list_is_non_empty() {
        assert!(!SEARCH_CAPABLE_MODELS.is_empty());
    }

    #[test]
    fn search_capable_matches_by_substring() {
        let allow: Vec<String> = SEARCH_CAPABLE_MODELS.iter().map(|s| s.to_string()).collect();
        assert!(search_capable("gpt-4o-mini-search-preview", &allow));
        assert!(search_capable("sonar-pro", &allow));
        assert!(!search_capable("gpt-4o", &allow));
    }
}
