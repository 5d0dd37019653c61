//! Structured logging schema and field name constants for delve.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (stream chunks) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "pipeline", "inference", "notify", "store"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "generate_queries", "process_query", "synthesize", "deliver"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Research query text.
pub const QUERY: &str = "query";

/// Report identifier.
pub const REPORT_ID: &str = "report_id";

/// Webhook target URL.
pub const CALLBACK_URL: &str = "callback_url";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of planned sub-queries in a job.
pub const QUERY_COUNT: &str = "query_count";

/// Number of learnings collected for synthesis.
pub const LEARNING_COUNT: &str = "learning_count";

/// Byte length of a prompt or response.
pub const RESPONSE_LEN: &str = "response_len";

/// Delivery attempt number (1-based).
pub const ATTEMPT: &str = "attempt";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
