//! Streaming JSON extraction of model-generated query plans.
//!
//! Models asked for a JSON array of sub-queries produce text that is close
//! to JSON but frequently not quite: wrapped in code fences, keys unquoted,
//! strings single-quoted. This module accumulates the streamed response and
//! extracts a validated query plan through a bounded set of textual repairs.
//!
//! The repair transforms are heuristic. Replacing single quotes with double
//! quotes can corrupt legitimately quoted content containing apostrophes;
//! that is an accepted limitation, not something this module tries to
//! out-clever.

use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use delve_core::{Error, QueryItem, Result};
use delve_inference::TokenStream;

/// Matches a bare identifier key followed by a colon, e.g. `{query:` or
/// `, researchGoal :`.
static BARE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"#).unwrap());

/// Result of a tolerant parse attempt. Never an error: failure is a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Strict parse succeeded, no repair needed.
    Parsed(Value),
    /// Strict parse succeeded after textual repair.
    Repaired(Value),
    /// Unparseable even after repair.
    Failed,
}

impl ParseOutcome {
    /// The parsed value, if any.
    pub fn into_value(self) -> Option<Value> {
        match self {
            ParseOutcome::Parsed(v) | ParseOutcome::Repaired(v) => Some(v),
            ParseOutcome::Failed => None,
        }
    }
}

/// Strip a surrounding markdown code fence (with optional language tag).
///
/// Returns the inner text trimmed. Text without fences passes through
/// unchanged apart from trimming.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(stripped) = rest.strip_suffix("```") else {
        return trimmed;
    };

    // Drop the language tag on the opening fence line, if present
    match stripped.split_once('\n') {
        Some((first_line, body)) if !first_line.trim().contains(['{', '[']) => body.trim(),
        _ => stripped.trim(),
    }
}

/// Quote bare identifier keys: `{query: 1}` becomes `{"query": 1}`.
fn quote_bare_keys(text: &str) -> String {
    BARE_KEY.replace_all(text, "$1\"$2\":").into_owned()
}

/// Replace single quotes with double quotes.
fn normalize_quotes(text: &str) -> String {
    text.replace('\'', "\"")
}

/// Attempt to parse model output as JSON, applying bounded textual repairs
/// on failure.
///
/// Strips code fences, tries a strict parse, and on failure applies exactly
/// two transforms in sequence — quote bare keys, then normalize single
/// quotes — before retrying once. Failure is returned as
/// [`ParseOutcome::Failed`], never raised.
pub fn tolerant_parse(raw: &str) -> ParseOutcome {
    let text = strip_code_fences(raw);

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return ParseOutcome::Parsed(value);
    }

    let repaired = normalize_quotes(&quote_bare_keys(text));
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => ParseOutcome::Repaired(value),
        Err(_) => ParseOutcome::Failed,
    }
}

/// Validate that a parsed value is an ordered sequence of query items.
///
/// Succeeds only for an array of objects each carrying string `query` and
/// `researchGoal` fields; any additional fields are discarded. Returns
/// `None` on structural mismatch — validation failure is not a fault.
pub fn validate_query_plan(value: &Value) -> Option<Vec<QueryItem>> {
    let entries = value.as_array()?;
    let mut items = Vec::with_capacity(entries.len());

    for entry in entries {
        let object = entry.as_object()?;
        let query = object.get("query")?.as_str()?;
        let research_goal = object.get("researchGoal")?.as_str()?;
        items.push(QueryItem::new(query, research_goal));
    }

    Some(items)
}

/// When the accumulator attempts extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    /// Consume the whole stream, then parse once. The production default.
    #[default]
    FullAccumulation,
    /// Attempt a parse after every chunk and stop consuming as soon as a
    /// schema-conforming array appears. Lower latency, but truncated
    /// output that happens to parse is accepted as-is.
    EarlyExit,
}

/// Accumulates a streamed model response and extracts a validated query
/// plan from it.
#[derive(Debug, Default)]
pub struct QueryPlanExtractor {
    mode: ExtractionMode,
    buffer: String,
}

impl QueryPlanExtractor {
    /// Create an extractor in full-accumulation mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor with an explicit mode.
    pub fn with_mode(mode: ExtractionMode) -> Self {
        Self {
            mode,
            buffer: String::new(),
        }
    }

    /// Consume the stream and extract the query plan.
    ///
    /// Any failure — a stream fault, or stream end without a
    /// schema-conforming array — is a query-generation error.
    pub async fn extract(mut self, mut stream: TokenStream) -> Result<Vec<QueryItem>> {
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| Error::QueryGeneration(format!("stream fault: {}", e)))?;
            self.buffer.push_str(&chunk);

            if self.mode == ExtractionMode::EarlyExit {
                if let Some(items) = self.try_extract() {
                    return Ok(items);
                }
            }
        }

        self.try_extract().ok_or_else(|| {
            Error::QueryGeneration("stream ended without a valid query array".to_string())
        })
    }

    /// Accumulated raw text seen so far.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    fn try_extract(&self) -> Option<Vec<QueryItem>> {
        tolerant_parse(&self.buffer)
            .into_value()
            .and_then(|v| validate_query_plan(&v))
    }
}
