//! Shared helpers for the FIB tools: argument parsing, result formatting and
//! rendering of API errors.

use crate::error::ApiError;
use crate::types::*;
use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Text returned for an empty result list.
pub const NO_RESULTS: &str = "No results found.";

/// Render a list of results as `{count, results, summary}`.
pub fn format_tool_response(results: Vec<Value>, summary: impl Into<String>) -> ToolResult {
    let count = results.len();
    if count == 0 {
        return ToolResult {
            content: vec![Content::text(NO_RESULTS)],
            details: json!({ "count": 0 }),
        };
    }
    let body = json!({
        "count": count,
        "results": results,
        "summary": summary.into(),
    });
    ToolResult {
        content: vec![Content::text(pretty(&body))],
        details: json!({ "count": count }),
    }
}

/// Render a single object.
pub fn format_object(value: Value) -> ToolResult {
    ToolResult {
        content: vec![Content::text(pretty(&value))],
        details: json!({ "count": 1 }),
    }
}

/// Turn an API failure into a user-facing `{error, message}` result.
///
/// Cancellation is the only error surfaced as a tool failure.
pub fn api_error(tool: &str, err: ApiError) -> Result<ToolResult, ToolError> {
    if matches!(err, ApiError::Cancelled) {
        return Err(ToolError::Cancelled);
    }
    if err.is_auth() {
        debug!("{}: {}", tool, err);
    } else {
        warn!("{} failed: {}", tool, err);
    }
    Ok(error_result(err.label(), &err.user_message()))
}

pub fn error_result(error: &str, message: &str) -> ToolResult {
    let body = json!({ "error": error, "message": message });
    ToolResult {
        content: vec![Content::text(pretty(&body))],
        details: json!({ "error": error }),
    }
}

/// Deserialize tool arguments. A missing or `null` argument object means
/// "all defaults".
pub fn parse_args<T: DeserializeOwned>(params: Value) -> Result<T, ToolError> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| ToolError::InvalidArgs(e.to_string()))
}

/// Parse a `YYYY-MM-DD` (or full ISO-8601) argument.
pub fn parse_date_arg(name: &str, raw: Option<&str>) -> Result<Option<NaiveDateTime>, ToolError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => crate::models::de::parse(raw).map(Some).ok_or_else(|| {
            ToolError::InvalidArgs(format!("{} must be a date in YYYY-MM-DD format", name))
        }),
    }
}

pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(23, 59, 59).unwrap_or_else(|| date.and_time(Default::default()))
}

/// Case-insensitive substring match.
pub fn matches_query(text: &str, query: &str) -> bool {
    text.to_lowercase().contains(&query.trim().to_lowercase())
}

pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Cut `text` to `max` characters, appending `...` when shortened.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// `None` for empty strings, so optional fields render as JSON null.
pub fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Accept `"2"` or `2` for fields models tend to send either way.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        S(String),
        N(serde_json::Number),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::S(s)) => Some(s),
        Some(Raw::N(n)) => Some(n.to_string()),
    })
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
