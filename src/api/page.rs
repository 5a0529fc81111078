//! One page of raw API results.

use crate::error::ApiError;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Absolute URL of the next page.
    pub next: Option<String>,
    /// Total item count reported by the server.
    pub count: Option<u64>,
}

impl Page {
    /// Parse a response body in any of the shapes the API returns:
    ///
    /// - paginated object `{"count", "next", "previous", "results"}`
    /// - bare array (no follow-up page)
    /// - single object (one item, no follow-up page)
    pub fn from_json(body: Value) -> Result<Self, ApiError> {
        match body {
            Value::Array(items) => Ok(Self {
                items,
                next: None,
                count: None,
            }),
            Value::Object(mut map) if map.contains_key("results") => {
                let items = match map.remove("results") {
                    Some(Value::Array(items)) => items,
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => {
                        return Err(ApiError::InvalidResponse(format!(
                            "`results` is not an array: {}",
                            type_name(&other)
                        )))
                    }
                };
                let next = match map.remove("next") {
                    Some(Value::String(url)) if !url.trim().is_empty() => Some(url),
                    _ => None,
                };
                let count = map.get("count").and_then(Value::as_u64);
                Ok(Self { items, next, count })
            }
            Value::Object(map) => Ok(Self {
                items: vec![Value::Object(map)],
                next: None,
                count: None,
            }),
            other => Err(ApiError::InvalidResponse(format!(
                "expected a JSON object or array, got {}",
                type_name(&other)
            ))),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
