//! Faculty news tool.

use super::common::*;
use crate::api::FibClient;
use crate::models::NewsItem;
use crate::types::*;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

const SUMMARY_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct NewsArgs {
    limit: usize,
    since_date: Option<String>,
}

impl Default for NewsArgs {
    fn default() -> Self {
        Self {
            limit: 5,
            since_date: None,
        }
    }
}

/// Newest items first, at most `limit`.
pub fn latest_news(items: &[NewsItem], since: Option<NaiveDateTime>, limit: usize) -> Vec<Value> {
    let mut matching: Vec<&NewsItem> = items
        .iter()
        .filter(|item| since.map_or(true, |since| item.data_publicacio >= since))
        .collect();
    matching.sort_by(|a, b| b.data_publicacio.cmp(&a.data_publicacio));
    matching
        .into_iter()
        .take(limit)
        .map(|item| {
            json!({
                "title": item.titol,
                "date": item.data_publicacio.format("%Y-%m-%d").to_string(),
                "summary": truncate_chars(&item.plain_description(), SUMMARY_CHARS),
                "link": item.link,
            })
        })
        .collect()
}

pub struct NewsTool {
    client: FibClient,
}

impl NewsTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for NewsTool {
    fn name(&self) -> &str {
        "get_fib_news"
    }

    fn label(&self) -> &str {
        "FIB News"
    }

    fn description(&self) -> &str {
        "Get the latest FIB news and announcements, newest first (default 5), optionally only \
        those published since a date (YYYY-MM-DD)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum items (default 5)"
                },
                "since_date": { "type": "string", "description": "YYYY-MM-DD" }
            }
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let args: NewsArgs = parse_args(params)?;
        let since = parse_date_arg("since_date", args.since_date.as_deref())?;
        let items = match self.client.news(&cancel).await {
            Ok(items) => items,
            Err(e) => return api_error(self.name(), e),
        };
        let results = latest_news(&items, since, args.limit);
        let summary = format!("Latest {} news item(s) from FIB", results.len());
        Ok(format_tool_response(results, summary))
    }
}
