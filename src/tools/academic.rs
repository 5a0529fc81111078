//! Academic term tools.

use super::common::*;
use crate::api::FibClient;
use crate::models::AcademicTerm;
use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TermQuery {
    pub current_only: bool,
    pub year: Option<i32>,
}

/// Matching terms, newest first.
pub fn academic_terms(terms: &[AcademicTerm], query: &TermQuery) -> Vec<Value> {
    let mut matching: Vec<&AcademicTerm> = terms
        .iter()
        .filter(|t| !query.current_only || t.is_current())
        .filter(|t| query.year.is_none() || t.year() == query.year)
        .collect();
    matching.sort_by(|a, b| b.id.cmp(&a.id));
    matching
        .into_iter()
        .map(|t| {
            json!({
                "id": t.id,
                "year": t.year(),
                "semester": t.semester().map(|s| format!("Q{}", s)),
                "is_current": t.is_current(),
                "has_current_schedules": t.has_current_schedules(),
            })
        })
        .collect()
}

async fn run(
    tool: &str,
    client: &FibClient,
    query: TermQuery,
    cancel: &CancellationToken,
) -> Result<ToolResult, ToolError> {
    let terms = match client.academic_terms(cancel).await {
        Ok(terms) => terms,
        Err(e) => return api_error(tool, e),
    };
    let mut results = academic_terms(&terms, &query);
    if query.current_only && !results.is_empty() {
        return Ok(format_object(results.swap_remove(0)));
    }
    let summary = format!("Found {} academic term(s)", results.len());
    Ok(format_tool_response(results, summary))
}

/// List academic terms.
pub struct AcademicTermsTool {
    client: FibClient,
}

impl AcademicTermsTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for AcademicTermsTool {
    fn name(&self) -> &str {
        "get_academic_terms"
    }

    fn label(&self) -> &str {
        "Academic Terms"
    }

    fn description(&self) -> &str {
        "List FIB academic terms (e.g. 2024Q2), newest first. Optionally only the current term or \
        the terms of one year."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "current_only": { "type": "boolean", "description": "Only the current term" },
                "year": {
                    "type": "integer",
                    "description": "Calendar year of the term id, e.g. 2024"
                }
            }
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let query: TermQuery = parse_args(params)?;
        run(self.name(), &self.client, query, &cancel).await
    }
}

/// The current academic term.
pub struct CurrentTermTool {
    client: FibClient,
}

impl CurrentTermTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for CurrentTermTool {
    fn name(&self) -> &str {
        "get_current_term"
    }

    fn label(&self) -> &str {
        "Current Term"
    }

    fn description(&self) -> &str {
        "Get the current FIB academic term."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        _params: Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let query = TermQuery {
            current_only: true,
            year: None,
        };
        run(self.name(), &self.client, query, &cancel).await
    }
}
