//! Classroom listing tool.

use super::common::*;
use crate::api::FibClient;
use crate::models::Classroom;
use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Placeholder room the API lists for "no room assigned".
const PLACEHOLDER_ROOM: &str = "**";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClassroomQuery {
    /// Building letter, e.g. A.
    pub building: Option<String>,
    /// Room id prefix, e.g. A5. Takes precedence over `building`.
    pub prefix: Option<String>,
}

impl ClassroomQuery {
    pub fn matches(&self, room: &Classroom) -> bool {
        if room.id == PLACEHOLDER_ROOM {
            return false;
        }
        if let Some(prefix) = &self.prefix {
            return room.id.to_uppercase().starts_with(&prefix.trim().to_uppercase());
        }
        match &self.building {
            Some(building) => eq_ignore_case(&room.building(), building),
            None => true,
        }
    }

    pub fn summary(&self, count: usize) -> String {
        let mut summary = format!("Found {} classroom(s)", count);
        if let Some(prefix) = &self.prefix {
            summary.push_str(&format!(" with prefix '{}'", prefix));
        } else if let Some(building) = &self.building {
            summary.push_str(&format!(" in building {}", building));
        }
        summary
    }
}

pub fn list_classrooms(rooms: &[Classroom], query: &ClassroomQuery) -> Vec<Value> {
    let mut matching: Vec<&Classroom> = rooms.iter().filter(|r| query.matches(r)).collect();
    matching.sort_by(|a, b| a.id.cmp(&b.id));
    matching
        .into_iter()
        .map(|room| {
            let mut building = room.building();
            if building.is_empty() {
                building = "Other".into();
            }
            json!({ "id": room.id, "building": building })
        })
        .collect()
}

pub struct ListClassroomsTool {
    client: FibClient,
}

impl ListClassroomsTool {
    pub fn new(client: FibClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AgentTool for ListClassroomsTool {
    fn name(&self) -> &str {
        "list_classrooms"
    }

    fn label(&self) -> &str {
        "List Classrooms"
    }

    fn description(&self) -> &str {
        "List FIB classrooms, optionally by building letter (A, B, C, D...) or by room id prefix \
        (e.g. A5 for A5001, A5E01). The prefix wins when both are given."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "building": { "type": "string", "description": "Building letter" },
                "prefix": { "type": "string", "description": "Room id prefix" }
            }
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let query: ClassroomQuery = parse_args(params)?;
        let rooms = match self.client.classrooms(&cancel).await {
            Ok(rooms) => rooms,
            Err(e) => return api_error(self.name(), e),
        };
        let results = list_classrooms(&rooms, &query);
        let summary = query.summary(results.len());
        Ok(format_tool_response(results, summary))
    }
}
