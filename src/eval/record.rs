//! Inference results and the run report written to disk.

use super::dataset::Question;
use crate::provider::{ChatMessage, ModelSpec, Role};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// One message of an agent conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TrajectoryStep {
    Human {
        content: String,
    },
    Ai {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRecord>,
    },
    Tool {
        name: String,
        content: String,
    },
}

impl TrajectoryStep {
    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::Ai {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

impl From<&ChatMessage> for TrajectoryStep {
    fn from(msg: &ChatMessage) -> Self {
        match msg.role {
            Role::User => Self::human(&msg.content),
            Role::Assistant => Self::Ai {
                content: msg.content.clone(),
                tool_calls: msg
                    .tool_calls
                    .iter()
                    .map(|call| ToolCallRecord {
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    })
                    .collect(),
            },
            Role::Tool => Self::Tool {
                name: msg.name.clone().unwrap_or_default(),
                content: msg.content.clone(),
            },
        }
    }
}

/// Last non-empty AI message, or "".
pub fn final_response(trajectory: &[TrajectoryStep]) -> String {
    trajectory
        .iter()
        .rev()
        .find_map(|step| match step {
            TrajectoryStep::Ai { content, .. } if !content.is_empty() => Some(content.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub category: Option<String>,
    pub complexity: Option<String>,
    #[serde(default)]
    pub expected_tools: Vec<String>,
    #[serde(default)]
    pub requires_auth: bool,
    pub model: ModelSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub question_id: String,
    pub question: String,
    pub final_response: Option<String>,
    #[serde(default)]
    pub trajectory: Vec<TrajectoryStep>,
    pub metadata: ResultMetadata,
    pub error: Option<String>,
}

impl InferenceResult {
    pub fn success(
        question: &Question,
        model: &ModelSpec,
        trajectory: Vec<TrajectoryStep>,
    ) -> Self {
        Self {
            question_id: question.id.clone(),
            question: question.question.clone(),
            final_response: Some(final_response(&trajectory)),
            trajectory,
            metadata: metadata(question, model),
            error: None,
        }
    }

    pub fn failure(question: &Question, model: &ModelSpec, error: impl ToString) -> Self {
        Self {
            question_id: question.id.clone(),
            question: question.question.clone(),
            final_response: None,
            trajectory: Vec::new(),
            metadata: metadata(question, model),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Every tool call made, in order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallRecord> {
        self.trajectory.iter().flat_map(|step| match step {
            TrajectoryStep::Ai { tool_calls, .. } => tool_calls.as_slice(),
            _ => &[][..],
        })
    }
}

fn metadata(question: &Question, model: &ModelSpec) -> ResultMetadata {
    ResultMetadata {
        category: question.category.clone(),
        complexity: question.complexity.clone(),
        expected_tools: question.expected_tools.clone(),
        requires_auth: question.requires_auth,
        model: model.clone(),
    }
}

/// The checkpoint and final output of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_timestamp: NaiveDateTime,
    pub model: ModelSpec,
    pub total_questions: usize,
    pub completed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<InferenceResult>,
}

impl RunReport {
    pub fn new(
        run_timestamp: NaiveDateTime,
        model: ModelSpec,
        total_questions: usize,
        results: Vec<InferenceResult>,
    ) -> Self {
        let successful = results.iter().filter(|r| r.is_success()).count();
        Self {
            run_timestamp,
            model,
            total_questions,
            completed: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }
}

/// `inference_<model>_<YYYYmmdd_HHMMSS>.json`
pub fn output_filename(model: &ModelSpec, timestamp: NaiveDateTime) -> String {
    format!(
        "inference_{}_{}.json",
        model.file_safe_name(),
        timestamp.format("%Y%m%d_%H%M%S")
    )
}

/// Text handed to a judge model. With `include_trajectory`, lists expected
/// tools and the tool calls actually made.
pub fn render_for_judge(result: &InferenceResult, include_trajectory: bool) -> String {
    let response = result.final_response.as_deref().unwrap_or("");
    if !include_trajectory {
        return response.to_string();
    }

    let mut output = format!("Final Response:\n{}\n\n", response);
    if !result.metadata.expected_tools.is_empty() {
        output.push_str(&format!(
            "Expected Tools: {}\n\n",
            result.metadata.expected_tools.join(", ")
        ));
    }
    output.push_str("Tool Calls Made:\n");
    let mut any = false;
    for call in result.tool_calls() {
        any = true;
        output.push_str(&format!("- {}({})\n", call.name, call.args));
    }
    if !any {
        output.push_str("- None\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question() -> Question {
        Question {
            id: "q_001".into(),
            question: "Quants crèdits té IA?".into(),
            category: Some("courses".into()),
            complexity: Some("simple".into()),
            expected_tools: vec!["get_course_details".into()],
            requires_auth: false,
        }
    }

    fn trajectory() -> Vec<TrajectoryStep> {
        vec![
            TrajectoryStep::human("Quants crèdits té IA?"),
            TrajectoryStep::Ai {
                content: String::new(),
                tool_calls: vec![ToolCallRecord {
                    name: "get_course_details".into(),
                    args: json!({"course_code": "IA"}),
                }],
            },
            TrajectoryStep::Tool {
                name: "get_course_details".into(),
                content: r#"{"credits": 6.0}"#.into(),
            },
            TrajectoryStep::ai("IA té 6 crèdits."),
        ]
    }

    #[test]
    fn trajectory_serializes_with_type_tags() {
        let value = serde_json::to_value(trajectory()).unwrap();
        assert_eq!(value[0], json!({"type": "human", "content": "Quants crèdits té IA?"}));
        assert_eq!(value[1]["tool_calls"][0]["name"], "get_course_details");
        assert_eq!(value[2]["type"], "tool");
        assert!(value[3].get("tool_calls").is_none());
    }

    #[test]
    fn chat_messages_map_to_steps() {
        use crate::provider::{ModelResponse, ToolCall};

        let call = ToolCall {
            id: "c1".into(),
            name: "get_course_details".into(),
            arguments: json!({"course_code": "IA"}),
        };
        let messages = vec![
            ChatMessage::user("Quants crèdits té IA?"),
            ChatMessage::from_response(&ModelResponse {
                content: String::new(),
                tool_calls: vec![call.clone()],
            }),
            ChatMessage::tool_result(&call, r#"{"credits": 6.0}"#),
            ChatMessage::assistant("IA té 6 crèdits."),
        ];
        let steps: Vec<TrajectoryStep> = messages.iter().map(TrajectoryStep::from).collect();
        assert_eq!(steps, trajectory());
    }

    #[test]
    fn success_takes_last_ai_text() {
        let result = InferenceResult::success(&question(), &ModelSpec::default(), trajectory());
        assert_eq!(result.final_response.as_deref(), Some("IA té 6 crèdits."));
        assert_eq!(result.metadata.expected_tools, vec!["get_course_details"]);
        assert!(result.is_success());
    }

    #[test]
    fn report_counts_failures() {
        let model = ModelSpec::default();
        let results = vec![
            InferenceResult::success(&question(), &model, trajectory()),
            InferenceResult::failure(&question(), &model, "Rate limited"),
        ];
        let ts = crate::models::de::parse("2025-03-01T10:20:30").unwrap();
        let report = RunReport::new(ts, model.clone(), 5, results);
        assert_eq!((report.completed, report.successful, report.failed), (2, 1, 1));
        assert!(report.results[1].final_response.is_none());

        assert_eq!(output_filename(&model, ts), "inference_gemini-2.5-flash_20250301_102030.json");
    }

    #[test]
    fn judge_input_lists_tool_calls() {
        let result = InferenceResult::success(&question(), &ModelSpec::default(), trajectory());
        let rendered = render_for_judge(&result, true);
        assert!(rendered.starts_with("Final Response:\nIA té 6 crèdits.\n\n"));
        assert!(rendered.contains("Expected Tools: get_course_details\n"));
        assert!(rendered.contains(r#"- get_course_details({"course_code":"IA"})"#));
        assert_eq!(render_for_judge(&result, false), "IA té 6 crèdits.");

        let failed = InferenceResult::failure(&question(), &ModelSpec::default(), "boom");
        assert!(render_for_judge(&failed, true).ends_with("Tool Calls Made:\n- None\n"));
    }
}
