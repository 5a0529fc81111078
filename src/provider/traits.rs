use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// The output of a tool the assistant called.
    Tool,
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// A tool offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Calls made in an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool turns: the call this answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on tool turns: the tool that ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// The assistant turn that produced `response`.
    pub fn from_response(response: &ModelResponse) -> Self {
        Self {
            tool_calls: response.tool_calls.clone(),
            ..Self::assistant(&response.content)
        }
    }

    /// The result of running `call`.
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            ..Self::new(Role::Tool, content)
        }
    }
}

/// One non-streaming completion request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerateRequest {
    /// A single user turn.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(text)],
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// The assistant's reply: text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A language model the agent or the eval runner can talk to.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Model name as reported in results, e.g. `gemini-2.5-flash`.
    fn name(&self) -> &str;

    /// Generate the assistant's next turn. With `request.tools` set the
    /// reply may ask for tool calls instead of answering.
    async fn generate(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<ModelResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("Rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },
    #[error("Cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Map a non-success HTTP status to an error kind.
    pub fn classify(status: u16, message: &str, retry_after_ms: Option<u64>) -> Self {
        match status {
            401 | 403 => Self::Auth(message.to_string()),
            429 => Self::RateLimited { retry_after_ms },
            500..=599 => Self::Network(message.to_string()),
            _ => Self::Api(message.to_string()),
        }
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_status() {
        assert!(matches!(
            ProviderError::classify(401, "no", None),
            ProviderError::Auth(_)
        ));
        assert!(matches!(
            ProviderError::classify(429, "slow down", Some(2000)),
            ProviderError::RateLimited {
                retry_after_ms: Some(2000)
            }
        ));
        assert!(matches!(
            ProviderError::classify(502, "bad gateway", None),
            ProviderError::Network(_)
        ));
        assert!(matches!(
            ProviderError::classify(400, "bad", None),
            ProviderError::Api(_)
        ));
    }

    #[test]
    fn prompt_builds_single_user_turn() {
        let req = GenerateRequest::prompt("hola").with_system_prompt("be brief");
        assert_eq!(req.messages, vec![ChatMessage::user("hola")]);
        assert_eq!(req.system_prompt, "be brief");
    }

    #[test]
    fn tool_result_answers_its_call() {
        let call = ToolCall {
            id: "call-1".into(),
            name: "search_courses".into(),
            arguments: serde_json::json!({ "query": "IA" }),
        };
        let msg = ChatMessage::tool_result(&call, "[]");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(msg.name.as_deref(), Some("search_courses"));

        let turn = ChatMessage::from_response(&ModelResponse {
            content: String::new(),
            tool_calls: vec![call.clone()],
        });
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.tool_calls, vec![call]);
    }
}
