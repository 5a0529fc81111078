//! The agent loop: prompt → model → tool calls → repeat.
//!
//! The model is offered the tools' schemas each turn. Tool calls run one at a
//! time, in the order the model asked for them, and their output goes back as
//! tool turns. The loop ends when the model answers without calling a tool or
//! the turn limit is hit.

use crate::provider::{
    generate_with_retry, ChatMessage, GenerateRequest, ModelBackend, ProviderError, Role,
    ToolCall, ToolSpec,
};
use crate::retry::RetryConfig;
use crate::types::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Model turns allowed per run.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Configuration for one run of the loop.
pub struct AgentLoopConfig<'a> {
    pub backend: &'a dyn ModelBackend,
    pub system_prompt: &'a str,
    pub tools: &'a [Box<dyn AgentTool>],
    pub max_turns: usize,
    pub retry: RetryConfig,
    pub temperature: Option<f32>,
}

/// The schema of every tool, as offered to the model.
pub fn tool_specs(tools: &[Box<dyn AgentTool>]) -> Vec<ToolSpec> {
    tools
        .iter()
        .map(|t| ToolSpec {
            name: t.name().to_string(),
            description: t.description().to_string(),
            parameters: t.parameters_schema(),
        })
        .collect()
}

/// Run the loop from a single user prompt. Returns the conversation, prompt
/// first.
///
/// Tool failures are reported to the model as tool output. Model errors and
/// cancellation end the run.
pub async fn agent_loop(
    prompt: impl Into<String>,
    config: &AgentLoopConfig<'_>,
    cancel: &CancellationToken,
) -> Result<Vec<ChatMessage>, ProviderError> {
    let mut messages = vec![ChatMessage::user(prompt)];
    let specs = tool_specs(config.tools);

    for turn in 1..=config.max_turns {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let request = GenerateRequest {
            system_prompt: config.system_prompt.to_string(),
            messages: messages.clone(),
            tools: specs.clone(),
            temperature: config.temperature,
            max_tokens: None,
        };
        let response =
            generate_with_retry(config.backend, request, &config.retry, cancel).await?;
        messages.push(ChatMessage::from_response(&response));

        if !response.has_tool_calls() {
            debug!("Agent answered after {} turn(s)", turn);
            return Ok(messages);
        }

        for call in &response.tool_calls {
            let output = execute_tool_call(config.tools, call, cancel).await?;
            messages.push(ChatMessage::tool_result(call, output));
        }
    }

    warn!("Agent stopped after {} turns", config.max_turns);
    messages.push(ChatMessage::user(format!(
        "[Agent stopped: max turns ({}) reached]",
        config.max_turns
    )));
    Ok(messages)
}

/// The final assistant text of a conversation, if any.
pub fn final_text(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .filter(|m| m.role == Role::Assistant)
        .map(|m| m.content.as_str())
        .find(|text| !text.is_empty())
}

async fn execute_tool_call(
    tools: &[Box<dyn AgentTool>],
    call: &ToolCall,
    cancel: &CancellationToken,
) -> Result<String, ProviderError> {
    let Some(tool) = tools.iter().find(|t| t.name() == call.name) else {
        warn!("Model called unknown tool {}", call.name);
        return Ok(ToolError::NotFound(call.name.clone()).to_string());
    };

    debug!("Tool call {} {}({})", call.id, call.name, call.arguments);
    match tool
        .execute(&call.id, call.arguments.clone(), cancel.child_token())
        .await
    {
        Ok(result) => Ok(result.text()),
        Err(ToolError::Cancelled) => Err(ProviderError::Cancelled),
        Err(e) => Ok(e.to_string()),
    }
}
