//! Sub-agent tool: delegates a task to a child agent loop.
//!
//! The parent model calls it like any other tool, passing a natural-language
//! `task`. Each call starts a fresh conversation with the sub-agent's own
//! system prompt and tools, and the sub-agent's final text is the tool
//! output. Sub-agents are never given other sub-agents.

use crate::agent_loop::{agent_loop, final_text, AgentLoopConfig, DEFAULT_MAX_TURNS};
use crate::provider::{ModelBackend, ProviderError, Role};
use crate::retry::RetryConfig;
use crate::tools::common::error_result;
use crate::types::*;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A tool that runs its own agent loop.
pub struct SubAgentTool {
    tool_name: String,
    tool_description: String,
    system_prompt: String,
    backend: Arc<dyn ModelBackend>,
    tools: Vec<Box<dyn AgentTool>>,
    retry: RetryConfig,
    max_turns: usize,
}

impl SubAgentTool {
    pub fn new(name: impl Into<String>, backend: Arc<dyn ModelBackend>) -> Self {
        let name = name.into();
        Self {
            tool_description: format!("Delegate a task to the {} sub-agent", name),
            tool_name: name,
            system_prompt: String::new(),
            backend,
            tools: Vec::new(),
            retry: RetryConfig::default(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.tool_description = description.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<Box<dyn AgentTool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }
}

#[async_trait::async_trait]
impl AgentTool for SubAgentTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn label(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.tool_description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "The task to delegate to this sub-agent"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        params: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let task = params
            .get("task")
            .and_then(|v| v.as_str())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArgs("Missing required 'task' parameter".into()))?;
        debug!("{}: {}", self.tool_name, task);

        let config = AgentLoopConfig {
            backend: self.backend.as_ref(),
            system_prompt: &self.system_prompt,
            tools: &self.tools,
            max_turns: self.max_turns,
            retry: self.retry.clone(),
            temperature: None,
        };
        let messages = match agent_loop(task, &config, &cancel).await {
            Ok(messages) => messages,
            Err(ProviderError::Cancelled) => return Err(ToolError::Cancelled),
            Err(e) => {
                warn!("{} failed: {}", self.tool_name, e);
                return Ok(error_result("Sub-agent failed", &e.to_string()));
            }
        };

        let tool_calls: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| m.tool_calls.iter().map(|c| c.name.as_str()))
            .collect();
        let text = final_text(&messages)
            .unwrap_or("(sub-agent produced no text output)")
            .to_string();

        Ok(ToolResult {
            content: vec![Content::text(text)],
            details: json!({
                "sub_agent": self.tool_name,
                "turns": messages.len(),
                "tool_calls": tool_calls,
            }),
        })
    }
}
