//! The FIB assistant: personal-data tools at the root, public data behind a
//! sub-agent.
//!
//! ```text
//! root agent ── get_my_profile, get_my_courses, get_my_schedule, get_my_notices
//!      └── public_fib_agent ── search_courses, search_exams, ... list_classrooms
//! ```

use crate::agent_loop::{agent_loop, AgentLoopConfig, DEFAULT_MAX_TURNS};
use crate::api::FibClient;
use crate::provider::{ChatMessage, ModelBackend, ProviderError};
use crate::retry::RetryConfig;
use crate::sub_agent::SubAgentTool;
use crate::tools::{private_tools, public_tools};
use crate::types::AgentTool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const PUBLIC_AGENT_NAME: &str = "public_fib_agent";

pub const PUBLIC_AGENT_DESCRIPTION: &str = "Searches and retrieves public FIB data: \
the course catalogue and course details, exam schedules, professors, academic terms, \
news and classrooms. Give it a self-contained task.";

pub const PUBLIC_SYSTEM_PROMPT: &str = "You look up public data of the Facultat \
d'Informàtica de Barcelona (FIB, UPC) with the tools you have.\n\
\n\
- Time-relative exam questions (\"next week\", \"soon\") use get_upcoming_exams; \
exams of one course use search_exams with course_code.\n\
- Look a course up with search_courses, then get_course_details for the full record.\n\
- Classroom buildings are single letters (A, B, C, D).\n\
- If a search finds nothing, try another query before giving up.\n\
\n\
Answer with the data found: tables for several items of the same kind, bullets for \
one item. When nothing is found say so plainly, without guessing why.";

pub const ROOT_SYSTEM_PROMPT: &str = "You are an assistant for students, staff and \
faculty of the Facultat d'Informàtica de Barcelona (FIB, UPC).\n\
\n\
Your own tools read the logged-in user's profile, enrolled courses, schedule and \
notices. Delegate anything about public FIB data to public_fib_agent.\n\
\n\
Questions often assume context: \"my next exam\" needs the user's courses first, \
\"tomorrow\" needs get_my_schedule for that weekday, \"the professor\" usually means one \
of the user's courses. Gather that context before answering.\n\
\n\
If a personal tool says authentication is required, tell the user to log in. Never \
mention the sub-agent; present its findings as your own. Reply in the language of \
the question, directly and without hedging.";

/// Two-level agent over a FIB client.
pub struct FibAgent {
    backend: Arc<dyn ModelBackend>,
    tools: Vec<Box<dyn AgentTool>>,
    system_prompt: String,
    retry: RetryConfig,
    max_turns: usize,
}

impl FibAgent {
    pub fn new(backend: Arc<dyn ModelBackend>, client: &FibClient) -> Self {
        Self::with_retry(backend, client, RetryConfig::default())
    }

    /// As `new`, with `retry` applied to every model call, the sub-agent's
    /// included.
    pub fn with_retry(
        backend: Arc<dyn ModelBackend>,
        client: &FibClient,
        retry: RetryConfig,
    ) -> Self {
        let public = SubAgentTool::new(PUBLIC_AGENT_NAME, backend.clone())
            .with_description(PUBLIC_AGENT_DESCRIPTION)
            .with_system_prompt(PUBLIC_SYSTEM_PROMPT)
            .with_tools(public_tools(client))
            .with_retry(retry.clone());

        let mut tools = private_tools(client);
        tools.push(Box::new(public));

        Self {
            backend,
            tools,
            system_prompt: ROOT_SYSTEM_PROMPT.into(),
            retry,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Root tool names, in the order the model sees them.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Answer one question. Returns the root conversation.
    pub async fn run(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChatMessage>, ProviderError> {
        let config = AgentLoopConfig {
            backend: self.backend.as_ref(),
            system_prompt: &self.system_prompt,
            tools: &self.tools,
            max_turns: self.max_turns,
            retry: self.retry.clone(),
            temperature: None,
        };
        agent_loop(question, &config, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FibConfig;
    use crate::provider::MockBackend;

    #[test]
    fn root_holds_private_tools_and_the_public_sub_agent() {
        let config = FibConfig::new("test-client").without_token_file();
        let client = FibClient::new(&config).unwrap();
        let agent = FibAgent::new(Arc::new(MockBackend::text("hi")), &client);
        assert_eq!(
            agent.tool_names(),
            vec![
                "get_my_profile",
                "get_my_courses",
                "get_my_schedule",
                "get_my_notices",
                PUBLIC_AGENT_NAME,
            ]
        );
    }
}
