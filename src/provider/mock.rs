//! Mock backend for testing. No real API calls.

use super::traits::*;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// A scripted reply: text, tool calls or an error.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Text(String),
    /// Ask for these calls as `(name, arguments)`. Ids are `mock-<request>-<index>`.
    ToolCalls(Vec<(String, serde_json::Value)>),
    /// Fails with `ProviderError::Network`, which is retryable.
    NetworkError(String),
    /// Fails with `ProviderError::Api`, which is not.
    ApiError(String),
}

/// Mock model for tests. Supply a sequence of responses.
pub struct MockBackend {
    name: String,
    responses: Mutex<Vec<MockResponse>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockBackend {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            name: "mock".into(),
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: backend that returns the same text once
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![MockResponse::Text(text.into())])
    }

    /// Convenience: sequence of text responses
    pub fn texts(texts: Vec<impl Into<String>>) -> Self {
        Self::new(
            texts
                .into_iter()
                .map(|t| MockResponse::Text(t.into()))
                .collect(),
        )
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Requests received, oldest first.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<ModelResponse, ProviderError> {
        let call_index = {
            let mut requests = self.requests.lock().unwrap_or_else(|p| p.into_inner());
            requests.push(request);
            requests.len()
        };

        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let response = {
            let mut responses = self.responses.lock().unwrap_or_else(|p| p.into_inner());
            if responses.is_empty() {
                MockResponse::Text("(no more mock responses)".into())
            } else {
                responses.remove(0)
            }
        };

        match response {
            MockResponse::Text(text) => Ok(ModelResponse::text(text)),
            MockResponse::ToolCalls(calls) => Ok(ModelResponse {
                content: String::new(),
                tool_calls: calls
                    .into_iter()
                    .enumerate()
                    .map(|(i, (name, arguments))| ToolCall {
                        id: format!("mock-{}-{}", call_index, i),
                        name,
                        arguments,
                    })
                    .collect(),
            }),
            MockResponse::NetworkError(msg) => Err(ProviderError::Network(msg)),
            MockResponse::ApiError(msg) => Err(ProviderError::Api(msg)),
        }
    }
}
