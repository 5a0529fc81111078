//! Locally served model behind an OpenAI Chat Completions compatible API
//! (llama.cpp server, Ollama, vLLM).

use super::http::post_json;
use super::traits::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct LocalBackend {
    http: reqwest::Client,
    model: String,
    base_url: String,
    api_key: Option<String>,
}

impl LocalBackend {
    pub fn new(model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Some servers are started with `--api-key`.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ProviderError> {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Other(e.to_string()))?;
        Ok(self)
    }
}

#[async_trait]
impl ModelBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<ModelResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = build_request_body(&self.model, &request);
        debug!("Local model request: model={} url={}", self.model, url);

        let mut builder = self
            .http
            .post(&url)
            .header("content-type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("authorization", format!("Bearer {}", key));
        }
        let value = post_json(builder.json(&body), "Local model", &cancel).await?;

        let response: ChatResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::Api(format!("Unexpected chat completion: {}", e)))?;
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ProviderError::Api("Local model returned no choices".into()))?;
        message.into_model_response()
    }
}

fn build_request_body(model: &str, request: &GenerateRequest) -> Value {
    let mut messages: Vec<Value> = Vec::new();
    if !request.system_prompt.is_empty() {
        messages.push(json!({ "role": "system", "content": request.system_prompt }));
    }
    for msg in &request.messages {
        messages.push(match msg.role {
            Role::User => json!({ "role": "user", "content": msg.content }),
            Role::Assistant => {
                let mut obj = json!({ "role": "assistant", "content": msg.content });
                if !msg.tool_calls.is_empty() {
                    let calls: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments.to_string(),
                                },
                            })
                        })
                        .collect();
                    obj["tool_calls"] = json!(calls);
                }
                obj
            }
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id,
                "name": msg.name,
                "content": msg.content,
            }),
        });
    }

    let mut body = json!({
        "model": model,
        "messages": messages,
        "stream": false,
    });
    if let Some(max) = request.max_tokens {
        body["max_tokens"] = json!(max);
    }
    if let Some(temp) = request.temperature {
        body["temperature"] = json!(temp);
    }
    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    },
                })
            })
            .collect();
        body["tools"] = json!(tools);
    }
    body
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Deserialize)]
struct ChatToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ChatFunction,
}

#[derive(Deserialize)]
struct ChatFunction {
    name: String,
    /// JSON-encoded, sometimes empty.
    #[serde(default)]
    arguments: String,
}

impl ChatChoiceMessage {
    fn into_model_response(self) -> Result<ModelResponse, ProviderError> {
        let mut tool_calls = Vec::with_capacity(self.tool_calls.len());
        for (i, call) in self.tool_calls.into_iter().enumerate() {
            let arguments = if call.function.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&call.function.arguments).map_err(|e| {
                    ProviderError::Api(format!(
                        "Bad arguments for {}: {}",
                        call.function.name, e
                    ))
                })?
            };
            tool_calls.push(ToolCall {
                id: call.id.unwrap_or_else(|| format!("call-{}", i)),
                name: call.function.name,
                arguments,
            });
        }
        let content = self.content.unwrap_or_default();
        if content.is_empty() && tool_calls.is_empty() {
            return Err(ProviderError::Api("Local model returned no content".into()));
        }
        Ok(ModelResponse {
            content,
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_goes_first() {
        let request = GenerateRequest::prompt("Quins exàmens tinc?")
            .with_system_prompt("You are FIB assistant");
        let body = build_request_body("qwen2.5", &request);
        assert_eq!(body["model"], "qwen2.5");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["stream"], false);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn tool_turns_use_chat_completions_format() {
        let call = ToolCall {
            id: "call_7".into(),
            name: "get_my_courses".into(),
            arguments: json!({}),
        };
        let request = GenerateRequest {
            messages: vec![
                ChatMessage::user("Quines assignatures faig?"),
                ChatMessage::from_response(&ModelResponse {
                    content: String::new(),
                    tool_calls: vec![call.clone()],
                }),
                ChatMessage::tool_result(&call, "[\"IA\"]"),
            ],
            tools: vec![ToolSpec {
                name: "get_my_courses".into(),
                description: "Enrolled courses".into(),
                parameters: json!({ "type": "object", "properties": {} }),
            }],
            ..Default::default()
        };
        let body = build_request_body("qwen2.5", &request);
        assert_eq!(body["messages"][1]["tool_calls"][0]["function"]["arguments"], "{}");
        assert_eq!(body["messages"][2]["role"], "tool");
        assert_eq!(body["messages"][2]["tool_call_id"], "call_7");
        assert_eq!(body["tools"][0]["function"]["name"], "get_my_courses");
    }

    #[test]
    fn reply_with_null_content_and_tool_calls() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{ "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "search_exams", "arguments": "{\"course_code\":\"BD\"}" }
                }]
            } }]
        }))
        .unwrap();
        let message = response.choices.into_iter().next().unwrap().message;
        let reply = message.into_model_response().unwrap();
        assert_eq!(reply.content, "");
        assert_eq!(reply.tool_calls[0].arguments, json!({ "course_code": "BD" }));
    }
}
