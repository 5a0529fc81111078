//! Google Generative AI (Gemini) backend.
//!
//! Uses the non-streaming `generateContent` endpoint. The API key travels in
//! the `x-goog-api-key` header.

use super::http::post_json;
use super::traits::*;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiBackend {
    http: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            model: model.into(),
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
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
impl ModelBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<ModelResponse, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = build_request_body(&request);
        debug!(
            "Gemini request: model={} messages={} tools={}",
            self.model,
            request.messages.len(),
            request.tools.len()
        );

        let builder = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let value = post_json(builder, "Gemini API", &cancel).await?;

        let response: GeminiResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::Api(format!("Unexpected Gemini response: {}", e)))?;
        response.into_model_response()
    }
}

fn build_request_body(request: &GenerateRequest) -> Value {
    let contents: Vec<Value> = request
        .messages
        .iter()
        .map(|msg| match msg.role {
            Role::User => json!({ "role": "user", "parts": [{ "text": msg.content }] }),
            Role::Assistant => {
                let mut parts = Vec::new();
                if !msg.content.is_empty() {
                    parts.push(json!({ "text": msg.content }));
                }
                for call in &msg.tool_calls {
                    parts.push(json!({
                        "functionCall": { "name": call.name, "args": call.arguments },
                    }));
                }
                json!({ "role": "model", "parts": parts })
            }
            // Function results travel as user turns.
            Role::Tool => json!({
                "role": "user",
                "parts": [{
                    "functionResponse": {
                        "name": msg.name.as_deref().unwrap_or_default(),
                        "response": { "result": msg.content },
                    }
                }],
            }),
        })
        .collect();

    let mut body = json!({ "contents": contents });

    if !request.system_prompt.is_empty() {
        body["systemInstruction"] = json!({
            "parts": [{ "text": request.system_prompt }],
        });
    }

    let mut generation_config = json!({});
    if let Some(max) = request.max_tokens {
        generation_config["maxOutputTokens"] = json!(max);
    }
    if let Some(temp) = request.temperature {
        generation_config["temperature"] = json!(temp);
    }
    if generation_config != json!({}) {
        body["generationConfig"] = generation_config;
    }

    if !request.tools.is_empty() {
        let declarations: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();
        body["tools"] = json!([{ "functionDeclarations": declarations }]);
    }

    body
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<Value>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

impl GeminiResponse {
    fn into_model_response(self) -> Result<ModelResponse, ProviderError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .map(|f| f.to_string())
                .unwrap_or_else(|| "no candidates".into());
            return Err(ProviderError::Api(format!(
                "Gemini returned no answer: {}",
                reason
            )));
        };
        let mut response = ModelResponse::default();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text {
                response.content.push_str(&text);
            }
            if let Some(call) = part.function_call {
                // Gemini does not id its calls.
                response.tool_calls.push(ToolCall {
                    id: format!("gemini-fc-{}", response.tool_calls.len()),
                    name: call.name,
                    arguments: call.args.unwrap_or_else(|| json!({})),
                });
            }
        }
        if response.content.is_empty() && !response.has_tool_calls() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
            return Err(ProviderError::Api(format!(
                "Gemini returned empty text (finish reason {})",
                reason
            )));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_maps_roles_and_config() {
        let request = GenerateRequest {
            system_prompt: "Be helpful".into(),
            messages: vec![ChatMessage::user("Hola"), ChatMessage::assistant("Hola!")],
            temperature: Some(0.0),
            max_tokens: Some(512),
            ..Default::default()
        };
        let body = build_request_body(&request);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "Hola!");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be helpful");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn minimal_body_has_no_optional_blocks() {
        let body = build_request_body(&GenerateRequest::prompt("hi"));
        assert!(body.get("systemInstruction").is_none());
        assert!(body.get("generationConfig").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn tool_turns_become_function_parts() {
        let call = ToolCall {
            id: "gemini-fc-0".into(),
            name: "search_courses".into(),
            arguments: json!({ "query": "IA" }),
        };
        let request = GenerateRequest {
            messages: vec![
                ChatMessage::user("Quants crèdits té IA?"),
                ChatMessage::from_response(&ModelResponse {
                    content: String::new(),
                    tool_calls: vec![call.clone()],
                }),
                ChatMessage::tool_result(&call, "[{\"id\":\"IA\"}]"),
            ],
            tools: vec![ToolSpec {
                name: "search_courses".into(),
                description: "Search the course catalogue".into(),
                parameters: json!({ "type": "object" }),
            }],
            ..Default::default()
        };
        let body = build_request_body(&request);
        let call_parts = body["contents"][1]["parts"].as_array().unwrap();
        assert_eq!(call_parts.len(), 1);
        assert_eq!(call_parts[0]["functionCall"]["args"]["query"], "IA");
        assert_eq!(body["contents"][2]["role"], "user");
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"]["name"],
            "search_courses"
        );
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "search_courses"
        );
    }

    #[test]
    fn response_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "IA is " }, { "text": "6 credits." }] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(
            response.into_model_response().unwrap(),
            ModelResponse::text("IA is 6 credits.")
        );
    }

    #[test]
    fn function_calls_are_parsed_with_ids() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [
                    { "functionCall": { "name": "search_exams", "args": { "course_code": "BD" } } },
                    { "functionCall": { "name": "get_current_term" } }
                ] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        let response = response.into_model_response().unwrap();
        assert!(response.content.is_empty());
        let ids: Vec<_> = response.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["gemini-fc-0", "gemini-fc-1"]);
        assert_eq!(response.tool_calls[1].arguments, json!({}));
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let response: GeminiResponse =
            serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } }))
                .unwrap();
        assert!(matches!(
            response.into_model_response(),
            Err(ProviderError::Api(_))
        ));
    }
}
