//! MCP server over a line-delimited byte stream (stdin/stdout for `fib mcp`).
//!
//! One JSON-RPC message per line. Requests are answered in arrival order;
//! notifications get no reply. Tool failures are reported as results with
//! `isError`, protocol failures as JSON-RPC errors.

use super::types::*;
use crate::types::{AgentTool, ToolError};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct McpServer {
    info: ServerInfo,
    tools: Vec<Box<dyn AgentTool>>,
}

impl McpServer {
    pub fn new(tools: Vec<Box<dyn AgentTool>>) -> Self {
        Self {
            info: ServerInfo::default(),
            tools,
        }
    }

    pub fn with_info(mut self, info: ServerInfo) -> Self {
        self.info = info;
        self
    }

    /// Serve until the reader hits EOF or `cancel` fires.
    pub async fn serve<R, W>(
        &self,
        reader: R,
        mut writer: W,
        cancel: &CancellationToken,
    ) -> Result<(), McpError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(
            "MCP server {} ready with {} tools",
            self.info.name,
            self.tools.len()
        );
        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                debug!("MCP client closed the stream");
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line, cancel).await {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    /// Answer one raw message. `None` for notifications.
    pub async fn handle_line(
        &self,
        line: &str,
        cancel: &CancellationToken,
    ) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Unparseable MCP message: {}", e);
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };
        self.handle(request, cancel).await
    }

    /// Answer one request. `None` for notifications.
    pub async fn handle(
        &self,
        request: JsonRpcRequest,
        cancel: &CancellationToken,
    ) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!("MCP notification {}", request.method);
            return None;
        };
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            ));
        }

        debug!("MCP request {}", request.method);
        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize(request.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.list_tools()),
            "tools/call" => self.call_tool(request.params, cancel).await,
            other => Err((METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        };
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err((code, message)) => JsonRpcResponse::failure(id, code, message),
        })
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let version = match requested {
            Some(v) if PROTOCOL_VERSIONS.contains(&v) => v,
            _ => PROTOCOL_VERSIONS[PROTOCOL_VERSIONS.len() - 1],
        };
        to_value(InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(json!({ "listChanged": false })),
            },
            server_info: self.info.clone(),
        })
    }

    fn list_tools(&self) -> Value {
        let tools = self
            .tools
            .iter()
            .map(|t| McpToolInfo {
                name: t.name().to_string(),
                description: Some(t.description().to_string()),
                input_schema: t.parameters_schema(),
            })
            .collect();
        to_value(ToolsListResult { tools })
    }

    async fn call_tool(
        &self,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, (i64, String)> {
        let params: ToolCallParams = params
            .ok_or_else(|| "missing params".to_string())
            .and_then(|p| serde_json::from_value(p).map_err(|e| e.to_string()))
            .map_err(|e| (INVALID_PARAMS, format!("Invalid tools/call params: {}", e)))?;

        let Some(tool) = self.tools.iter().find(|t| t.name() == params.name) else {
            return Ok(to_value(McpToolCallResult::text(
                format!("Unknown tool: {}", params.name),
                true,
            )));
        };

        let call_id = uuid::Uuid::new_v4().to_string();
        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        let result = match tool.execute(&call_id, arguments, cancel.child_token()).await {
            Ok(result) => {
                let is_error = result.details.get("error").is_some();
                McpToolCallResult::text(result.text(), is_error)
            }
            Err(e @ (ToolError::InvalidArgs(_) | ToolError::NotFound(_))) => {
                McpToolCallResult::text(e.to_string(), true)
            }
            Err(ToolError::Cancelled) => McpToolCallResult::text("Cancelled", true),
        };
        Ok(to_value(result))
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Content, ToolResult};
    use async_trait::async_trait;

    struct CreditsTool;

    #[async_trait]
    impl AgentTool for CreditsTool {
        fn name(&self) -> &str {
            "get_course_details"
        }
        fn label(&self) -> &str {
            "Course Details"
        }
        fn description(&self) -> &str {
            "Details of one course"
        }
        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "course_code": { "type": "string" } },
                "required": ["course_code"]
            })
        }
        async fn execute(
            &self,
            _tool_call_id: &str,
            params: Value,
            _cancel: CancellationToken,
        ) -> Result<ToolResult, ToolError> {
            let code = params["course_code"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArgs("course_code is required".into()))?;
            Ok(ToolResult {
                content: vec![Content::text(format!("{} has 6 credits", code))],
                details: json!({ "count": 1 }),
            })
        }
    }

    fn server() -> McpServer {
        McpServer::new(vec![Box::new(CreditsTool)])
    }

    async fn call(server: &McpServer, line: Value) -> Value {
        let response = server
            .handle_line(&line.to_string(), &CancellationToken::new())
            .await
            .unwrap();
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn initialize_echoes_a_known_protocol_version() {
        let server = server();
        let reply = call(
            &server,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize",
                    "params": { "protocolVersion": "2024-11-05", "capabilities": {},
                                "clientInfo": { "name": "test", "version": "0" } } }),
        )
        .await;
        assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(reply["result"]["serverInfo"]["name"], "fib-api");
        assert!(reply["result"]["capabilities"]["tools"].is_object());

        let reply = call(
            &server,
            json!({ "jsonrpc": "2.0", "id": 2, "method": "initialize",
                    "params": { "protocolVersion": "1999-01-01" } }),
        )
        .await;
        assert_eq!(reply["result"]["protocolVersion"], "2025-06-18");
    }

    #[tokio::test]
    async fn tool_failures_are_results_not_errors() {
        let server = server();
        let missing = call(
            &server,
            json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                    "params": { "name": "get_course_details", "arguments": {} } }),
        )
        .await;
        assert_eq!(missing["result"]["isError"], true);
        assert!(missing["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("course_code"));

        let unknown = call(
            &server,
            json!({ "jsonrpc": "2.0", "id": 4, "method": "tools/call",
                    "params": { "name": "rm_rf" } }),
        )
        .await;
        assert_eq!(unknown["result"]["content"][0]["text"], "Unknown tool: rm_rf");
    }

    #[tokio::test]
    async fn protocol_errors() {
        let server = server();
        let reply = call(
            &server,
            json!({ "jsonrpc": "2.0", "id": 5, "method": "resources/list" }),
        )
        .await;
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);

        let reply = call(
            &server,
            json!({ "jsonrpc": "2.0", "id": 6, "method": "tools/call" }),
        )
        .await;
        assert_eq!(reply["error"]["code"], INVALID_PARAMS);

        let reply = server
            .handle_line("{not json", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply.error.unwrap().code, PARSE_ERROR);
        assert!(reply.id.is_null());
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let reply = server()
            .handle_line(
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                &CancellationToken::new(),
            )
            .await;
        assert!(reply.is_none());
    }
}
