//! Request dispatch for the MCP tool server.

use crate::convert::Converter;
use crate::engine::EngineBackend;
use crate::mcp::protocol::{
    JsonRpcRequest, JsonRpcResponse, ToolResultContent, INVALID_PARAMS, INVALID_REQUEST,
    JSONRPC_VERSION, MCP_PROTOCOL_VERSION, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::mcp::tools::{handle_tool_call, tool_definitions, ToolError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const SERVER_NAME: &str = "pdf2img";

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Answers JSON-RPC requests by running tools on a shared [`Converter`].
pub struct McpServer<B: EngineBackend> {
    converter: Converter<B>,
}

impl<B: EngineBackend> McpServer<B> {
    pub fn new(converter: Converter<B>) -> Self {
        Self { converter }
    }

    pub fn converter(&self) -> &Converter<B> {
        &self.converter
    }

    /// Handle one raw line. `None` means nothing is sent back.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                warn!("Unparsable request: {}", e);
                Some(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        }
    }

    /// Dispatch one request. Notifications get no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("← {}", request.method);

        if request.is_notification() {
            if request.method != "notifications/initialized" {
                debug!("Ignoring notification {}", request.method);
            }
            return None;
        }
        let id = request.id.clone();

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => {
                info!("Client connected");
                JsonRpcResponse::success(id, initialize_result())
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tool_definitions() })),
            "tools/call" => self.call_tool(id, request.params).await,
            other => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        };
        Some(response)
    }

    async fn call_tool(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        let params: CallParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e))
            }
        };

        info!("Tool call: {}", params.name);
        match handle_tool_call(&self.converter, &params.name, params.arguments).await {
            Ok(content) => JsonRpcResponse::success(id, tool_result(content, false)),
            Err(ToolError::InvalidArguments { tool, detail }) => JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("Invalid arguments for {}: {}", tool, detail),
            ),
            Err(e) => {
                warn!("Tool {} failed: {}", params.name, e);
                let content = vec![ToolResultContent::text(format!("Error: {}", e))];
                JsonRpcResponse::success(id, tool_result(content, true))
            }
        }
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

fn tool_result(content: Vec<ToolResultContent>, is_error: bool) -> Value {
    json!({
        "content": content,
        "isError": is_error,
    })
}
