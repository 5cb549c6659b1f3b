/// MCP Protocol Handling
///
/// JSON-RPC 2.0 request/response structures and the method dispatcher shared
/// by every transport (STDIO, plain HTTP, SSE). Transports parse a request,
/// hand it to `McpServer::handle_request`, and write back whatever response
/// comes out; notifications produce none.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::registry::ToolRegistry;

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revisions this server can speak, oldest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

pub const INSTRUCTIONS: &str =
    "A custom MCP server with code analysis, formatting, and documentation tools.";

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// `id` is absent for notifications. An explicit `"id": null` is kept as
/// `Some(Value::Null)` so the request still gets a response. A missing
/// `jsonrpc` decodes as empty and fails the version check.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct McpRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A field that is present decodes to `Some`, even when it is `null`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC 2.0 response structure for MCP protocol.
///
/// Exactly one of `result` and `error` is present.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(McpError { code, message: message.into(), data: None }),
        }
    }

    /// Error response for input that is not JSON at all. The id cannot be
    /// known, so it is null.
    pub fn parse_error(err: &serde_json::Error) -> Self {
        Self::error(None, PARSE_ERROR, format!("Parse error: {err}"))
    }
}

/// Text content of a `tools/call` result.
fn tool_result(text: String, is_error: bool) -> Value {
    json!({
        "content": [
            {
                "type": "text",
                "text": text
            }
        ],
        "isError": is_error
    })
}

/// Transport-independent MCP server state.
///
/// Cheap to share: the registry is immutable after startup and the counters
/// are atomics.
pub struct McpServer {
    pub name: String,
    pub version: String,
    registry: ToolRegistry,
    requests_total: AtomicU64,
    tool_calls_total: AtomicU64,
    tool_errors_total: AtomicU64,
}

/// Snapshot of the request counters for the metrics endpoint.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub requests_total: u64,
    pub tool_calls_total: u64,
    pub tool_errors_total: u64,
}

impl McpServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            registry,
            requests_total: AtomicU64::new(0),
            tool_calls_total: AtomicU64::new(0),
            tool_errors_total: AtomicU64::new(0),
        }
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            tool_calls_total: self.tool_calls_total.load(Ordering::Relaxed),
            tool_errors_total: self.tool_errors_total.load(Ordering::Relaxed),
        }
    }

    /// Decode a raw JSON message and dispatch it.
    ///
    /// Returns `None` for notifications (no response is sent).
    ///
    /// Invalid JSON is a parse error; valid JSON that is not a request is
    /// an invalid request, answered with the id recovered when possible.
    pub fn handle_message(&self, raw: &str) -> Option<McpResponse> {
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse JSON-RPC message");
                return Some(McpResponse::parse_error(&e));
            }
        };

        let id = value.get("id").cloned();
        match serde_json::from_value::<McpRequest>(value) {
            Ok(request) => self.handle_request(request),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid JSON-RPC request");
                Some(McpResponse::error(id, INVALID_REQUEST, format!("Invalid Request: {e}")))
            }
        }
    }

    /// Dispatch one request. Tool handlers run synchronously on the calling
    /// thread, so async transports call this from a blocking context.
    pub fn handle_request(&self, request: McpRequest) -> Option<McpResponse> {
        // Relaxed is enough: the counters are only ever read for reporting
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "Received notification");
            return None;
        };
        let id = Some(id);

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(McpResponse::error(id, INVALID_REQUEST, "Invalid Request"));
        }

        tracing::debug!(method = %request.method, "Handling request");
        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            "ping" => McpResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params),
            method => McpResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {method}")),
        };
        Some(response)
    }

    /// The initialize method is the first method called by MCP clients.
    /// The client's requested protocol version is echoed when supported.
    fn handle_initialize(&self, id: Option<Value>, params: Option<Value>) -> McpResponse {
        let requested = params
            .as_ref()
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let version = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);

        if let Some(client) = params.as_ref().and_then(|p| p.get("clientInfo")) {
            tracing::info!(%client, protocol_version = version, "Client initialized");
        }

        McpResponse::success(
            id,
            json!({
                "protocolVersion": version,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": self.name,
                    "version": self.version
                },
                "instructions": INSTRUCTIONS
            }),
        )
    }

    fn handle_tools_list(&self, id: Option<Value>) -> McpResponse {
        McpResponse::success(id, json!({ "tools": self.registry.definitions() }))
    }

    /// Executes a tool with the provided arguments. Tool failures are
    /// reported in-band (`isError: true`); only a malformed call or an
    /// unknown tool produce a JSON-RPC error.
    fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> McpResponse {
        let Some(params) = params else {
            return McpResponse::error(id, INVALID_PARAMS, "Invalid params");
        };
        let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
            return McpResponse::error(id, INVALID_PARAMS, "Invalid params: missing tool name");
        };
        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(arguments) => arguments.clone(),
        };

        self.tool_calls_total.fetch_add(1, Ordering::Relaxed);
        let Some(result) = self.registry.call(tool_name, arguments) else {
            tracing::warn!(tool = tool_name, "Unknown tool requested");
            return McpResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {tool_name}"));
        };

        match result {
            Ok(text) => McpResponse::success(id, tool_result(text, false)),
            Err(e) => {
                self.tool_errors_total.fetch_add(1, Ordering::Relaxed);
                tracing::error!(tool = tool_name, error = %e, "Tool call failed");
                McpResponse::success(id, tool_result(e.to_string(), true))
            }
        }
    }
}
