/// Tool Registry
///
/// Holds the tool definitions served by `tools/list` and the handler
/// functions invoked by `tools/call`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

use crate::core::error::ToolError;

/// MCP tool definition structure.
///
/// Each tool must have a unique name, description, and JSON schema defining
/// its input parameters. This structure is serialized when listing tools.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool identifier (e.g., "analyze_code")
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema defining the tool's input parameters
    pub input_schema: Value,
}

/// Tool handler function type definition.
///
/// Tool handlers are boxed closures that take JSON arguments and return the
/// tool's text result. They must be Send + Sync to be shared by the HTTP
/// workers.
pub type ToolHandler = Box<dyn Fn(Value) -> Result<String, ToolError> + Send + Sync>;

/// Registry of available MCP tools.
#[derive(Default)]
pub struct ToolRegistry {
    /// All registered tools in registration order (for tools/list)
    tools: Vec<ToolDefinition>,
    /// Map of tool names to their handler functions (for tools/call)
    handlers: HashMap<String, ToolHandler>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration with the same name replaces
    /// the earlier one.
    pub fn register(&mut self, tool: ToolDefinition, handler: ToolHandler) {
        let name = tool.name.clone();
        self.tools.retain(|t| t.name != name);
        self.tools.push(tool);
        self.handlers.insert(name, handler);
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Invoke a tool by name. Returns `None` when no such tool exists.
    pub fn call(&self, name: &str, arguments: Value) -> Option<Result<String, ToolError>> {
        self.handlers.get(name).map(|handler| handler(arguments))
    }
}

/// Decode a tool's JSON arguments into its typed argument struct.
pub fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}
