/// Core Server Framework Module
///
/// This module contains the core server implementation including:
/// - config.rs: environment and YAML configuration
/// - error.rs: tool and configuration error types
/// - logging.rs: tracing subscriber setup
/// - protocol.rs: JSON-RPC types and MCP method dispatch
/// - registry.rs: tool definitions and handlers
/// - server.rs: HTTP, SSE and STDIO transports

pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod server;
