/// MCP Server Entry Point
///
/// Loads configuration (`.env`, environment variables, optional YAML tool
/// settings), installs logging, registers the Python tools and starts the
/// configured transports. See `core::config` for the recognised variables.

mod core;
mod tools;

use anyhow::Context;
use std::sync::Arc;

use crate::core::config::{ServerConfig, TransportMode};
use crate::core::protocol::McpServer;
use crate::core::registry::ToolRegistry;
use crate::core::{logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal in production
    let dotenv = dotenvy::dotenv();

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    logging::init(&config.log_level, config.log_format).context("failed to initialize logging")?;

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }
    tracing::info!(
        transport = ?config.transport,
        config_file = %config.config_file.display(),
        "Configuration loaded"
    );

    let mut registry = ToolRegistry::new();
    tools::register_all(&mut registry, &config.tools);
    let mcp = Arc::new(McpServer::new(config.name.clone(), config.version.clone(), registry));

    match config.transport {
        TransportMode::Stdio => server::run_server_stdio(mcp).await?,
        TransportMode::Http => server::run_server_http(mcp, &config).await?,
        TransportMode::Both => {
            // STDIO in the background so MCP Inspector can attach while the
            // HTTP endpoints are available
            let stdio_server = mcp.clone();
            let stdio_handle = tokio::spawn(async move {
                if let Err(e) = server::run_server_stdio(stdio_server).await {
                    tracing::error!(error = %e, "STDIO server error");
                }
            });

            let http_result = server::run_server_http(mcp, &config).await;

            // If HTTP server exits, abort STDIO task
            stdio_handle.abort();
            http_result?
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}
