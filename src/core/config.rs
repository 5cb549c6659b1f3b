/// Server Configuration
///
/// Configuration comes from three places, applied in this order:
/// 1. a `.env` file in the working directory (loaded by `main` via dotenvy),
/// 2. environment variables,
/// 3. an optional YAML file with per-tool settings (`MCP_CONFIG`, default
///    `pytools.yaml`).
///
/// Environment Variables:
/// - SERVER_NAME: Name of the server (default: "pytools-mcp")
/// - SERVER_VERSION: Version string (default: crate version)
/// - MCP_TRANSPORT_MODE: "stdio", "http", or "both" (default: "both")
/// - HOST: Bind address for HTTP mode (default: "0.0.0.0")
/// - PORT: Port number for HTTP mode (default: 3000)
/// - LOG_LEVEL: tracing filter directive (default: "info")
/// - LOG_FORMAT: "text" or "json" (default: "text")
/// - WORKER_THREADS: actix worker count (default: CPU count, max 16)
/// - MCP_CONFIG: path of the YAML tool settings file

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::error::ConfigError;
use crate::tools::document::DocStyle;

pub const DEFAULT_CONFIG_FILE: &str = "pytools.yaml";

/// Which transports the process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Stdio,
    Http,
    Both,
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportMode::Stdio),
            "http" => Ok(TransportMode::Http),
            "both" => Ok(TransportMode::Both),
            _ => Err("must be 'stdio', 'http', or 'both'".to_string()),
        }
    }
}

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err("must be 'text' or 'json'".to_string()),
        }
    }
}

/// Process-wide configuration resolved at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub transport: TransportMode,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub workers: usize,
    pub config_file: PathBuf,
    pub tools: ToolSettings,
}

impl ServerConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    ///
    /// `from_env` passes `std::env::var`; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let transport = parse_var(&lookup, "MCP_TRANSPORT_MODE", TransportMode::Both)?;
        let port = parse_var(&lookup, "PORT", 3000u16)?;
        let log_format = parse_var(&lookup, "LOG_FORMAT", LogFormat::Text)?;

        // Defaults to CPU count but capped at 16 to avoid excessive context switching
        let workers = parse_var(&lookup, "WORKER_THREADS", num_cpus::get().clamp(1, 16))?.max(1);

        let config_file = PathBuf::from(var("MCP_CONFIG", DEFAULT_CONFIG_FILE));
        // An explicitly named file must exist; the default one is optional
        let tools = if lookup("MCP_CONFIG").is_some() || config_file.exists() {
            ToolSettings::load(&config_file)?
        } else {
            ToolSettings::default()
        };

        Ok(Self {
            name: var("SERVER_NAME", "pytools-mcp"),
            version: var("SERVER_VERSION", env!("CARGO_PKG_VERSION")),
            transport,
            host: var("HOST", "0.0.0.0"),
            port,
            log_level: var("LOG_LEVEL", "info"),
            log_format,
            workers,
            config_file,
            tools,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnv {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

/// Per-tool settings from the YAML config file.
///
/// ```yaml
/// tools:
///   format_code:
///     line_length: 100
///     black_command: "python -m black"
///   document_code:
///     doc_style: numpy
/// ```
///
/// Every value is optional; tool arguments always take precedence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub format_code: FormatSettings,
    pub document_code: DocumentSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    pub line_length: Option<u32>,
    pub black_command: Option<String>,
    pub isort_command: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    pub doc_style: Option<DocStyle>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    tools: ToolSettings,
}

impl ToolSettings {
    /// Load the `tools` section of a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: ConfigFile = serde_yaml::from_str(contents)?;
        Ok(file.tools)
    }
}
