/// Error Types
///
/// Tool handlers return `ToolError`; startup configuration returns
/// `ConfigError`. Both are rendered with their `Display` text, which is what
/// ends up in tool results and log lines.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The JSON arguments did not match the tool's input schema
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Reading or writing the target file failed
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The Python source does not parse
    #[error("invalid syntax (line {line})")]
    Syntax { line: usize },

    /// The tree-sitter parser itself could not be set up or run
    #[error("parser error: {0}")]
    Parser(String),

    /// An external program could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external program exited unsuccessfully
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// An external program wrote something other than UTF-8 text
    #[error("{program} produced non-UTF-8 output")]
    NonUtf8Output { program: String },

    /// Wraps a failure with the action the tool was performing,
    /// e.g. "analyzing code"
    #[error("Error {action}: {source}")]
    Failed {
        action: &'static str,
        #[source]
        source: Box<ToolError>,
    },
}

impl ToolError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ToolError::Io { path: path.into(), source }
    }

    /// Attach the tool's action to an error. Argument errors are left alone
    /// so the caller sees exactly which parameter was wrong.
    pub fn during(self, action: &'static str) -> Self {
        match self {
            ToolError::InvalidArguments(_) | ToolError::Failed { .. } => self,
            other => ToolError::Failed { action, source: Box::new(other) },
        }
    }
}

/// Invalid startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
