/// format_code Tool
///
/// Formats a Python file in place by piping it through black and then isort.
/// Both are external programs; their command lines are configurable through
/// the `tools.format_code` section of the config file.

use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::core::config::FormatSettings;
use crate::core::error::ToolError;
use crate::core::registry::{ToolDefinition, ToolHandler, ToolRegistry, parse_arguments};

pub const NAME: &str = "format_code";
pub const DEFAULT_LINE_LENGTH: u32 = 88;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FormatArgs {
    file_path: String,
    line_length: Option<u32>,
    use_black: Option<bool>,
    use_isort: Option<bool>,
}

/// An external command: program plus leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    /// Split a command line on whitespace. Returns `None` for a blank string.
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self { program, args: parts.collect() })
    }

    /// Run the command with `extra` appended, feeding `input` on stdin and
    /// returning stdout.
    pub fn filter(&self, extra: &[String], input: &str) -> Result<String, ToolError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(extra)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn { program: self.program.clone(), source })?;

        // Feed stdin from a separate thread so a large file cannot deadlock
        // against a full stdout pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = input.to_owned();
            std::thread::spawn(move || {
                // A program that exits early closes the pipe; its exit
                // status reports the actual problem.
                let _ = stdin.write_all(input.as_bytes());
            })
        });

        let output = child
            .wait_with_output()
            .map_err(|source| ToolError::Spawn { program: self.program.clone(), source })?;
        if let Some(writer) = writer {
            let _ = writer.join();
        }

        if !output.status.success() {
            return Err(ToolError::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        String::from_utf8(output.stdout)
            .map_err(|_| ToolError::NonUtf8Output { program: self.program.clone() })
    }
}

/// The two formatter programs, in the order they run.
#[derive(Debug, Clone)]
pub struct Formatters {
    pub black: ExternalCommand,
    pub isort: ExternalCommand,
}

impl Default for Formatters {
    fn default() -> Self {
        Self {
            black: ExternalCommand::new("black"),
            isort: ExternalCommand::new("isort"),
        }
    }
}

impl Formatters {
    pub fn from_settings(settings: &FormatSettings) -> Self {
        let defaults = Self::default();
        Self {
            black: settings
                .black_command
                .as_deref()
                .and_then(ExternalCommand::parse)
                .unwrap_or(defaults.black),
            isort: settings
                .isort_command
                .as_deref()
                .and_then(ExternalCommand::parse)
                .unwrap_or(defaults.isort),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    pub line_length: u32,
    pub use_black: bool,
    pub use_isort: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { line_length: DEFAULT_LINE_LENGTH, use_black: true, use_isort: true }
    }
}

pub fn register(registry: &mut ToolRegistry, settings: &FormatSettings) {
    let tool = ToolDefinition {
        name: NAME.to_string(),
        description: "Formats Python code using black and isort.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the Python file to format"
                },
                "line_length": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum line length for formatting",
                    "default": settings.line_length.unwrap_or(DEFAULT_LINE_LENGTH)
                },
                "use_black": {
                    "type": "boolean",
                    "description": "Whether to use black for code formatting",
                    "default": true
                },
                "use_isort": {
                    "type": "boolean",
                    "description": "Whether to use isort for import sorting",
                    "default": true
                }
            },
            "required": ["file_path"]
        }),
    };

    let formatters = Formatters::from_settings(settings);
    let default_line_length = settings.line_length.unwrap_or(DEFAULT_LINE_LENGTH);

    let handler: ToolHandler = Box::new(move |args: Value| -> Result<String, ToolError> {
        let args: FormatArgs = parse_arguments(args)?;
        let options = FormatOptions {
            line_length: args.line_length.unwrap_or(default_line_length),
            use_black: args.use_black.unwrap_or(true),
            use_isort: args.use_isort.unwrap_or(true),
        };
        if options.line_length == 0 {
            return Err(ToolError::InvalidArguments(
                "line_length must be at least 1".to_string(),
            ));
        }
        tracing::info!(tool = NAME, file_path = %args.file_path, ?options, "Formatting code file");
        format_file(Path::new(&args.file_path), options, &formatters)
            .map_err(|e| e.during("formatting code"))
    });

    registry.register(tool, handler);
}

/// Format the file at `path` in place and render the report.
///
/// A failing formatter step is recorded in the report rather than aborting;
/// the file is only rewritten when the text actually changed.
pub fn format_file(
    path: &Path,
    options: FormatOptions,
    formatters: &Formatters,
) -> Result<String, ToolError> {
    let original = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
    let (formatted, changes) = format_source(&original, options, formatters);

    if formatted != original {
        std::fs::write(path, &formatted).map_err(|e| ToolError::io(path, e))?;
        tracing::debug!(path = %path.display(), "Wrote formatted code");
    }

    Ok(report(&changes))
}

/// Run the enabled formatters over `source`, returning the new text and one
/// line per step describing what happened.
pub fn format_source(
    source: &str,
    options: FormatOptions,
    formatters: &Formatters,
) -> (String, Vec<String>) {
    let line_length = options.line_length.to_string();
    let mut code = source.to_string();
    let mut changes = Vec::new();

    let steps = [
        (
            options.use_black,
            "black",
            &formatters.black,
            vec!["--quiet".to_string(), "--line-length".to_string(), line_length.clone(), "-".to_string()],
        ),
        (
            options.use_isort,
            "isort",
            &formatters.isort,
            vec!["--line-length".to_string(), line_length, "-".to_string()],
        ),
    ];

    for (enabled, label, command, extra) in steps {
        if !enabled {
            continue;
        }
        match command.filter(&extra, &code) {
            Ok(output) => {
                code = output;
                changes.push(format!("Applied {label} formatting"));
            }
            Err(e) => {
                tracing::warn!(formatter = label, error = %e, "Formatter step failed");
                changes.push(format!("Error applying {label}: {e}"));
            }
        }
    }

    (code, changes)
}

fn report(changes: &[String]) -> String {
    let mut lines = vec![
        "Code Formatting Report:".to_string(),
        String::new(),
        "Changes Made:".to_string(),
    ];
    if changes.is_empty() {
        lines.push("- No formatters enabled".to_string());
    } else {
        lines.extend(changes.iter().map(|change| format!("- {change}")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> ExternalCommand {
        // Extra formatter flags land in $0, $1, ... and are ignored
        ExternalCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    fn fake_formatters() -> Formatters {
        Formatters {
            black: shell("tr a-z A-Z"),
            isort: shell("sed 's/IMPORT/import/'"),
        }
    }

    fn temp_py(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(
            ExternalCommand::parse("python -m black"),
            Some(ExternalCommand {
                program: "python".to_string(),
                args: vec!["-m".to_string(), "black".to_string()],
            })
        );
        assert_eq!(ExternalCommand::parse("   "), None);
    }

    #[test]
    fn test_formatters_from_settings() {
        let settings = FormatSettings {
            line_length: None,
            black_command: Some("uvx black".to_string()),
            isort_command: None,
        };
        let formatters = Formatters::from_settings(&settings);
        assert_eq!(formatters.black.program, "uvx");
        assert_eq!(formatters.isort, ExternalCommand::new("isort"));
    }

    #[test]
    fn test_steps_run_in_order() {
        let (code, changes) =
            format_source("import os\n", FormatOptions::default(), &fake_formatters());
        assert_eq!(code, "import OS\n");
        assert_eq!(
            changes,
            vec!["Applied black formatting", "Applied isort formatting"]
        );
    }

    #[test]
    fn test_formatter_receives_line_length() {
        let formatters = Formatters {
            black: shell("cat >/dev/null; echo \"$3\""),
            isort: shell("cat"),
        };
        let options = FormatOptions { line_length: 120, ..FormatOptions::default() };
        let (code, _) = format_source("x=1\n", options, &formatters);
        // $0=--quiet $1=--line-length $2=120 $3=-
        assert_eq!(code, "-\n");

        let formatters = Formatters {
            black: shell("cat >/dev/null; echo \"$2\""),
            isort: shell("cat"),
        };
        let (code, _) = format_source("x=1\n", options, &formatters);
        assert_eq!(code, "120\n");
    }

    #[test]
    fn test_isort_arguments() {
        let formatters = Formatters {
            black: shell("cat"),
            isort: shell("cat >/dev/null; echo \"$0 $1 $2\""),
        };
        let options = FormatOptions { line_length: 79, use_black: false, use_isort: true };
        let (code, _) = format_source("import os\n", options, &formatters);
        assert_eq!(code, "--line-length 79 -\n");
    }

    #[test]
    fn test_failed_step_is_recorded_and_skipped() {
        let formatters = Formatters {
            black: ExternalCommand::new("definitely-not-a-formatter-binary"),
            isort: shell("echo 'cannot parse' >&2; exit 3"),
        };
        let (code, changes) = format_source("x = 1\n", FormatOptions::default(), &formatters);
        assert_eq!(code, "x = 1\n");
        assert_eq!(changes.len(), 2);
        assert!(changes[0].starts_with("Error applying black: failed to run definitely-not-a-formatter-binary"));
        assert!(changes[1].starts_with("Error applying isort: sh exited with"));
        assert!(changes[1].ends_with("cannot parse"));
    }

    #[test]
    fn test_disabled_steps() {
        let options = FormatOptions { line_length: 88, use_black: false, use_isort: false };
        let (code, changes) = format_source("x\n", options, &fake_formatters());
        assert_eq!(code, "x\n");
        assert!(changes.is_empty());
        assert_eq!(
            report(&changes),
            "Code Formatting Report:\n\nChanges Made:\n- No formatters enabled"
        );
    }

    #[test]
    fn test_format_file_writes_back() {
        let file = temp_py("import os\n");
        let report = format_file(file.path(), FormatOptions::default(), &fake_formatters()).unwrap();

        assert_eq!(
            report,
            "Code Formatting Report:\n\nChanges Made:\n- Applied black formatting\n- Applied isort formatting"
        );
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "import OS\n");
    }

    #[test]
    fn test_handler_rejects_zero_line_length() {
        let mut registry = ToolRegistry::new();
        register(&mut registry, &FormatSettings::default());
        let file = temp_py("x = 1\n");

        let err = registry
            .call(NAME, serde_json::json!({"file_path": file.path(), "line_length": 0}))
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn test_handler_missing_file() {
        let mut registry = ToolRegistry::new();
        register(&mut registry, &FormatSettings::default());

        let err = registry
            .call(NAME, serde_json::json!({"file_path": "/no/such/file.py"}))
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().starts_with("Error formatting code: /no/such/file.py"));
    }

    #[test]
    fn test_handler_uses_configured_commands() {
        let settings = FormatSettings {
            line_length: Some(100),
            black_command: Some("sh -c cat".to_string()),
            isort_command: Some("sh -c cat".to_string()),
        };
        let mut registry = ToolRegistry::new();
        register(&mut registry, &settings);
        let file = temp_py("x = 1\n");

        let report = registry
            .call(NAME, serde_json::json!({"file_path": file.path()}))
            .unwrap()
            .unwrap();
        assert!(report.contains("- Applied black formatting"));
        assert!(report.contains("- Applied isort formatting"));
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "x = 1\n");
    }
}
