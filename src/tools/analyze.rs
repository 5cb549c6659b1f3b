/// analyze_code Tool
///
/// Reads a Python file and reports definition/import statistics plus every
/// function or class that lacks a docstring.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::core::error::ToolError;
use crate::core::registry::{ToolDefinition, ToolHandler, ToolRegistry, parse_arguments};
use crate::tools::python::{self, DefKind, Definition};

pub const NAME: &str = "analyze_code";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnalyzeArgs {
    file_path: String,
}

pub fn register(registry: &mut ToolRegistry) {
    let tool = ToolDefinition {
        name: NAME.to_string(),
        description: "Analyzes Python code for potential issues and improvements.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the Python file to analyze"
                }
            },
            "required": ["file_path"]
        }),
    };

    let handler: ToolHandler = Box::new(|args: Value| -> Result<String, ToolError> {
        let args: AnalyzeArgs = parse_arguments(args)?;
        tracing::info!(tool = NAME, file_path = %args.file_path, "Analyzing code file");
        analyze_file(Path::new(&args.file_path)).map_err(|e| e.during("analyzing code"))
    });

    registry.register(tool, handler);
}

/// Analyze the Python file at `path` and render the report.
pub fn analyze_file(path: &Path) -> Result<String, ToolError> {
    let source = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
    Ok(analyze_source(&source)?.report())
}

/// Counters and findings for one source file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub functions: usize,
    pub classes: usize,
    pub imports: usize,
    pub lines: usize,
    pub issues: Vec<String>,
}

pub fn analyze_source(source: &str) -> Result<Analysis, ToolError> {
    let tree = python::parse(source)?;
    let mut analysis = Analysis {
        lines: source.lines().count(),
        ..Analysis::default()
    };

    python::for_each_node(tree.root_node(), |node| {
        if python::is_import(node) {
            analysis.imports += 1;
            return;
        }
        let Some(def) = Definition::from_node(node, source) else {
            return;
        };
        let label = match def.kind {
            DefKind::Function => {
                analysis.functions += 1;
                "Function"
            }
            DefKind::Class => {
                analysis.classes += 1;
                "Class"
            }
        };
        let documented = def.docstring(source).is_some_and(|doc| !doc.is_blank());
        if !documented {
            analysis
                .issues
                .push(format!("{label} '{}' is missing a docstring", def.name));
        }
    });

    Ok(analysis)
}

impl Analysis {
    pub fn report(&self) -> String {
        let mut report = vec![
            "Code Analysis Report:".to_string(),
            String::new(),
            "Statistics:".to_string(),
            format!("- Functions: {}", self.functions),
            format!("- Classes: {}", self.classes),
            format!("- Imports: {}", self.imports),
            format!("- Lines: {}", self.lines),
            String::new(),
        ];

        if self.issues.is_empty() {
            report.push("No issues found.".to_string());
        } else {
            report.push("Issues Found:".to_string());
            report.extend(self.issues.iter().map(|issue| format!("- {issue}")));
        }

        report.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"import os
from typing import List, Optional


class Store:
    """Holds things."""

    def get(self, key):
        return key

    async def fetch(self) -> Optional[str]:
        """Fetch remotely."""
        import json
        return None


def helper(items: List[int]) -> int:
    return sum(items)
"#;

    #[test]
    fn test_counts_and_issues() {
        let analysis = analyze_source(SAMPLE).unwrap();
        assert_eq!(analysis.functions, 3);
        assert_eq!(analysis.classes, 1);
        assert_eq!(analysis.imports, 3);
        assert_eq!(analysis.lines, 18);
        assert_eq!(
            analysis.issues,
            vec![
                "Function 'get' is missing a docstring".to_string(),
                "Function 'helper' is missing a docstring".to_string(),
            ]
        );
    }

    #[test]
    fn test_report_format() {
        let analysis = analyze_source(SAMPLE).unwrap();
        assert_eq!(
            analysis.report(),
            "Code Analysis Report:\n\nStatistics:\n- Functions: 3\n- Classes: 1\n- Imports: 3\n- Lines: 18\n\nIssues Found:\n- Function 'get' is missing a docstring\n- Function 'helper' is missing a docstring"
        );
    }

    #[test]
    fn test_clean_file_report() {
        let analysis = analyze_source("def f():\n    \"\"\"Doc.\"\"\"\n").unwrap();
        assert!(analysis.report().ends_with("\n\nNo issues found."));
    }

    #[test]
    fn test_blank_docstring_is_an_issue() {
        let analysis = analyze_source("class Empty:\n    \"\"\"   \"\"\"\n").unwrap();
        assert_eq!(analysis.issues, vec!["Class 'Empty' is missing a docstring"]);
    }

    #[test]
    fn test_empty_file() {
        let analysis = analyze_source("").unwrap();
        assert_eq!(analysis, Analysis::default());
    }

    #[test]
    fn test_analyze_file() {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let report = analyze_file(file.path()).unwrap();
        assert!(report.starts_with("Code Analysis Report:"));
        assert!(report.contains("- Classes: 1"));
    }

    #[test]
    fn test_handler_wraps_errors() {
        let mut registry = ToolRegistry::new();
        register(&mut registry);

        let err = registry
            .call(NAME, serde_json::json!({"file_path": "/no/such/file.py"}))
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().starts_with("Error analyzing code: /no/such/file.py"));

        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        file.write_all(b"def (:\n").unwrap();
        let err = registry
            .call(NAME, serde_json::json!({"file_path": file.path()}))
            .unwrap()
            .unwrap_err();
        assert_eq!(err.to_string(), "Error analyzing code: invalid syntax (line 1)");
    }

    #[test]
    fn test_handler_requires_file_path() {
        let mut registry = ToolRegistry::new();
        register(&mut registry);

        let err = registry.call(NAME, serde_json::json!({})).unwrap().unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
