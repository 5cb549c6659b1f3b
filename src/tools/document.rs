/// document_code Tool
///
/// Generates template docstrings for every function and class in a Python
/// file and writes them back. Existing docstrings are kept unless the caller
/// asks for them to be replaced.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::ops::Range;
use std::path::Path;

use crate::core::config::DocumentSettings;
use crate::core::error::ToolError;
use crate::core::registry::{ToolDefinition, ToolHandler, ToolRegistry, parse_arguments};
use crate::tools::python::{self, DefKind, Definition};

pub const NAME: &str = "document_code";

/// Docstring layout convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStyle {
    #[default]
    Google,
    Numpy,
    Sphinx,
}

impl fmt::Display for DocStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocStyle::Google => "google",
            DocStyle::Numpy => "numpy",
            DocStyle::Sphinx => "sphinx",
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DocumentArgs {
    file_path: String,
    doc_style: Option<DocStyle>,
    update_existing: Option<bool>,
}

pub fn register(registry: &mut ToolRegistry, settings: &DocumentSettings) {
    let default_style = settings.doc_style.unwrap_or_default();

    let tool = ToolDefinition {
        name: NAME.to_string(),
        description: "Generates or updates Python code documentation.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the Python file to document"
                },
                "doc_style": {
                    "type": "string",
                    "enum": ["google", "numpy", "sphinx"],
                    "description": "Documentation style to use",
                    "default": default_style.to_string()
                },
                "update_existing": {
                    "type": "boolean",
                    "description": "Whether to replace existing docstrings",
                    "default": false
                }
            },
            "required": ["file_path"]
        }),
    };

    let handler: ToolHandler = Box::new(move |args: Value| -> Result<String, ToolError> {
        let args: DocumentArgs = parse_arguments(args)?;
        let style = args.doc_style.unwrap_or(default_style);
        let update_existing = args.update_existing.unwrap_or(false);
        tracing::info!(
            tool = NAME,
            file_path = %args.file_path,
            %style,
            update_existing,
            "Documenting code file"
        );
        document_file(Path::new(&args.file_path), style, update_existing)
            .map_err(|e| e.during("documenting code"))
    });

    registry.register(tool, handler);
}

/// Document the file at `path` in place and render the report.
pub fn document_file(
    path: &Path,
    style: DocStyle,
    update_existing: bool,
) -> Result<String, ToolError> {
    let source = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
    let outcome = document_source(&source, style, update_existing)?;

    if outcome.code != source {
        std::fs::write(path, &outcome.code).map_err(|e| ToolError::io(path, e))?;
        tracing::debug!(path = %path.display(), "Wrote documented code");
    }

    Ok(outcome.report(style))
}

/// Result of documenting one source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Documented {
    pub code: String,
    /// Functions that already carried a docstring
    pub functions_documented: usize,
    /// Classes that already carried a docstring
    pub classes_documented: usize,
    /// Definitions that had no (or only a blank) docstring
    pub missing_docs: usize,
}

impl Documented {
    pub fn report(&self, style: DocStyle) -> String {
        let mut report = vec![
            "Documentation Report:".to_string(),
            String::new(),
            "Statistics:".to_string(),
            format!("- Functions documented: {}", self.functions_documented),
            format!("- Classes documented: {}", self.classes_documented),
            format!("- Missing docs: {}", self.missing_docs),
            String::new(),
        ];

        let total = self.functions_documented + self.classes_documented;
        if total > 0 {
            report.push(format!("Successfully documented {total} items using {style} style."));
        }
        if self.missing_docs > 0 {
            report.push(format!(
                "Added documentation to {} items that were missing docstrings.",
                self.missing_docs
            ));
        }

        report.join("\n")
    }
}

struct Edit {
    range: Range<usize>,
    text: String,
}

pub fn document_source(
    source: &str,
    style: DocStyle,
    update_existing: bool,
) -> Result<Documented, ToolError> {
    let tree = python::parse(source)?;
    let mut outcome = Documented::default();
    let mut edits = Vec::new();

    python::for_each_node(tree.root_node(), |node| {
        let Some(def) = Definition::from_node(node, source) else {
            return;
        };
        let existing = def.docstring(source);
        let has_docs = existing.as_ref().is_some_and(|doc| !doc.is_blank());
        match (has_docs, def.kind) {
            (false, _) => outcome.missing_docs += 1,
            (true, DefKind::Function) => outcome.functions_documented += 1,
            (true, DefKind::Class) => outcome.classes_documented += 1,
        }

        let docstring = generate(&def, source, style);
        let edit = match existing {
            Some(_) if has_docs && !update_existing => None,
            Some(doc) => {
                let indent = line_indent(source, doc.statement.start_byte());
                Some(Edit {
                    range: doc.statement.byte_range(),
                    text: quote(&docstring, indent),
                })
            }
            None => insertion(&def, source, &docstring),
        };
        edits.extend(edit);
    });

    // Edits never overlap; apply back to front so earlier offsets stay valid
    edits.sort_by_key(|edit| std::cmp::Reverse(edit.range.start));
    let mut code = source.to_string();
    for edit in edits {
        code.replace_range(edit.range, &edit.text);
    }
    outcome.code = code;

    Ok(outcome)
}

/// Build the edit that puts a new docstring at the top of a body.
fn insertion(def: &Definition, source: &str, docstring: &str) -> Option<Edit> {
    let body = def.body()?;
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment")?;
    let at = first.start_byte();
    let line_start = source[..at].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &source[line_start..at];

    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        return Some(Edit {
            range: at..at,
            text: format!("{}\n{prefix}", quote(docstring, prefix)),
        });
    }

    // Body shares the header line (`def f(): pass`): move it onto its own
    // line below the docstring.
    let indent = format!("{}    ", line_indent(source, def.node.start_byte()));
    let gap_start = source[..at].trim_end_matches([' ', '\t']).len();
    Some(Edit {
        range: gap_start..at,
        text: format!("\n{indent}{}\n{indent}", quote(docstring, &indent)),
    })
}

/// Leading whitespace of the line containing `offset`.
fn line_indent(source: &str, offset: usize) -> &str {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &source[line_start..];
    let end = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..end]
}

/// Render docstring text as a triple-quoted literal whose continuation lines
/// sit at `indent`.
fn quote(docstring: &str, indent: &str) -> String {
    let escaped = docstring.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"");
    let mut lines = escaped.lines();
    let mut out = String::from("\"\"\"");
    out.push_str(lines.next().unwrap_or_default());
    let mut multiline = false;
    for line in lines {
        multiline = true;
        out.push('\n');
        if !line.is_empty() {
            out.push_str(indent);
            out.push_str(line);
        }
    }
    if multiline {
        out.push('\n');
        out.push_str(indent);
    }
    out.push_str("\"\"\"");
    out
}

/// Generate the docstring text for a definition.
pub fn generate(def: &Definition, source: &str, style: DocStyle) -> String {
    match def.kind {
        DefKind::Function => {
            let args = def.positional_params(source);
            let returns = def
                .return_annotation(source)
                .map(|ret| ret.split_whitespace().collect::<Vec<_>>().join(" "));
            function_doc(&def.name, &args, returns.as_deref(), style)
        }
        DefKind::Class => class_doc(&def.name, style),
    }
}

fn function_doc(name: &str, args: &[String], returns: Option<&str>, style: DocStyle) -> String {
    let mut doc = vec![format!("{name} function."), String::new()];

    match style {
        DocStyle::Google => {
            if !args.is_empty() {
                doc.push("Args:".to_string());
                doc.extend(args.iter().map(|arg| format!("    {arg}: Description of {arg}.")));
                doc.push(String::new());
            }
            if let Some(ret) = returns {
                doc.push("Returns:".to_string());
                doc.push(format!("    {ret}"));
            }
        }
        DocStyle::Numpy => {
            if !args.is_empty() {
                doc.push("Parameters".to_string());
                doc.push("----------".to_string());
                for arg in args {
                    doc.push(format!("{arg} : type"));
                    doc.push(format!("    Description of {arg}."));
                }
                doc.push(String::new());
            }
            if let Some(ret) = returns {
                doc.push("Returns".to_string());
                doc.push("-------".to_string());
                doc.push(ret.to_string());
            }
        }
        DocStyle::Sphinx => {
            if !args.is_empty() {
                doc.extend(args.iter().map(|arg| format!(":param {arg}: Description of {arg}.")));
                doc.push(String::new());
            }
            if let Some(ret) = returns {
                doc.push(format!(":returns: {ret}"));
            }
        }
    }

    while doc.last().is_some_and(|line| line.is_empty()) {
        doc.pop();
    }
    doc.join("\n")
}

fn class_doc(name: &str, style: DocStyle) -> String {
    match style {
        DocStyle::Google => format!("{name} class.\n\nAttributes:\n    Add class attributes here."),
        DocStyle::Numpy => {
            format!("{name} class.\n\nAttributes\n----------\nAdd class attributes here.")
        }
        DocStyle::Sphinx => format!("{name} class.\n\n:ivar: Add class attributes here."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_inserts_google_docstrings() {
        let source = "class Greeter:\n    def greet(self, name: str) -> str:\n        return name\n";
        let out = document_source(source, DocStyle::Google, false).unwrap();
        assert_eq!(
            out.code,
            "class Greeter:\n    \"\"\"Greeter class.\n\n    Attributes:\n        Add class attributes here.\n    \"\"\"\n    def greet(self, name: str) -> str:\n        \"\"\"greet function.\n\n        Args:\n            self: Description of self.\n            name: Description of name.\n\n        Returns:\n            str\n        \"\"\"\n        return name\n"
        );
        assert_eq!(out.missing_docs, 2);
        assert_eq!(out.functions_documented, 0);
    }

    #[test]
    fn test_inserted_code_still_parses() {
        let source = "import os\n\ndef a(x, *args, y=1, **kw):\n    # comment first\n    return x\n\nclass B(object):\n    @property\n    def c(self):\n        pass\n";
        for style in [DocStyle::Google, DocStyle::Numpy, DocStyle::Sphinx] {
            let out = document_source(source, style, false).unwrap();
            let again = document_source(&out.code, style, false).unwrap();
            assert_eq!(again.missing_docs, 0, "{style}:\n{}", out.code);
            assert_eq!(again.functions_documented, 2);
            assert_eq!(again.classes_documented, 1);
            assert_eq!(again.code, out.code);
        }
    }

    #[test]
    fn test_numpy_function_doc() {
        let doc = function_doc("f", &["a".to_string()], Some("int"), DocStyle::Numpy);
        assert_eq!(
            doc,
            "f function.\n\nParameters\n----------\na : type\n    Description of a.\n\nReturns\n-------\nint"
        );
    }

    #[test]
    fn test_sphinx_function_doc() {
        let doc = function_doc("f", &["a".to_string(), "b".to_string()], None, DocStyle::Sphinx);
        assert_eq!(
            doc,
            "f function.\n\n:param a: Description of a.\n:param b: Description of b."
        );
    }

    #[test]
    fn test_bare_function_doc_is_single_line() {
        let source = "def noop():\n    pass\n";
        let out = document_source(source, DocStyle::Google, false).unwrap();
        assert_eq!(out.code, "def noop():\n    \"\"\"noop function.\"\"\"\n    pass\n");
    }

    #[test]
    fn test_single_line_body_is_split() {
        let source = "def f(): return 1\n";
        let out = document_source(source, DocStyle::Sphinx, false).unwrap();
        assert_eq!(out.code, "def f():\n    \"\"\"f function.\"\"\"\n    return 1\n");
    }

    #[test]
    fn test_existing_docstring_kept() {
        let source = "def f(a):\n    \"\"\"Hand written.\"\"\"\n    return a\n";
        let out = document_source(source, DocStyle::Google, false).unwrap();
        assert_eq!(out.code, source);
        assert_eq!(out.functions_documented, 1);
        assert_eq!(out.missing_docs, 0);
    }

    #[test]
    fn test_parenthesized_docstring_kept() {
        let source = "def f():\n    (\"Hand written.\")\n    return 1\n";
        let out = document_source(source, DocStyle::Google, false).unwrap();
        assert_eq!(out.code, source);
        assert_eq!(out.functions_documented, 1);
    }

    #[test]
    fn test_existing_docstring_replaced() {
        let source = "class C:\n    '''Old.'''\n    x = 1\n";
        let out = document_source(source, DocStyle::Sphinx, true).unwrap();
        assert_eq!(
            out.code,
            "class C:\n    \"\"\"C class.\n\n    :ivar: Add class attributes here.\n    \"\"\"\n    x = 1\n"
        );
        assert_eq!(out.classes_documented, 1);
    }

    #[test]
    fn test_blank_docstring_replaced() {
        let source = "def f():\n    \"\"\"\"\"\"\n";
        let out = document_source(source, DocStyle::Google, false).unwrap();
        assert_eq!(out.code, "def f():\n    \"\"\"f function.\"\"\"\n");
        assert_eq!(out.missing_docs, 1);
    }

    #[test]
    fn test_report() {
        let outcome = Documented {
            code: String::new(),
            functions_documented: 2,
            classes_documented: 1,
            missing_docs: 4,
        };
        assert_eq!(
            outcome.report(DocStyle::Numpy),
            "Documentation Report:\n\nStatistics:\n- Functions documented: 2\n- Classes documented: 1\n- Missing docs: 4\n\nSuccessfully documented 3 items using numpy style.\nAdded documentation to 4 items that were missing docstrings."
        );
    }

    #[test]
    fn test_report_with_nothing_to_do() {
        assert_eq!(
            Documented::default().report(DocStyle::Google),
            "Documentation Report:\n\nStatistics:\n- Functions documented: 0\n- Classes documented: 0\n- Missing docs: 0\n"
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a \"\"\" b", "    "), "\"\"\"a \\\"\\\"\\\" b\"\"\"");
    }

    #[test]
    fn test_handler_rejects_unknown_style() {
        let mut registry = ToolRegistry::new();
        register(&mut registry, &DocumentSettings::default());
        let err = registry
            .call(
                NAME,
                serde_json::json!({"file_path": "x.py", "doc_style": "epytext"}),
            )
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("epytext"));
    }

    #[test]
    fn test_handler_documents_file() {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        file.write_all(b"def f(x):\n    return x\n").unwrap();

        let mut registry = ToolRegistry::new();
        register(
            &mut registry,
            &DocumentSettings { doc_style: Some(DocStyle::Sphinx) },
        );
        let report = registry
            .call(NAME, serde_json::json!({"file_path": file.path()}))
            .unwrap()
            .unwrap();

        assert!(report.ends_with("Added documentation to 1 items that were missing docstrings."));
        let written = std::fs::read_to_string(file.path()).unwrap();
        assert!(written.contains(":param x: Description of x."));
    }

    #[test]
    fn test_handler_reports_syntax_error() {
        let mut file = tempfile::Builder::new().suffix(".py").tempfile().unwrap();
        file.write_all(b"class :\n").unwrap();

        let mut registry = ToolRegistry::new();
        register(&mut registry, &DocumentSettings::default());
        let err = registry
            .call(NAME, serde_json::json!({"file_path": file.path()}))
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().starts_with("Error documenting code: invalid syntax"));
    }
}
