/// Python Source Inspection
///
/// Thin helpers over the tree-sitter Python grammar shared by the analyze and
/// document tools: parsing with syntax-error detection, pre-order traversal,
/// and docstring / parameter extraction for `def` and `class` nodes.

use tree_sitter::{Node, Parser, Tree};

use crate::core::error::ToolError;

/// Parse Python source, failing on the first syntax error.
pub fn parse(source: &str) -> Result<Tree, ToolError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ToolError::Parser(format!("failed to load Python grammar: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ToolError::Parser("parser returned no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error_line(root).unwrap_or(root.start_position().row + 1);
        return Err(ToolError::Syntax { line });
    }
    Ok(tree)
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|child| child.has_error())
        .find_map(first_error_line)
}

/// Visit every node below `root` (inclusive) in source order.
pub fn for_each_node<'t>(root: Node<'t>, mut f: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        f(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.node() == root {
                return;
            }
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Kind of documentable definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Function,
    Class,
}

/// A `def` or `class` node together with its name.
#[derive(Debug, Clone)]
pub struct Definition<'t> {
    pub kind: DefKind,
    pub name: String,
    pub node: Node<'t>,
}

impl<'t> Definition<'t> {
    /// Recognise `function_definition` (sync or async) and `class_definition`.
    pub fn from_node(node: Node<'t>, source: &str) -> Option<Self> {
        let kind = match node.kind() {
            "function_definition" => DefKind::Function,
            "class_definition" => DefKind::Class,
            _ => return None,
        };
        let name = text(node.child_by_field_name("name")?, source).to_string();
        Some(Self { kind, name, node })
    }

    pub fn body(&self) -> Option<Node<'t>> {
        self.node.child_by_field_name("body")
    }

    /// The docstring statement, if the body starts with a string literal.
    pub fn docstring(&self, source: &str) -> Option<Docstring<'t>> {
        let body = self.body()?;
        let mut cursor = body.walk();
        let first = body
            .named_children(&mut cursor)
            .find(|child| child.kind() != "comment")?;
        if first.kind() != "expression_statement" || first.named_child_count() != 1 {
            return None;
        }
        let mut expr = first.named_child(0)?;
        // `("doc")` is still a docstring
        while expr.kind() == "parenthesized_expression" && expr.named_child_count() == 1 {
            expr = expr.named_child(0)?;
        }
        let value = match expr.kind() {
            "string" => string_value(text(expr, source))?,
            "concatenated_string" => {
                let mut parts = String::new();
                let mut cursor = expr.walk();
                for part in expr.named_children(&mut cursor) {
                    if part.kind() == "string" {
                        parts.push_str(&string_value(text(part, source))?);
                    }
                }
                parts
            }
            _ => return None,
        };
        Some(Docstring { statement: first, value })
    }

    /// Names of the positional parameters, in order.
    ///
    /// Positional-only parameters and `self`/`cls` are included; `*args`,
    /// `**kwargs` and keyword-only parameters are not.
    pub fn positional_params(&self, source: &str) -> Vec<String> {
        let Some(params) = self.node.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut names = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            match param.kind() {
                "identifier" => names.push(text(param, source).to_string()),
                "default_parameter" | "typed_default_parameter" => {
                    if let Some(name) = param.child_by_field_name("name") {
                        names.push(text(name, source).to_string());
                    }
                }
                "typed_parameter" => match param.named_child(0) {
                    Some(inner) if inner.kind() == "identifier" => {
                        names.push(text(inner, source).to_string())
                    }
                    // `*args: int` - everything after is keyword-only
                    Some(inner) if inner.kind() == "list_splat_pattern" => break,
                    _ => {}
                },
                "list_splat_pattern" | "keyword_separator" => break,
                _ => {}
            }
        }
        names
    }

    /// Source text of the return annotation, if any.
    pub fn return_annotation<'s>(&self, source: &'s str) -> Option<&'s str> {
        self.node
            .child_by_field_name("return_type")
            .map(|node| text(node, source))
    }
}

/// A docstring statement and its literal contents (quotes stripped).
#[derive(Debug, Clone)]
pub struct Docstring<'t> {
    pub statement: Node<'t>,
    pub value: String,
}

impl Docstring<'_> {
    /// Mirrors Python's notion of "has documentation": an empty or
    /// whitespace-only docstring does not count.
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// Strip prefix and quotes from a string literal. f-strings and bytes are
/// not docstrings, so they yield `None`.
fn string_value(literal: &str) -> Option<String> {
    let prefix_len = literal
        .find(|c: char| c == '"' || c == '\'')
        .unwrap_or(literal.len());
    let prefix = &literal[..prefix_len];
    if prefix.chars().any(|c| matches!(c, 'f' | 'F' | 'b' | 'B')) {
        return None;
    }
    let quoted = &literal[prefix_len..];
    let quote_len = if quoted.starts_with("\"\"\"") || quoted.starts_with("'''") {
        3
    } else {
        1
    };
    if quoted.len() < quote_len * 2 {
        return Some(String::new());
    }
    Some(quoted[quote_len..quoted.len() - quote_len].to_string())
}

/// Whether a node is an import statement of any form.
pub fn is_import(node: Node) -> bool {
    matches!(
        node.kind(),
        "import_statement" | "import_from_statement" | "future_import_statement"
    )
}

pub fn text<'s>(node: Node, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}
