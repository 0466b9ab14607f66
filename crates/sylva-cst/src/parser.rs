//! Parser adapter over tree-sitter.
//!
//! `parse_module` accepts any text and returns the raw tree; the `_strict`
//! variant and `check_module` additionally reject trees containing error or
//! missing nodes. `parse_snippet` accepts statement sequences that are not
//! legal at module scope (for example a dedented function body) by trying a
//! ladder of parse strategies.

use sylva_error::{ClientError, Error, Result};
use tree_sitter::{Node, Parser, Tree};

/// A validated code snippet, normalized to zero base indentation.
#[derive(Debug, Clone)]
pub struct Snippet {
    pub text: String,
    pub statement_count: usize,
}

impl Snippet {
    pub fn is_empty(&self) -> bool {
        self.statement_count == 0
    }

    /// Lines of the normalized snippet, without trailing empty lines.
    pub fn lines(&self) -> Vec<&str> {
        let mut lines: Vec<&str> = self.text.lines().collect();
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        lines
    }
}

fn python_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| Error::internal(format!("failed to load python grammar: {e}")))?;
    Ok(parser)
}

/// Parse source text into a tree. The tree may contain error nodes; use
/// [`parse_module_strict`] when the text must be a valid module.
pub fn parse_module(source: &str) -> Result<Tree> {
    let mut parser = python_parser()?;
    parser
        .parse(source, None)
        .ok_or_else(|| Error::internal("parser returned no tree"))
}

/// Parse and reject trees that contain syntax errors.
pub fn parse_module_strict(source: &str) -> Result<Tree> {
    let tree = parse_module(source)?;
    if let Some(message) = first_syntax_error(&tree, source) {
        return Err(ClientError::InvalidModule { message }.into());
    }
    Ok(tree)
}

/// Validate that `source` parses without error.
pub fn check_module(source: &str) -> Result<()> {
    parse_module_strict(source).map(|_| ())
}

/// Locate the first error or missing node and describe it.
pub fn first_syntax_error(tree: &Tree, source: &str) -> Option<String> {
    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }
    let node = find_error_node(root)?;
    let pos = node.start_position();
    let snippet: String = source
        .get(node.start_byte()..node.end_byte())
        .unwrap_or("")
        .chars()
        .take(40)
        .collect();
    if node.is_missing() {
        Some(format!(
            "missing {} at {}:{}",
            node.kind(),
            pos.row + 1,
            pos.column + 1
        ))
    } else {
        Some(format!(
            "syntax error at {}:{} near {snippet:?}",
            pos.row + 1,
            pos.column + 1
        ))
    }
}

fn find_error_node(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            if let Some(found) = find_error_node(child) {
                return Some(found);
            }
        }
    }
    Some(node)
}

/// True when the subtree contains an ERROR node. Missing tokens inserted by
/// recovery do not count; they mark incompleteness, not ambiguity.
fn contains_error_node(node: Node<'_>) -> bool {
    if node.is_error() {
        return true;
    }
    if !node.has_error() {
        return false;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if contains_error_node(child) {
            return true;
        }
    }
    false
}

/// Strip the minimum nonzero leading indentation shared by all non-empty
/// lines.
pub fn dedent(code: &str) -> String {
    let min_indent = code
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min();
    match min_indent {
        None | Some(0) => code.to_string(),
        Some(indent) => code
            .lines()
            .map(|line| {
                if line.trim().is_empty() {
                    ""
                } else if line.len() >= indent {
                    &line[indent..]
                } else {
                    line
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Parse a code snippet into a normalized statement sequence.
///
/// Strategy: dedent, then try to parse as a module; on failure, wrap the
/// dedented text as the body of a synthetic one-line function and parse
/// that; on failure again, try to read the text as a single statement.
/// Empty input yields an empty snippet.
pub fn parse_snippet(code: &str) -> Result<Snippet> {
    if code.trim().is_empty() {
        return Ok(Snippet {
            text: String::new(),
            statement_count: 0,
        });
    }

    let normalized = dedent(code);

    let module_tree = parse_module(&normalized)?;
    let module_error = first_syntax_error(&module_tree, &normalized);
    if module_error.is_none() {
        return Ok(Snippet {
            statement_count: module_tree.root_node().named_child_count(),
            text: normalized,
        });
    }

    // Statement sequences that are invalid at module scope may still be a
    // valid function body.
    let wrapped = wrap_as_function_body(&normalized);
    let wrapped_tree = parse_module(&wrapped)?;
    if first_syntax_error(&wrapped_tree, &wrapped).is_none() {
        if let Some(count) = wrapped_body_statement_count(&wrapped_tree) {
            return Ok(Snippet {
                statement_count: count,
                text: normalized,
            });
        }
    }

    // Last resort: read the text as one statement. The grammar has no
    // dedicated statement entry point, so the module tree stands in: a
    // single named top-level node whose recovery is limited to missing
    // tokens is an incomplete but unambiguous statement.
    let root = module_tree.root_node();
    if root.named_child_count() == 1 {
        if let Some(only) = root.named_child(0) {
            if !contains_error_node(only) {
                return Ok(Snippet {
                    statement_count: 1,
                    text: normalized,
                });
            }
        }
    }

    Err(ClientError::InvalidCode {
        message: format!(
            "failed to parse code snippet as statements: {}",
            module_error.unwrap_or_else(|| "unknown syntax error".into())
        ),
    }
    .into())
}

fn wrap_as_function_body(normalized: &str) -> String {
    let mut wrapped = String::from("def __snippet__():\n");
    for line in normalized.lines() {
        if line.trim().is_empty() {
            wrapped.push('\n');
        } else {
            wrapped.push_str("    ");
            wrapped.push_str(line);
            wrapped.push('\n');
        }
    }
    wrapped
}

fn wrapped_body_statement_count(tree: &Tree) -> Option<usize> {
    let root = tree.root_node();
    let func = root.named_child(0)?;
    if func.kind() != "function_definition" {
        return None;
    }
    let body = func.child_by_field_name("body")?;
    Some(body.named_child_count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_module_parses_clean() {
        check_module("class A:\n    def f(self):\n        return 1\n").unwrap();
    }

    #[test]
    fn broken_module_reports_position() {
        let err = check_module("def f(:\n").unwrap_err();
        match err {
            Error::Client(ClientError::InvalidModule { message }) => {
                assert!(message.contains("1:"), "{message}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_snippet_yields_empty_list() {
        let snippet = parse_snippet("   \n\n").unwrap();
        assert!(snippet.is_empty());
    }

    #[test]
    fn snippet_dedents_common_indentation() {
        let snippet = parse_snippet("        x = 1\n        y = 2\n").unwrap();
        assert_eq!(snippet.statement_count, 2);
        assert_eq!(snippet.text, "x = 1\ny = 2");
    }

    #[test]
    fn snippet_accepts_dedented_function_body() {
        // `return` outside a function is fine for the wrapper rung even if a
        // stricter compiler would reject it at module scope.
        let snippet = parse_snippet("    x = 1\n    return x\n").unwrap();
        assert_eq!(snippet.statement_count, 2);
    }

    #[test]
    fn snippet_falls_back_to_single_statement_parse() {
        // A lone compound-statement header has no suite, so both the bare
        // module parse and the function-body wrap report a missing block;
        // only the single-statement rung reads it as one statement.
        let snippet = parse_snippet("if ready:").unwrap();
        assert_eq!(snippet.statement_count, 1);
        assert_eq!(snippet.text, "if ready:");

        let snippet = parse_snippet("with open(path) as f:").unwrap();
        assert_eq!(snippet.statement_count, 1);
    }

    #[test]
    fn single_statement_rung_still_rejects_ambiguous_garbage() {
        // ERROR nodes (not just missing tokens) keep the last rung closed.
        assert!(parse_snippet("def (((\n").is_err());
        assert!(parse_snippet("x = = 1\n").is_err());
    }

    #[test]
    fn snippet_rejects_garbage() {
        let err = parse_snippet("def (((\n").unwrap_err();
        assert!(matches!(
            err,
            Error::Client(ClientError::InvalidCode { .. })
        ));
    }

    #[test]
    fn dedent_preserves_relative_indentation() {
        let out = dedent("    if x:\n        y = 1\n");
        assert_eq!(out, "if x:\n    y = 1");
    }
}
