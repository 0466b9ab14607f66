//! Atomic batch mutation of a tree.
//!
//! Execution is two-phase. Phase one resolves every referenced node id
//! against the pre-batch index, parses every code snippet, and computes one
//! byte-range edit per operation; any failure aborts before the source is
//! touched. Phase two splices the edits back-to-front into a working copy,
//! re-parses it, and only then swaps the module in and rebuilds the index.
//! The live tree is byte-identical to its pre-call state on every error
//! path.

use sylva_core::{CodeInput, InsertPosition, TreeOperation};
use sylva_error::{ClientError, Error, Result};

use crate::parser::{self, Snippet};
use crate::tree::CstTree;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyOutcome {
    pub operations_applied: usize,
    pub node_count: usize,
}

#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    /// Byte offset of the start of a 1-based line.
    fn line_start(&self, line: u32) -> usize {
        let idx = (line as usize).saturating_sub(1);
        *self.starts.get(idx).unwrap_or(&0)
    }

    /// Byte offset of the newline ending a 1-based line, or the source
    /// length when the line is unterminated.
    fn line_end(&self, source: &str, line: u32) -> usize {
        match self.starts.get(line as usize) {
            Some(next_start) => next_start - 1,
            None => source.len(),
        }
    }
}

/// Apply a batch of operations, all-or-nothing.
pub fn modify_tree(tree: &mut CstTree, ops: &[TreeOperation]) -> Result<ModifyOutcome> {
    if ops.is_empty() {
        return Ok(ModifyOutcome {
            operations_applied: 0,
            node_count: tree.node_count(),
        });
    }

    let lines = LineIndex::new(tree.source());

    // Phase one: static validation, producing one edit per operation.
    let mut edits = Vec::with_capacity(ops.len());
    for (i, op) in ops.iter().enumerate() {
        let edit = compute_edit(tree, &lines, op).map_err(|e| op_context(e, i, op.action()))?;
        edits.push(edit);
    }
    check_overlap(&edits)?;

    // Phase two: splice into a working copy and re-validate.
    let mut order: Vec<usize> = (0..edits.len()).collect();
    order.sort_by_key(|&i| (edits[i].start, edits[i].end));

    let mut working = tree.source().to_string();
    for &i in order.iter().rev() {
        let edit = &edits[i];
        working.replace_range(edit.start..edit.end, &edit.text);
    }

    let new_tree = parser::parse_module_strict(&working).map_err(|e| match e {
        Error::Client(ClientError::InvalidModule { message }) => {
            Error::from(ClientError::InvalidModule {
                message: format!("module does not parse after applying operations: {message}"),
            })
        }
        other => other,
    })?;

    tree.replace_module(working, new_tree);
    tracing::debug!(
        tree_id = %tree.tree_id,
        operations = ops.len(),
        nodes = tree.node_count(),
        "applied mutation batch"
    );

    Ok(ModifyOutcome {
        operations_applied: ops.len(),
        node_count: tree.node_count(),
    })
}

/// Prefix message-carrying errors with the failing operation, so a batch
/// failure names the op that caused it.
fn op_context(err: Error, index: usize, action: &str) -> Error {
    let tag = format!("operation {} ({action})", index + 1);
    match err {
        Error::Client(ClientError::InvalidCode { message }) => {
            ClientError::InvalidCode {
                message: format!("{tag}: {message}"),
            }
            .into()
        }
        Error::Client(ClientError::Validation { message }) => {
            ClientError::Validation {
                message: format!("{tag}: {message}"),
            }
            .into()
        }
        Error::Client(ClientError::InvalidInsertTarget { message }) => {
            ClientError::InvalidInsertTarget {
                message: format!("{tag}: {message}"),
            }
            .into()
        }
        other => other,
    }
}

fn check_overlap(edits: &[Edit]) -> Result<()> {
    let mut order: Vec<usize> = (0..edits.len()).collect();
    order.sort_by_key(|&i| (edits[i].start, edits[i].end));
    for pair in order.windows(2) {
        let (a, b) = (&edits[pair[0]], &edits[pair[1]]);
        if a.end > b.start {
            return Err(ClientError::Validation {
                message: format!(
                    "operations {} and {} modify overlapping ranges",
                    pair[0] + 1,
                    pair[1] + 1
                ),
            }
            .into());
        }
    }
    Ok(())
}

fn compute_edit(tree: &CstTree, lines: &LineIndex, op: &TreeOperation) -> Result<Edit> {
    match op {
        TreeOperation::Replace { node_id, code } => replace_edit(tree, lines, node_id, code),
        TreeOperation::Delete { node_id } => delete_edit(tree, lines, node_id),
        TreeOperation::Insert {
            parent_node_id,
            target_node_id,
            position,
            code,
        } => insert_edit(
            tree,
            lines,
            parent_node_id.as_deref(),
            target_node_id.as_deref(),
            *position,
            code,
        ),
        TreeOperation::ReplaceRange {
            start_node_id,
            end_node_id,
            code,
        } => replace_range_edit(tree, lines, start_node_id, end_node_id, code),
    }
}

/// REPLACE and INSERT require the target to sit directly inside a
/// replaceable container: the module body or an indented block.
fn ensure_statement_container(tree: &CstTree, node_id: &str) -> Result<String> {
    match tree.parent_id(node_id) {
        None => Err(ClientError::NotReplaceable {
            node_id: node_id.to_string(),
            hint: "the module itself cannot be replaced; operate on its statements".into(),
        }
        .into()),
        Some(parent_id) => {
            let parent = tree
                .record(parent_id)
                .ok_or_else(|| Error::internal("parent record missing from index"))?;
            if parent.ts_kind == "module" || parent.ts_kind == "block" {
                Ok(parent_id.clone())
            } else {
                Err(ClientError::NotReplaceable {
                    node_id: node_id.to_string(),
                    hint: "node is nested inside a composite statement; use replace_range \
                           on statements of an enclosing block"
                        .into(),
                }
                .into())
            }
        }
    }
}

fn line_indent(source: &str, line_start: usize) -> &str {
    let rest = &source[line_start..];
    let end = rest
        .char_indices()
        .find(|(_, c)| !matches!(c, ' ' | '\t'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Replacement text for an in-place splice: the first line lands where the
/// node started, continuation lines are re-indented to the node's level.
fn reindent_inline(snippet: &Snippet, indent: &str) -> String {
    let mut out = String::new();
    for (i, line) in snippet.lines().iter().enumerate() {
        if i > 0 {
            out.push('\n');
            if !line.trim().is_empty() {
                out.push_str(indent);
            }
        }
        out.push_str(line);
    }
    out
}

/// Replacement text in whole-line form: every line indented and terminated.
fn indent_block(snippet: &Snippet, indent: &str) -> String {
    let mut out = String::new();
    for line in snippet.lines() {
        if line.trim().is_empty() {
            out.push('\n');
        } else {
            out.push_str(indent);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

fn required_code(code: &CodeInput, action: &str) -> Result<String> {
    code.text().ok_or_else(|| {
        ClientError::Validation {
            message: format!("code required for {action} operation"),
        }
        .into()
    })
}

fn replace_edit(
    tree: &CstTree,
    lines: &LineIndex,
    node_id: &str,
    code: &CodeInput,
) -> Result<Edit> {
    let text = required_code(code, "replace")?;
    if text.trim().is_empty() {
        // Empty code means delete.
        return delete_edit(tree, lines, node_id);
    }
    let (record, meta) = tree.resolve(node_id)?;
    ensure_statement_container(tree, node_id)?;

    let snippet = parser::parse_snippet(&text)?;
    let source = tree.source();
    let indent = line_indent(source, lines.line_start(meta.span.start_line));
    Ok(Edit {
        start: record.start_byte,
        end: record.end_byte,
        text: reindent_inline(&snippet, indent),
    })
}

fn delete_edit(tree: &CstTree, lines: &LineIndex, node_id: &str) -> Result<Edit> {
    let (record, meta) = tree.resolve(node_id)?;
    let source = tree.source();

    let line_start = lines.line_start(meta.span.start_line);
    let line_end = lines.line_end(source, meta.span.end_line);
    let owns_lines = source[line_start..record.start_byte].trim().is_empty()
        && source[record.end_byte..line_end].trim().is_empty();

    if !owns_lines {
        return Ok(Edit {
            start: record.start_byte,
            end: record.end_byte,
            text: String::new(),
        });
    }

    let end = (line_end + 1).min(source.len());
    // Python has no empty suite: removing the last statement of an indented
    // block splices a placeholder so the module still parses.
    let empties_block = tree.parent_id(node_id).is_some_and(|parent_id| {
        tree.record(parent_id)
            .is_some_and(|p| p.ts_kind == "block")
            && tree.children_of(parent_id).len() == 1
    });
    let text = if empties_block {
        format!("{}pass\n", line_indent(source, line_start))
    } else {
        String::new()
    };

    Ok(Edit {
        start: line_start,
        end,
        text,
    })
}

fn insert_edit(
    tree: &CstTree,
    lines: &LineIndex,
    parent_node_id: Option<&str>,
    target_node_id: Option<&str>,
    position: InsertPosition,
    code: &CodeInput,
) -> Result<Edit> {
    let text = required_code(code, "insert")?;
    if text.trim().is_empty() {
        return Err(ClientError::Validation {
            message: "cannot insert empty code".into(),
        }
        .into());
    }
    let snippet = parser::parse_snippet(&text)?;

    match (parent_node_id, target_node_id) {
        (Some(parent_id), None) => insert_into_parent(tree, lines, parent_id, position, &snippet),
        (None, Some(target_id)) => insert_at_target(tree, lines, target_id, position, &snippet),
        (None, None) => Err(ClientError::InvalidInsertTarget {
            message: "parent_node_id or target_node_id required for insert operation".into(),
        }
        .into()),
        (Some(_), Some(_)) => Err(ClientError::InvalidInsertTarget {
            message: "parent_node_id and target_node_id are mutually exclusive".into(),
        }
        .into()),
    }
}

fn insert_into_parent(
    tree: &CstTree,
    lines: &LineIndex,
    parent_id: &str,
    position: InsertPosition,
    snippet: &Snippet,
) -> Result<Edit> {
    let (record, _meta) = tree.resolve(parent_id)?;
    let source = tree.source();

    // Resolve the statement container the snippet is spliced into.
    let block_id: Option<String> = match record.ts_kind {
        "module" => None,
        "block" => Some(parent_id.to_string()),
        "class_definition" | "function_definition" => {
            let block = tree
                .children_of(parent_id)
                .into_iter()
                .find(|cid| tree.record(cid.as_str()).is_some_and(|r| r.ts_kind == "block"))
                .cloned();
            match block {
                Some(block) => Some(block),
                None => {
                    return Err(ClientError::NotReplaceable {
                        node_id: parent_id.to_string(),
                        hint: "definition has no indexed body block".into(),
                    }
                    .into())
                }
            }
        }
        _ => {
            return Err(ClientError::NotReplaceable {
                node_id: parent_id.to_string(),
                hint: "insert parent must be the module, a class, a function, or a block".into(),
            }
            .into())
        }
    };

    match block_id {
        None => {
            // Module body: start or end of file.
            let body = indent_block(snippet, "");
            match position {
                InsertPosition::Before => Ok(Edit {
                    start: 0,
                    end: 0,
                    text: body,
                }),
                InsertPosition::After => {
                    if source.is_empty() || source.ends_with('\n') {
                        Ok(Edit {
                            start: source.len(),
                            end: source.len(),
                            text: body,
                        })
                    } else {
                        Ok(Edit {
                            start: source.len(),
                            end: source.len(),
                            text: format!("\n{body}"),
                        })
                    }
                }
            }
        }
        Some(block_id) => {
            let (block_record, block_meta) = tree.resolve(&block_id)?;
            let block_line_start = lines.line_start(block_meta.span.start_line);
            if !source[block_line_start..block_record.start_byte]
                .trim()
                .is_empty()
            {
                return Err(ClientError::NotReplaceable {
                    node_id: block_id,
                    hint: "body shares a line with its header; rewrite the definition instead"
                        .into(),
                }
                .into());
            }
            let indent = line_indent(source, block_line_start).to_string();
            let body = indent_block(snippet, &indent);
            match position {
                InsertPosition::Before => Ok(Edit {
                    start: block_line_start,
                    end: block_line_start,
                    text: body,
                }),
                InsertPosition::After => {
                    let line_end = lines.line_end(source, block_meta.span.end_line);
                    insert_after_line(source, line_end, body)
                }
            }
        }
    }
}

fn insert_at_target(
    tree: &CstTree,
    lines: &LineIndex,
    target_id: &str,
    position: InsertPosition,
    snippet: &Snippet,
) -> Result<Edit> {
    let (record, meta) = tree.resolve(target_id)?;
    ensure_statement_container(tree, target_id)?;
    let source = tree.source();

    let line_start = lines.line_start(meta.span.start_line);
    if !source[line_start..record.start_byte].trim().is_empty() {
        return Err(ClientError::NotReplaceable {
            node_id: target_id.to_string(),
            hint: "target shares a line with other code; use replace instead".into(),
        }
        .into());
    }

    let indent = line_indent(source, line_start).to_string();
    let body = indent_block(snippet, &indent);
    match position {
        InsertPosition::Before => Ok(Edit {
            start: line_start,
            end: line_start,
            text: body,
        }),
        InsertPosition::After => {
            let line_end = lines.line_end(source, meta.span.end_line);
            insert_after_line(source, line_end, body)
        }
    }
}

fn insert_after_line(source: &str, line_end: usize, body: String) -> Result<Edit> {
    if line_end >= source.len() {
        // Unterminated final line: open a new one first.
        Ok(Edit {
            start: source.len(),
            end: source.len(),
            text: format!("\n{body}"),
        })
    } else {
        Ok(Edit {
            start: line_end + 1,
            end: line_end + 1,
            text: body,
        })
    }
}

fn replace_range_edit(
    tree: &CstTree,
    lines: &LineIndex,
    start_node_id: &str,
    end_node_id: &str,
    code: &CodeInput,
) -> Result<Edit> {
    let (start_record, start_meta) = tree.resolve(start_node_id)?;
    let (end_record, end_meta) = tree.resolve(end_node_id)?;

    let start_parent = tree.parent_id(start_node_id);
    let end_parent = tree.parent_id(end_node_id);
    let parent_id = match (start_parent, end_parent) {
        (Some(a), Some(b)) if a == b => a.clone(),
        _ => {
            return Err(ClientError::InvalidRangeEndpoints {
                start_node_id: start_node_id.to_string(),
                end_node_id: end_node_id.to_string(),
                reason: "endpoints do not share a parent".into(),
            }
            .into())
        }
    };
    ensure_statement_container(tree, start_node_id)?;
    if start_record.start_byte > end_record.start_byte {
        return Err(ClientError::InvalidRangeEndpoints {
            start_node_id: start_node_id.to_string(),
            end_node_id: end_node_id.to_string(),
            reason: "start endpoint appears after end endpoint".into(),
        }
        .into());
    }

    let source = tree.source();
    let text = required_code(code, "replace_range")?;

    let line_start = lines.line_start(start_meta.span.start_line);
    let line_end = lines.line_end(source, end_meta.span.end_line);
    let owns_lines = source[line_start..start_record.start_byte].trim().is_empty()
        && source[end_record.end_byte..line_end].trim().is_empty();

    if text.trim().is_empty() {
        // Empty replacement deletes the whole span.
        if !owns_lines {
            return Ok(Edit {
                start: start_record.start_byte,
                end: end_record.end_byte,
                text: String::new(),
            });
        }
        let end = (line_end + 1).min(source.len());
        let empties_block = tree
            .record(&parent_id)
            .is_some_and(|p| p.ts_kind == "block")
            && tree.children_of(&parent_id).into_iter().all(|cid| {
                tree.record(cid.as_str()).is_some_and(|r| {
                    r.start_byte >= start_record.start_byte && r.end_byte <= end_record.end_byte
                })
            });
        let text = if empties_block {
            format!("{}pass\n", line_indent(source, line_start))
        } else {
            String::new()
        };
        return Ok(Edit {
            start: line_start,
            end,
            text,
        });
    }

    let snippet = parser::parse_snippet(&text)?;
    if owns_lines {
        let indent = line_indent(source, line_start);
        Ok(Edit {
            start: line_start,
            end: (line_end + 1).min(source.len()),
            text: indent_block(&snippet, indent),
        })
    } else {
        let indent = line_indent(source, line_start);
        Ok(Edit {
            start: start_record.start_byte,
            end: end_record.end_byte,
            text: reindent_inline(&snippet, indent),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{CstTree, IndexOptions};
    use sylva_core::{CodeInput, InsertPosition, TreeOperation};

    const SAMPLE: &str = "class A:\n    def f(self):\n        return 1\n";

    fn load(source: &str) -> CstTree {
        CstTree::from_source("/tmp/m.py", source.to_string(), IndexOptions::all()).unwrap()
    }

    fn id_of(tree: &CstTree, node_type: &str) -> String {
        tree.metadata_map
            .values()
            .find(|m| m.node_type == node_type)
            .map(|m| m.node_id.clone())
            .unwrap_or_else(|| panic!("no node of type {node_type}"))
    }

    fn id_of_name(tree: &CstTree, name: &str) -> String {
        tree.metadata_map
            .values()
            .find(|m| m.name.as_deref() == Some(name) && m.node_type == "FunctionDef")
            .map(|m| m.node_id.clone())
            .unwrap_or_else(|| panic!("no function named {name}"))
    }

    #[test]
    fn replace_function_body() {
        let mut tree = load(SAMPLE);
        let f = id_of_name(&tree, "f");
        let op = TreeOperation::Replace {
            node_id: f,
            code: CodeInput::from_str("def f(self):\n    return 2\n"),
        };
        let outcome = modify_tree(&mut tree, &[op]).unwrap();
        assert_eq!(outcome.operations_applied, 1);
        assert_eq!(tree.source(), "class A:\n    def f(self):\n        return 2\n");
    }

    #[test]
    fn batch_rolls_back_on_unknown_node() {
        let mut tree = load(SAMPLE);
        let before_source = tree.source().to_string();
        let before_ids: Vec<String> = tree.metadata_map.keys().cloned().collect();

        let f = id_of_name(&tree, "f");
        let ops = vec![
            TreeOperation::Replace {
                node_id: f,
                code: CodeInput::from_str("def f(self):\n    return 2\n"),
            },
            TreeOperation::Replace {
                node_id: "does:not:exist:1:1-1:1".into(),
                code: CodeInput::from_str("x"),
            },
        ];
        let err = modify_tree(&mut tree, &ops).unwrap_err();
        assert!(matches!(
            err,
            Error::Client(ClientError::NodeNotFound { .. })
        ));
        assert_eq!(tree.source(), before_source);
        let after_ids: Vec<String> = tree.metadata_map.keys().cloned().collect();
        assert_eq!(before_ids, after_ids);
    }

    #[test]
    fn node_not_found_lists_live_ids() {
        let mut tree = load(SAMPLE);
        let err = modify_tree(
            &mut tree,
            &[TreeOperation::Delete {
                node_id: "missing".into(),
            }],
        )
        .unwrap_err();
        match err {
            Error::Client(ClientError::NodeNotFound { available, .. }) => {
                assert!(!available.is_empty())
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn replace_range_of_two_statements() {
        let mut tree = load("a = 1\nb = 2\nc = 3\n");
        let ids: Vec<String> = tree
            .metadata_map
            .values()
            .filter(|m| m.node_type == "SimpleStatementLine")
            .map(|m| m.node_id.clone())
            .collect();
        assert_eq!(ids.len(), 3);
        let op = TreeOperation::ReplaceRange {
            start_node_id: ids[0].clone(),
            end_node_id: ids[1].clone(),
            code: CodeInput::from_str("x = 1\n"),
        };
        modify_tree(&mut tree, &[op]).unwrap();
        assert_eq!(tree.source(), "x = 1\nc = 3\n");
    }

    #[test]
    fn replace_range_with_equal_endpoints_matches_replace() {
        let source = "a = 1\nb = 2\n";
        let mut by_range = load(source);
        let mut by_replace = load(source);
        let first = by_range
            .metadata_map
            .values()
            .find(|m| m.node_type == "SimpleStatementLine")
            .unwrap()
            .node_id
            .clone();

        modify_tree(
            &mut by_range,
            &[TreeOperation::ReplaceRange {
                start_node_id: first.clone(),
                end_node_id: first.clone(),
                code: CodeInput::from_str("a = 10\n"),
            }],
        )
        .unwrap();
        modify_tree(
            &mut by_replace,
            &[TreeOperation::Replace {
                node_id: first,
                code: CodeInput::from_str("a = 10\n"),
            }],
        )
        .unwrap();
        assert_eq!(by_range.source(), by_replace.source());
        assert_eq!(by_range.source(), "a = 10\nb = 2\n");
    }

    #[test]
    fn insert_before_target_at_module_level() {
        let mut tree = load("def f(): pass\n");
        let f = id_of_name(&tree, "f");
        let op = TreeOperation::Insert {
            parent_node_id: None,
            target_node_id: Some(f),
            position: InsertPosition::Before,
            code: CodeInput::from_str("import os"),
        };
        modify_tree(&mut tree, &[op]).unwrap();
        assert_eq!(tree.source(), "import os\ndef f(): pass\n");
    }

    #[test]
    fn insert_after_target_inside_block_keeps_indentation() {
        let mut tree = load(SAMPLE);
        let ret = id_of(&tree, "Return");
        let op = TreeOperation::Insert {
            parent_node_id: None,
            target_node_id: Some(ret),
            position: InsertPosition::After,
            code: CodeInput::from_str("x = 1"),
        };
        modify_tree(&mut tree, &[op]).unwrap();
        assert_eq!(
            tree.source(),
            "class A:\n    def f(self):\n        return 1\n        x = 1\n"
        );
    }

    #[test]
    fn insert_into_empty_module_before_equals_after() {
        let mut before = load("");
        let mut after = load("");
        let module_before = id_of(&before, "Module");
        let module_after = id_of(&after, "Module");
        modify_tree(
            &mut before,
            &[TreeOperation::Insert {
                parent_node_id: Some(module_before),
                target_node_id: None,
                position: InsertPosition::Before,
                code: CodeInput::from_str("import os"),
            }],
        )
        .unwrap();
        modify_tree(
            &mut after,
            &[TreeOperation::Insert {
                parent_node_id: Some(module_after),
                target_node_id: None,
                position: InsertPosition::After,
                code: CodeInput::from_str("import os"),
            }],
        )
        .unwrap();
        assert_eq!(before.source(), after.source());
        assert_eq!(before.source(), "import os\n");
    }

    #[test]
    fn insert_into_function_body_start_and_end() {
        let mut tree = load("def g():\n    a = 1\n    b = 2\n");
        let g = id_of_name(&tree, "g");
        modify_tree(
            &mut tree,
            &[TreeOperation::Insert {
                parent_node_id: Some(g.clone()),
                target_node_id: None,
                position: InsertPosition::Before,
                code: CodeInput::from_str("first = True"),
            }],
        )
        .unwrap();
        assert_eq!(
            tree.source(),
            "def g():\n    first = True\n    a = 1\n    b = 2\n"
        );

        let g = id_of_name(&tree, "g");
        modify_tree(
            &mut tree,
            &[TreeOperation::Insert {
                parent_node_id: Some(g),
                target_node_id: None,
                position: InsertPosition::After,
                code: CodeInput::from_str("last = True"),
            }],
        )
        .unwrap();
        assert_eq!(
            tree.source(),
            "def g():\n    first = True\n    a = 1\n    b = 2\n    last = True\n"
        );
    }

    #[test]
    fn insert_requires_exactly_one_anchor() {
        let mut tree = load(SAMPLE);
        let f = id_of_name(&tree, "f");
        let err = modify_tree(
            &mut tree,
            &[TreeOperation::Insert {
                parent_node_id: Some(f.clone()),
                target_node_id: Some(f),
                position: InsertPosition::Before,
                code: CodeInput::from_str("x = 1"),
            }],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Client(ClientError::InvalidInsertTarget { .. })
        ));

        let err = modify_tree(
            &mut tree,
            &[TreeOperation::Insert {
                parent_node_id: None,
                target_node_id: None,
                position: InsertPosition::Before,
                code: CodeInput::from_str("x = 1"),
            }],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Client(ClientError::InvalidInsertTarget { .. })
        ));
    }

    #[test]
    fn delete_sole_block_statement_leaves_parseable_block() {
        let mut tree = load(SAMPLE);
        let ret = id_of(&tree, "Return");
        modify_tree(&mut tree, &[TreeOperation::Delete { node_id: ret }]).unwrap();
        assert_eq!(tree.source(), "class A:\n    def f(self):\n        pass\n");
    }

    #[test]
    fn delete_sole_module_statement_leaves_empty_module() {
        let mut tree = load("x = 1\n");
        let stmt = id_of(&tree, "SimpleStatementLine");
        modify_tree(&mut tree, &[TreeOperation::Delete { node_id: stmt }]).unwrap();
        assert_eq!(tree.source(), "");
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn empty_replace_code_means_delete() {
        let mut tree = load("x = 1\ny = 2\n");
        let first = id_of(&tree, "SimpleStatementLine");
        modify_tree(
            &mut tree,
            &[TreeOperation::Replace {
                node_id: first,
                code: CodeInput::from_str(""),
            }],
        )
        .unwrap();
        assert_eq!(tree.source(), "y = 2\n");
    }

    #[test]
    fn empty_batch_is_identity() {
        let mut tree = load(SAMPLE);
        let before: Vec<String> = tree.metadata_map.keys().cloned().collect();
        let outcome = modify_tree(&mut tree, &[]).unwrap();
        assert_eq!(outcome.operations_applied, 0);
        let after: Vec<String> = tree.metadata_map.keys().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn range_endpoints_must_share_a_parent() {
        let mut tree = load(SAMPLE);
        let class = id_of(&tree, "ClassDef");
        let ret = id_of(&tree, "Return");
        let err = modify_tree(
            &mut tree,
            &[TreeOperation::ReplaceRange {
                start_node_id: class,
                end_node_id: ret,
                code: CodeInput::from_str("x = 1\n"),
            }],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Client(ClientError::InvalidRangeEndpoints { .. })
        ));
    }

    #[test]
    fn range_endpoints_must_be_in_document_order() {
        let mut tree = load("a = 1\nb = 2\n");
        let ids: Vec<String> = tree
            .metadata_map
            .values()
            .filter(|m| m.node_type == "SimpleStatementLine")
            .map(|m| m.node_id.clone())
            .collect();
        let err = modify_tree(
            &mut tree,
            &[TreeOperation::ReplaceRange {
                start_node_id: ids[1].clone(),
                end_node_id: ids[0].clone(),
                code: CodeInput::from_str("x = 1\n"),
            }],
        )
        .unwrap_err();
        match err {
            Error::Client(ClientError::InvalidRangeEndpoints { reason, .. }) => {
                assert!(reason.contains("after"), "{reason}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nested_expression_is_not_replaceable() {
        let mut tree = load(SAMPLE);
        // The identifier `self` is buried inside the parameter list.
        let name = tree
            .metadata_map
            .values()
            .find(|m| m.node_type == "Name" && m.name.as_deref() == Some("self"))
            .unwrap()
            .node_id
            .clone();
        let err = modify_tree(
            &mut tree,
            &[TreeOperation::Replace {
                node_id: name,
                code: CodeInput::from_str("other"),
            }],
        )
        .unwrap_err();
        match err {
            Error::Client(ClientError::NotReplaceable { hint, .. }) => {
                assert!(hint.contains("replace_range"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_snippet_fails_before_any_mutation() {
        let mut tree = load(SAMPLE);
        let before = tree.source().to_string();
        let f = id_of_name(&tree, "f");
        let err = modify_tree(
            &mut tree,
            &[TreeOperation::Replace {
                node_id: f,
                code: CodeInput::from_str("def ((("),
            }],
        )
        .unwrap_err();
        match err {
            Error::Client(ClientError::InvalidCode { message }) => {
                assert!(message.contains("operation 1"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(tree.source(), before);
    }

    #[test]
    fn post_validation_discards_a_working_copy_that_breaks_the_module() {
        // Deleting the inline body of `def f(): pass` removes exact bytes
        // and leaves `def f(): `, which no longer parses.
        let mut tree = load("def f(): pass\n");
        let before = tree.source().to_string();
        let pass = id_of(&tree, "Pass");
        let err = modify_tree(&mut tree, &[TreeOperation::Delete { node_id: pass }]).unwrap_err();
        match err {
            Error::Client(ClientError::InvalidModule { message }) => {
                assert!(message.contains("after applying"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(tree.source(), before);
    }

    #[test]
    fn multi_statement_replace_splices_at_the_block() {
        let mut tree = load(SAMPLE);
        let ret = id_of(&tree, "Return");
        modify_tree(
            &mut tree,
            &[TreeOperation::Replace {
                node_id: ret,
                code: CodeInput::from_str("x = 1\nreturn x"),
            }],
        )
        .unwrap();
        assert_eq!(
            tree.source(),
            "class A:\n    def f(self):\n        x = 1\n        return x\n"
        );
    }

    #[test]
    fn node_ids_refresh_after_mutation() {
        let mut tree = load(SAMPLE);
        let ret = id_of(&tree, "Return");
        modify_tree(
            &mut tree,
            &[TreeOperation::Replace {
                node_id: ret.clone(),
                code: CodeInput::from_str("return 2"),
            }],
        )
        .unwrap();
        // The old id pointed at `return 1` and no longer resolves.
        assert!(tree.resolve(&ret).is_err());
        assert!(tree
            .metadata_map
            .values()
            .any(|m| m.node_type == "Return" && tree.node_code(&m.node_id) == Some("return 2")));
    }
}
