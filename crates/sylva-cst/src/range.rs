//! Line-range lookups over the node index.

use sylva_core::NodeMetadata;
use sylva_error::{ClientError, Result};

use crate::tree::CstTree;

/// Find the node that covers `[start_line, end_line]`.
///
/// Covering means `node.start_line <= start_line <= end_line <= node.end_line`.
/// With `prefer_exact`, an exact line match wins; otherwise the covering node
/// with the smallest line span is returned, ties broken by earliest start.
pub fn find_covering(
    tree: &CstTree,
    start_line: u32,
    end_line: u32,
    prefer_exact: bool,
) -> Result<Option<NodeMetadata>> {
    check_range(start_line, end_line)?;

    let candidates: Vec<&NodeMetadata> = tree
        .metadata_map
        .values()
        .filter(|m| m.span.covers_lines(start_line, end_line))
        .collect();

    if candidates.is_empty() {
        return Ok(None);
    }

    if prefer_exact {
        if let Some(exact) = candidates
            .iter()
            .find(|m| m.span.start_line == start_line && m.span.end_line == end_line)
        {
            return Ok(Some((*exact).clone()));
        }
    }

    let best = candidates
        .into_iter()
        .min_by_key(|m| (m.span.end_line - m.span.start_line, m.span.start_line));
    Ok(best.cloned())
}

/// All nodes whose line span intersects `[start_line, end_line]`, sorted by
/// start line then end line.
pub fn find_intersecting(
    tree: &CstTree,
    start_line: u32,
    end_line: u32,
) -> Result<Vec<NodeMetadata>> {
    check_range(start_line, end_line)?;

    let mut result: Vec<NodeMetadata> = tree
        .metadata_map
        .values()
        .filter(|m| m.span.intersects_lines(start_line, end_line))
        .cloned()
        .collect();
    result.sort_by_key(|m| (m.span.start_line, m.span.end_line));
    Ok(result)
}

fn check_range(start_line: u32, end_line: u32) -> Result<()> {
    if start_line > end_line {
        return Err(ClientError::Validation {
            message: format!("invalid range: start_line ({start_line}) > end_line ({end_line})"),
        }
        .into());
    }
    Ok(())
}
