//! Selector evaluation over the node index.
//!
//! Matching walks the metadata in document order. A combinator restricts
//! the next step to the subtree (or direct children) of the previous
//! matches; pseudo-classes are applied to the ordered candidate list at
//! their own level before the next step runs.

use sylva_core::NodeMetadata;
use sylva_error::Result;

use super::{parse_selector, Attribute, AttrField, Combinator, KindSelector, Pseudo, Selector, Step};
use crate::tree::CstTree;

/// Evaluate a selector string against a tree.
pub fn query_tree(tree: &CstTree, selector: &str) -> Result<Vec<NodeMetadata>> {
    let selector = parse_selector(selector)?;
    Ok(evaluate(tree, &selector))
}

pub fn evaluate(tree: &CstTree, selector: &Selector) -> Vec<NodeMetadata> {
    let mut context: Option<Vec<String>> = None;

    for step in &selector.steps {
        let mut candidates: Vec<&NodeMetadata> = tree
            .metadata_map
            .values()
            .filter(|meta| step_matches(step, meta))
            .filter(|meta| in_context(tree, step.combinator, context.as_deref(), &meta.node_id))
            .collect();

        for pseudo in &step.pseudos {
            candidates = apply_pseudo(*pseudo, candidates);
        }

        if candidates.is_empty() {
            return Vec::new();
        }
        context = Some(candidates.iter().map(|m| m.node_id.clone()).collect());
    }

    let ids = context.unwrap_or_default();
    ids.iter()
        .filter_map(|id| tree.metadata_map.get(id))
        .cloned()
        .collect()
}

fn step_matches(step: &Step, meta: &NodeMetadata) -> bool {
    match step.kind {
        KindSelector::Any => {}
        KindSelector::Kind(kind) => {
            if meta.kind != kind {
                return false;
            }
        }
    }
    step.attributes.iter().all(|attr| attr_matches(attr, meta))
}

fn attr_matches(attr: &Attribute, meta: &NodeMetadata) -> bool {
    match attr.field {
        AttrField::Name => meta.name.as_deref() == Some(attr.value.as_str()),
        AttrField::Qualname => meta.qualname.as_deref() == Some(attr.value.as_str()),
        AttrField::Type => meta.node_type == attr.value,
    }
}

fn in_context(
    tree: &CstTree,
    combinator: Combinator,
    context: Option<&[String]>,
    node_id: &str,
) -> bool {
    let Some(context) = context else {
        return true;
    };
    match combinator {
        Combinator::Root => true,
        Combinator::Descendant => context
            .iter()
            .any(|ancestor| tree.is_descendant_of(node_id, ancestor)),
        Combinator::Child => {
            let parent = tree.parent_id(node_id);
            context.iter().any(|c| parent.map(String::as_str) == Some(c))
        }
    }
}

fn apply_pseudo<'a>(
    pseudo: Pseudo,
    candidates: Vec<&'a NodeMetadata>,
) -> Vec<&'a NodeMetadata> {
    match pseudo {
        Pseudo::First => candidates.into_iter().take(1).collect(),
        Pseudo::Last => {
            let len = candidates.len();
            candidates.into_iter().skip(len.saturating_sub(1)).collect()
        }
        Pseudo::Nth(n) => candidates
            .into_iter()
            .skip(n - 1)
            .take(1)
            .collect(),
    }
}

/// Simple search: independent optional filters combined with AND. Returns
/// the same metadata shape as selector queries.
#[derive(Debug, Clone, Default)]
pub struct SimpleFilters {
    pub node_type: Option<String>,
    pub name: Option<String>,
    pub qualname: Option<String>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
}

pub fn simple_search(tree: &CstTree, filters: &SimpleFilters) -> Vec<NodeMetadata> {
    tree.metadata_map
        .values()
        .filter(|m| {
            filters
                .node_type
                .as_deref()
                .is_none_or(|t| m.node_type == t)
        })
        .filter(|m| filters.name.as_deref().is_none_or(|n| m.name.as_deref() == Some(n)))
        .filter(|m| {
            filters
                .qualname
                .as_deref()
                .is_none_or(|q| m.qualname.as_deref() == Some(q))
        })
        .filter(|m| filters.start_line.is_none_or(|l| m.span.start_line >= l))
        .filter(|m| filters.end_line.is_none_or(|l| m.span.end_line <= l))
        .cloned()
        .collect()
}
