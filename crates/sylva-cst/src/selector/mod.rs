//! The selector mini-language: a compact, XPath-like notation evaluated
//! over node metadata.
//!
//! Grammar (and nothing more — unknown syntax fails, it is never guessed):
//!
//! ```text
//! selector   = step (combinator step)*
//! combinator = ">"            direct child
//!            | whitespace     descendant
//! step       = ("*" | kind) attribute* pseudo*
//! attribute  = "[" ("name" | "qualname" | "type") "=" quoted "]"
//! pseudo     = ":first" | ":last" | ":nth(" digits ")"
//! ```

mod eval;
mod parse;

pub use eval::{evaluate, query_tree, simple_search, SimpleFilters};
pub use parse::parse_selector;

use sylva_core::NodeKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub combinator: Combinator,
    pub kind: KindSelector,
    pub attributes: Vec<Attribute>,
    pub pseudos: Vec<Pseudo>,
}

/// Relationship to the previous step's matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// First step: matched anywhere in the tree.
    Root,
    /// Whitespace: anywhere in the subtree of a previous match.
    Descendant,
    /// `>`: a direct child of a previous match.
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindSelector {
    Any,
    Kind(NodeKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub field: AttrField,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrField {
    Name,
    Qualname,
    Type,
}

/// Positional filters, applied to the ordered result set at their level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    First,
    Last,
    /// 1-based index.
    Nth(usize),
}
