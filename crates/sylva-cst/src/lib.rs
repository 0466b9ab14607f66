//! Concrete syntax trees for Python source, with a stable node index, an
//! XPath-like selector engine, atomic batch mutation, and a process-wide
//! tree registry.
//!
//! The CST here is the pair (source text, tree-sitter tree): the source text
//! *is* the unparse, so whitespace and comments survive every round trip.
//! Mutations are computed as byte-range splices against the current text,
//! applied all-or-nothing, and followed by a full re-parse and index rebuild.

pub mod facts;
pub mod index;
pub mod mutate;
pub mod parser;
pub mod range;
pub mod registry;
pub mod selector;
pub mod tree;

pub use facts::collect_file_facts;
pub use mutate::{modify_tree, ModifyOutcome};
pub use parser::{check_module, parse_module, parse_snippet, Snippet};
pub use range::{find_covering, find_intersecting};
pub use registry::TreeRegistry;
pub use selector::{parse_selector, query_tree, simple_search, Selector, SimpleFilters};
pub use tree::{CstTree, IndexOptions, NodeRecord};
