//! The in-memory CST value: source text, parsed tree, and the three node
//! maps (records, metadata, parents) in document order.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use sylva_core::NodeMetadata;
use sylva_error::{ClientError, Error, Result};
use tree_sitter::{Node, Tree};
use uuid::Uuid;

use crate::index;
use crate::parser;

/// Byte-range handle for one indexed node. Together with the source text
/// this is enough to re-locate the node and compute every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    pub start_byte: usize,
    pub end_byte: usize,
    pub ts_kind: &'static str,
}

/// Inclusion options used when building the node index. A tree remembers
/// the options it was loaded with and reuses them on every rebuild.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Restrict indexing to these structural types (case-insensitive).
    pub node_types: Option<Vec<String>>,
    /// Cap recursion depth; nodes below the cap are not indexed.
    pub max_depth: Option<usize>,
    /// Omit `children_ids` from metadata when false.
    pub include_children: bool,
}

impl IndexOptions {
    pub fn all() -> Self {
        Self {
            node_types: None,
            max_depth: None,
            include_children: true,
        }
    }
}

/// An in-memory concrete syntax tree for one file.
///
/// Trees live only in the server process; clients receive metadata. The
/// source text is the unparse, so saving a tree writes exactly the bytes
/// held here.
#[derive(Debug)]
pub struct CstTree {
    pub tree_id: Uuid,
    pub file_path: PathBuf,
    source: String,
    tree: Tree,
    options: IndexOptions,
    pub node_map: IndexMap<String, NodeRecord>,
    pub metadata_map: IndexMap<String, NodeMetadata>,
    pub parent_map: IndexMap<String, Option<String>>,
}

impl CstTree {
    /// Parse `source` and build the node index.
    pub fn from_source(
        file_path: impl Into<PathBuf>,
        source: String,
        options: IndexOptions,
    ) -> Result<Self> {
        let tree = parser::parse_module_strict(&source)?;
        let mut cst = Self {
            tree_id: Uuid::new_v4(),
            file_path: file_path.into(),
            source,
            tree,
            options,
            node_map: IndexMap::new(),
            metadata_map: IndexMap::new(),
            parent_map: IndexMap::new(),
        };
        cst.rebuild_index();
        Ok(cst)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Unparse: for a formatting-preserving CST this is the source text.
    pub fn unparse(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn node_count(&self) -> usize {
        self.metadata_map.len()
    }

    pub fn metadata(&self, node_id: &str) -> Option<&NodeMetadata> {
        self.metadata_map.get(node_id)
    }

    pub fn record(&self, node_id: &str) -> Option<&NodeRecord> {
        self.node_map.get(node_id)
    }

    /// Source slice covered by a node.
    pub fn node_code(&self, node_id: &str) -> Option<&str> {
        let record = self.node_map.get(node_id)?;
        self.source.get(record.start_byte..record.end_byte)
    }

    /// Resolve a node id, failing with a hint listing live ids.
    pub fn resolve(&self, node_id: &str) -> Result<(&NodeRecord, &NodeMetadata)> {
        match (self.node_map.get(node_id), self.metadata_map.get(node_id)) {
            (Some(record), Some(meta)) => Ok((record, meta)),
            _ => Err(ClientError::NodeNotFound {
                node_id: node_id.to_string(),
                available: self.first_node_ids(5),
            }
            .into()),
        }
    }

    pub fn parent_id(&self, node_id: &str) -> Option<&String> {
        self.parent_map.get(node_id).and_then(|p| p.as_ref())
    }

    /// Ids of the direct children of `node_id`, in document order. Derived
    /// from the parent map so it works even when `children_ids` was omitted.
    pub fn children_of(&self, node_id: &str) -> Vec<&String> {
        self.parent_map
            .iter()
            .filter(|(_, parent)| parent.as_deref() == Some(node_id))
            .map(|(id, _)| id)
            .collect()
    }

    /// True when `ancestor_id` appears on the parent chain of `node_id`.
    pub fn is_descendant_of(&self, node_id: &str, ancestor_id: &str) -> bool {
        let mut current = self.parent_id(node_id);
        while let Some(parent) = current {
            if parent == ancestor_id {
                return true;
            }
            current = self.parent_id(parent);
        }
        false
    }

    pub fn first_node_ids(&self, n: usize) -> Vec<String> {
        self.metadata_map.keys().take(n).cloned().collect()
    }

    /// Swap in a new module and rebuild the index with the original
    /// inclusion options. All prior node ids become invalid.
    pub fn replace_module(&mut self, source: String, tree: Tree) {
        self.source = source;
        self.tree = tree;
        self.rebuild_index();
    }

    /// Re-read the file this tree came from and rebuild in place, keeping
    /// the same `tree_id` so existing references stay valid.
    pub fn reload_from_disk(&mut self) -> Result<()> {
        let source = read_python_source(&self.file_path)?;
        self.reload_from_source(source)
    }

    pub fn reload_from_source(&mut self, source: String) -> Result<()> {
        let tree = parser::parse_module_strict(&source)?;
        self.replace_module(source, tree);
        Ok(())
    }

    fn rebuild_index(&mut self) {
        let built = index::build_index(&self.source, &self.tree, &self.options);
        self.node_map = built.node_map;
        self.metadata_map = built.metadata_map;
        self.parent_map = built.parent_map;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# leading comment\nclass A:\n    def f(self):  # trailing\n        return 1\n\n\nx = 1\n";

    #[test]
    fn unparse_preserves_formatting_and_comments() {
        let tree =
            CstTree::from_source("/tmp/t.py", SAMPLE.to_string(), IndexOptions::all()).unwrap();
        assert_eq!(tree.unparse(), SAMPLE);
        // Re-parsing the unparse is stable.
        crate::parser::check_module(tree.unparse()).unwrap();
    }

    #[test]
    fn resolve_failure_names_live_ids() {
        let tree =
            CstTree::from_source("/tmp/t.py", SAMPLE.to_string(), IndexOptions::all()).unwrap();
        let err = tree.resolve("nope").unwrap_err();
        match err {
            Error::Client(ClientError::NodeNotFound { available, .. }) => {
                assert!(!available.is_empty());
                assert!(available.len() <= 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn descendant_chain_follows_parent_map() {
        let tree =
            CstTree::from_source("/tmp/t.py", SAMPLE.to_string(), IndexOptions::all()).unwrap();
        let module_id = tree.metadata_map.keys().next().unwrap().clone();
        let ret = tree
            .metadata_map
            .values()
            .find(|m| m.node_type == "Return")
            .unwrap()
            .node_id
            .clone();
        assert!(tree.is_descendant_of(&ret, &module_id));
        assert!(!tree.is_descendant_of(&module_id, &ret));
    }

    #[test]
    fn reload_from_source_invalidates_old_ids() {
        let mut tree =
            CstTree::from_source("/tmp/t.py", "x = 1\n".to_string(), IndexOptions::all()).unwrap();
        let old_ids: Vec<String> = tree.metadata_map.keys().cloned().collect();
        tree.reload_from_source("y = 2\nz = 3\n".to_string()).unwrap();
        assert_ne!(
            old_ids,
            tree.metadata_map.keys().cloned().collect::<Vec<_>>()
        );
        assert_eq!(tree.source(), "y = 2\nz = 3\n");
    }
}

/// Read a source file, enforcing the `.py` extension the index understands.
pub fn read_python_source(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ClientError::NotFound {
            what: "file",
            key: path.display().to_string(),
        }
        .into());
    }
    if path.extension().and_then(|e| e.to_str()) != Some("py") {
        return Err(ClientError::Validation {
            message: format!("file must be a Python file (.py): {}", path.display()),
        }
        .into());
    }
    std::fs::read_to_string(path).map_err(|e| Error::file_op("read", path, e))
}
