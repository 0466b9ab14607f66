//! Process-wide registry of live trees, keyed by `tree_id`.
//!
//! The registry is a bounded cache, not durable state: trees are created by
//! load, dropped by remove or process exit. Each tree is wrapped in its own
//! async mutex so operations on the same tree are totally ordered while
//! different trees progress in parallel.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use sylva_error::{ClientError, Error, Result};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::tree::{read_python_source, CstTree, IndexOptions};

#[derive(Debug, Default)]
pub struct TreeRegistry {
    trees: DashMap<Uuid, Arc<Mutex<CstTree>>>,
}

impl TreeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a file into a new tree and register it.
    pub fn load_file(&self, path: &Path, options: IndexOptions) -> Result<Arc<Mutex<CstTree>>> {
        let canonical = path
            .canonicalize()
            .map_err(|e| Error::file_op("canonicalize", path, e))?;
        let source = read_python_source(&canonical)?;
        let tree = CstTree::from_source(canonical, source, options)?;
        let tree_id = tree.tree_id;
        let entry = Arc::new(Mutex::new(tree));
        self.trees.insert(tree_id, Arc::clone(&entry));
        tracing::debug!(%tree_id, "loaded tree");
        Ok(entry)
    }

    pub fn get(&self, tree_id: Uuid) -> Result<Arc<Mutex<CstTree>>> {
        self.trees
            .get(&tree_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ClientError::TreeNotFound { tree_id }.into())
    }

    /// Evict a tree. Returns false when the id was not present.
    pub fn remove(&self, tree_id: Uuid) -> bool {
        let removed = self.trees.remove(&tree_id).is_some();
        if removed {
            tracing::debug!(%tree_id, "removed tree");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}
