//! Integrity errors: the store is frozen and only the recovery allow-list
//! remains legal until the corruption marker is cleared.

use std::path::PathBuf;

use serde_json::{json, Value};
use sylva_core::{ErrorCode, ALLOWED_WHEN_CORRUPTED};

#[derive(Debug, Clone, thiserror::Error)]
pub enum IntegrityError {
    #[error("store is corrupted and the project is frozen: {message}")]
    Corrupted {
        message: String,
        marker_path: PathBuf,
        backup_paths: Vec<PathBuf>,
    },
}

impl IntegrityError {
    pub fn wire_code(&self) -> ErrorCode {
        ErrorCode::DatabaseError
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            IntegrityError::Corrupted {
                marker_path,
                backup_paths,
                ..
            } => Some(json!({
                "operation": "database_corrupted",
                "marker_path": marker_path,
                "backup_paths": backup_paths,
                "allowed_commands": ALLOWED_WHEN_CORRUPTED,
            })),
        }
    }
}
