//! Workspace-wide error type, severity classification, and the mapping onto
//! the stable wire codes.
//!
//! A single [`Error`] is shared across crates. It delegates transparently
//! to three error families — one per error class: client, integrity,
//! operational — each owned by its own module. Library crates construct
//! family variants and convert with `?`/`into`; the gateway is the only
//! place that turns an [`Error`] into a wire envelope. Emission (logging)
//! is left to the application boundary.

pub mod client;
pub mod integrity;
pub mod operational;
pub mod severity;

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use sylva_core::{ErrorCode, HandlerOutcome};

pub use client::ClientError;
pub use integrity::IntegrityError;
pub use operational::OperationalError;
pub use severity::Severity;

/// Workspace-wide result alias used by all crates in the project.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type shared across the sylva workspace.
///
/// Variants group failures into the three classes the boundary handles
/// uniformly; each family carries enough structure for the caller to
/// recover (node ids in scope, selector offsets, marker paths).
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error(transparent)]
    Operational(#[from] OperationalError),
}

impl Error {
    pub fn file_op(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::Operational(OperationalError::FileOp {
            operation,
            path: path.into(),
            source: Arc::new(source),
        })
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Operational(OperationalError::Internal {
            message: message.into(),
        })
    }

    /// Coarse severity, used to pick logging levels at the boundary.
    pub fn severity(&self) -> Severity {
        match self {
            Error::Client(_) => Severity::Warning,
            Error::Integrity(_) => Severity::Fatal,
            Error::Operational(_) => Severity::Error,
        }
    }

    /// Stable wire code for this error (§ error codes).
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            Error::Client(e) => e.wire_code(),
            Error::Integrity(e) => e.wire_code(),
            Error::Operational(e) => e.wire_code(),
        }
    }

    /// Structured recovery payload placed in the error envelope's `details`.
    pub fn details(&self) -> Option<Value> {
        match self {
            Error::Client(e) => e.details(),
            Error::Integrity(e) => e.details(),
            Error::Operational(_) => None,
        }
    }

    /// Fold this error into the handler envelope shape.
    pub fn to_outcome(&self) -> HandlerOutcome {
        HandlerOutcome::error(self.wire_code(), self.to_string(), self.details())
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::file_op("io", PathBuf::new(), source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_carries_the_allow_list() {
        let err = Error::from(IntegrityError::Corrupted {
            message: "quick_check failed".into(),
            marker_path: PathBuf::from("/tmp/store.db.corrupt.json"),
            backup_paths: vec![PathBuf::from("/tmp/backups/store.db.1")],
        });
        assert_eq!(err.wire_code(), ErrorCode::DatabaseError);
        assert_eq!(err.severity(), Severity::Fatal);
        let details = err.details().unwrap();
        assert_eq!(details["marker_path"], "/tmp/store.db.corrupt.json");
        assert!(details["allowed_commands"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c == "get_corruption_status"));
    }

    #[test]
    fn node_not_found_suggests_live_ids() {
        let err = Error::from(ClientError::NodeNotFound {
            node_id: "stale".into(),
            available: vec!["a".into(), "b".into()],
        });
        assert_eq!(err.wire_code(), ErrorCode::NotFound);
        let details = err.details().unwrap();
        assert_eq!(details["available_nodes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn family_display_is_transparent() {
        let err = Error::from(ClientError::InvalidSelector {
            offset: 7,
            message: "unknown kind".into(),
        });
        assert_eq!(err.to_string(), "invalid selector at byte 7: unknown kind");
        assert_eq!(err.severity(), Severity::Warning);
    }
}
