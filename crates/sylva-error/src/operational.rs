//! Operational errors: I/O, storage, and transport failures. These are
//! retried only when idempotent and bounded, otherwise rolled back and
//! reported.

use std::path::PathBuf;
use std::sync::Arc;

use sylva_core::ErrorCode;

#[derive(Debug, Clone, thiserror::Error)]
pub enum OperationalError {
    #[error("database error: {message}")]
    Db { message: String },

    #[error("transaction error: {message}")]
    Transaction { message: String },

    #[error("schema error: {message}")]
    Schema { message: String },

    #[error("file operation {operation} failed for {path}: {source}")]
    FileOp {
        operation: &'static str,
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("connection error: {message}")]
    Connection { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl OperationalError {
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            OperationalError::Db { .. } => ErrorCode::DatabaseError,
            OperationalError::Transaction { .. } => ErrorCode::TransactionError,
            OperationalError::Schema { .. } => ErrorCode::SchemaError,
            OperationalError::Timeout { .. } => ErrorCode::Timeout,
            OperationalError::Connection { .. } => ErrorCode::ConnectionError,
            OperationalError::FileOp { .. } | OperationalError::Internal { .. } => {
                ErrorCode::InternalError
            }
        }
    }
}
