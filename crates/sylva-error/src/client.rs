//! Client errors: the request itself was wrong. State is never touched and
//! the caller can retry with corrected input.

use serde_json::{json, Value};
use sylva_core::ErrorCode;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("tree not found: {tree_id}")]
    TreeNotFound { tree_id: uuid::Uuid },

    #[error("node not found: {node_id}")]
    NodeNotFound {
        node_id: String,
        /// First few ids still present in the index, as a recovery hint.
        available: Vec<String>,
    },

    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    #[error("node is not directly replaceable: {node_id}")]
    NotReplaceable { node_id: String, hint: String },

    #[error("invalid code: {message}")]
    InvalidCode { message: String },

    #[error("invalid range endpoints: {reason}")]
    InvalidRangeEndpoints {
        start_node_id: String,
        end_node_id: String,
        reason: String,
    },

    #[error("invalid insert target: {message}")]
    InvalidInsertTarget { message: String },

    #[error("module does not parse: {message}")]
    InvalidModule { message: String },

    #[error("invalid selector at byte {offset}: {message}")]
    InvalidSelector { offset: usize, message: String },

    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },
}

impl ClientError {
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            ClientError::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            ClientError::TreeNotFound { .. }
            | ClientError::NodeNotFound { .. }
            | ClientError::NotFound { .. } => ErrorCode::NotFound,
            ClientError::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            ClientError::NotReplaceable { .. }
            | ClientError::InvalidCode { .. }
            | ClientError::InvalidRangeEndpoints { .. }
            | ClientError::InvalidInsertTarget { .. }
            | ClientError::InvalidModule { .. }
            | ClientError::InvalidSelector { .. }
            | ClientError::Validation { .. } => ErrorCode::ValidationError,
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            ClientError::NodeNotFound { node_id, available } => Some(json!({
                "node_id": node_id,
                "available_nodes": available,
            })),
            ClientError::NotReplaceable { node_id, hint } => Some(json!({
                "node_id": node_id,
                "hint": hint,
            })),
            ClientError::InvalidRangeEndpoints {
                start_node_id,
                end_node_id,
                ..
            } => Some(json!({
                "start_node_id": start_node_id,
                "end_node_id": end_node_id,
            })),
            ClientError::InvalidSelector { offset, .. } => Some(json!({ "offset": offset })),
            ClientError::TreeNotFound { tree_id } => {
                Some(json!({ "tree_id": tree_id.to_string() }))
            }
            _ => None,
        }
    }
}
