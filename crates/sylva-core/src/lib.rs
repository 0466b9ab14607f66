//! Core data types and constants for the sylva workspace.
//!
//! Everything here is plain data: node metadata, tree operations, the wire
//! error codes, and the JSON-RPC envelope shapes. No crate in the workspace
//! should need to invent its own spelling of these.

pub mod facts;
pub mod metadata;
pub mod ops;
pub mod rpc;
pub mod span;

pub use facts::{ClassFact, FileFacts, FunctionFact, ImportFact, MethodFact, UsageFact};
pub use metadata::{NodeKind, NodeMetadata};
pub use ops::{CodeInput, InsertPosition, TreeOperation};
pub use rpc::{ErrorCode, HandlerOutcome, RpcError, RpcRequest, RpcResponse, JSONRPC_VERSION};
pub use span::SpanRange;

/// Commands that remain legal while a corruption marker is present.
///
/// The integrity gate embeds this list in the frozen-store error so callers
/// can discover the recovery surface without a schema lookup.
pub const ALLOWED_WHEN_CORRUPTED: &[&str] = &[
    "get_status",
    "get_corruption_status",
    "backup_create",
    "backup_list",
    "backup_restore",
];
