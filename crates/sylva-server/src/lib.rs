//! The RPC gateway: length-framed JSON-RPC 2.0 over a Unix domain socket,
//! a single method table, and the handlers behind it.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod framing;
pub mod gateway;
pub mod handlers;

pub use config::ServerConfig;
pub use context::ServerContext;
pub use gateway::Gateway;
