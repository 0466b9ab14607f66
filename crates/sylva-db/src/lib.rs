//! Row store facade and integrity gate.
//!
//! A single sqlite store file per project, in WAL mode, accessed only
//! through a pinned writer thread that serves a request queue. All reads
//! and writes on one store are linearized by that thread; transactions are
//! explicit `begin`/`commit`/`rollback` with a single active transaction at
//! a time.
//!
//! The integrity gate wraps every store-touching operation: while a
//! corruption marker sidecar exists next to the store, everything except an
//! explicit allow-list short-circuits to the same frozen error.

pub mod entity;
pub mod error;
pub mod integrity;
pub mod schema;
pub mod store;

pub use entity::Entity;
pub use error::DbError;
pub use integrity::{marker_path, CorruptionMarker, IntegrityGate, NoWorkers, WorkerControl};
pub use store::{FileRow, StoreHandle};
