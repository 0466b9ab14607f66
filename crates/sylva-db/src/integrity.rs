//! The integrity gate.
//!
//! On corruption the gate backs up the store file and its WAL/SHM sidecars,
//! writes a corruption-marker sidecar next to the store, asks the worker
//! manager to stop everything, and fails the current operation with an
//! error naming the marker, the backups, and the command allow-list. While
//! the marker exists every gated operation short-circuits to the same
//! frozen error; removing the marker is an explicit recovery step outside
//! this crate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sylva_error::{Error, IntegrityError, Result};

use crate::store::StoreHandle;

/// External collaborator told to stop all workers when the store freezes.
pub trait WorkerControl: Send + Sync {
    fn stop_all(&self);
}

/// Default collaborator for deployments without a worker manager.
#[derive(Debug, Default)]
pub struct NoWorkers;

impl WorkerControl for NoWorkers {
    fn stop_all(&self) {}
}

/// Marker sidecar written next to the store. Its presence is the sole
/// source of truth for the frozen state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorruptionMarker {
    pub message: String,
    pub backup_paths: Vec<PathBuf>,
    pub detected_at: String,
}

pub fn marker_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(".corrupt.json");
    PathBuf::from(name)
}

pub struct IntegrityGate {
    db_path: PathBuf,
    backup_dir: PathBuf,
    workers: Arc<dyn WorkerControl>,
}

impl IntegrityGate {
    pub fn new(db_path: &Path, backup_dir: &Path, workers: Arc<dyn WorkerControl>) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            backup_dir: backup_dir.to_path_buf(),
            workers,
        }
    }

    pub fn marker_path(&self) -> PathBuf {
        marker_path(&self.db_path)
    }

    pub fn read_marker(&self) -> Option<CorruptionMarker> {
        let content = std::fs::read_to_string(self.marker_path()).ok()?;
        match serde_json::from_str(&content) {
            Ok(marker) => Some(marker),
            Err(e) => {
                // An unreadable marker still freezes the store.
                tracing::error!("corruption marker is unreadable: {e}");
                Some(CorruptionMarker {
                    message: format!("corruption marker exists but is unreadable: {e}"),
                    backup_paths: Vec::new(),
                    detected_at: String::new(),
                })
            }
        }
    }

    /// Marker short-circuit: cheap enough to run before every gated
    /// operation, and the only I/O permitted while frozen.
    pub fn ensure_ready(&self) -> Result<()> {
        match self.read_marker() {
            None => Ok(()),
            Some(marker) => Err(IntegrityError::Corrupted {
                message: marker.message,
                marker_path: self.marker_path(),
                backup_paths: marker.backup_paths,
            }
            .into()),
        }
    }

    /// Full check: marker short-circuit plus a physical integrity check of
    /// the store. Detected corruption freezes the project.
    pub async fn check(&self, store: &StoreHandle) -> Result<()> {
        self.ensure_ready()?;
        match store.quick_check().await {
            Ok(()) => Ok(()),
            Err(crate::DbError::Corrupt(message)) => Err(self.freeze(&message)),
            Err(other) => Err(other.into()),
        }
    }

    /// Freeze the project: back up the store and sidecars, write the
    /// marker, stop workers, and return the frozen error.
    pub fn freeze(&self, message: &str) -> Error {
        tracing::error!("store corruption detected: {message}");
        let backup_paths = self.backup_sidecars();

        let marker = CorruptionMarker {
            message: message.to_string(),
            backup_paths: backup_paths.clone(),
            detected_at: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(e) = self.write_marker(&marker) {
            tracing::error!("failed to write corruption marker: {e}");
        }

        self.workers.stop_all();

        IntegrityError::Corrupted {
            message: message.to_string(),
            marker_path: self.marker_path(),
            backup_paths,
        }
        .into()
    }

    fn backup_sidecars(&self) -> Vec<PathBuf> {
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let mut backups = Vec::new();
        if let Err(e) = std::fs::create_dir_all(&self.backup_dir) {
            tracing::error!("cannot create backup directory: {e}");
            return backups;
        }
        for suffix in ["", "-wal", "-shm"] {
            let mut name = self.db_path.as_os_str().to_os_string();
            name.push(suffix);
            let source = PathBuf::from(name);
            if !source.exists() {
                continue;
            }
            let file_name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "store".into());
            let target = self.backup_dir.join(format!("{file_name}.{stamp}.corrupt"));
            match std::fs::copy(&source, &target) {
                Ok(_) => backups.push(target),
                Err(e) => tracing::error!("failed to back up {}: {e}", source.display()),
            }
        }
        backups
    }

    fn write_marker(&self, marker: &CorruptionMarker) -> std::io::Result<()> {
        let path = self.marker_path();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(marker).unwrap_or_default())?;
        std::fs::rename(&tmp, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(dir: &Path) -> IntegrityGate {
        IntegrityGate::new(
            &dir.join("store.db"),
            &dir.join("backups"),
            Arc::new(NoWorkers),
        )
    }

    #[test]
    fn ready_without_marker() {
        let dir = tempfile::tempdir().unwrap();
        assert!(gate(dir.path()).ensure_ready().is_ok());
    }

    #[test]
    fn freeze_writes_marker_and_backs_up_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("store.db");
        std::fs::write(&db, b"pretend store bytes").unwrap();

        let gate = gate(dir.path());
        let err = gate.freeze("quick_check failed: page 3");
        match &err {
            Error::Integrity(IntegrityError::Corrupted {
                marker_path,
                backup_paths,
                message,
            }) => {
                assert!(marker_path.exists());
                assert_eq!(backup_paths.len(), 1);
                assert!(backup_paths[0].exists());
                assert!(message.contains("page 3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // While the marker exists every gated op short-circuits.
        let err = gate.ensure_ready().unwrap_err();
        assert!(matches!(err, Error::Integrity(IntegrityError::Corrupted { .. })));
        let marker = gate.read_marker().unwrap();
        assert!(marker.message.contains("page 3"));
        assert!(!marker.detected_at.is_empty());
    }

    #[test]
    fn unreadable_marker_still_freezes() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate(dir.path());
        std::fs::write(gate.marker_path(), b"{ not json").unwrap();
        assert!(matches!(
            gate.ensure_ready(),
            Err(Error::Integrity(IntegrityError::Corrupted { .. }))
        ));
    }
}
