//! Backup snapshots: immutable copies keyed by UUID under the backup
//! directory, with a JSON index mapping original path to its version list.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use sylva_error::{ClientError, Error, Result};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupVersion {
    pub backup_id: Uuid,
    pub original_path: PathBuf,
    pub created_at: String,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub size_bytes: u64,
}

type BackupIndex = BTreeMap<String, Vec<BackupVersion>>;

pub struct BackupManager {
    backup_dir: PathBuf,
}

impl BackupManager {
    pub fn new(backup_dir: &Path) -> Self {
        Self {
            backup_dir: backup_dir.to_path_buf(),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.backup_dir.join("index.json")
    }

    fn snapshot_path(&self, backup_id: Uuid) -> PathBuf {
        self.backup_dir.join(format!("{backup_id}.bak"))
    }

    fn load_index(&self) -> Result<BackupIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(BackupIndex::new());
        }
        let content =
            std::fs::read_to_string(&path).map_err(|e| Error::file_op("read", &path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::internal(format!("backup index is unreadable: {e}")))
    }

    fn store_index(&self, index: &BackupIndex) -> Result<()> {
        let path = self.index_path();
        let tmp = self.backup_dir.join(".index.json.tmp");
        let content = serde_json::to_string_pretty(index)
            .map_err(|e| Error::internal(format!("backup index serialization failed: {e}")))?;
        std::fs::write(&tmp, content).map_err(|e| Error::file_op("write", &tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| Error::file_op("rename", &path, e))
    }

    /// Snapshot a file. Returns the id of the immutable copy.
    pub fn create_backup(
        &self,
        file: &Path,
        command: &str,
        comment: Option<&str>,
    ) -> Result<Uuid> {
        std::fs::create_dir_all(&self.backup_dir)
            .map_err(|e| Error::file_op("mkdir", &self.backup_dir, e))?;

        let backup_id = Uuid::new_v4();
        let snapshot = self.snapshot_path(backup_id);
        let size_bytes =
            std::fs::copy(file, &snapshot).map_err(|e| Error::file_op("copy", file, e))?;

        let mut index = self.load_index()?;
        index
            .entry(file.display().to_string())
            .or_default()
            .push(BackupVersion {
                backup_id,
                original_path: file.to_path_buf(),
                created_at: chrono::Utc::now().to_rfc3339(),
                command: command.to_string(),
                comment: comment.map(|s| s.to_string()),
                size_bytes,
            });
        self.store_index(&index)?;

        tracing::debug!(%backup_id, file = %file.display(), "created backup");
        Ok(backup_id)
    }

    /// Restore a file from a snapshot, byte-exact.
    pub fn restore_file(&self, original: &Path, backup_id: Uuid) -> Result<()> {
        let index = self.load_index()?;
        let known = index
            .get(&original.display().to_string())
            .map(|versions| versions.iter().any(|v| v.backup_id == backup_id))
            .unwrap_or(false);
        if !known {
            return Err(ClientError::NotFound {
                what: "backup",
                key: backup_id.to_string(),
            }
            .into());
        }
        let snapshot = self.snapshot_path(backup_id);
        std::fs::copy(&snapshot, original).map_err(|e| Error::file_op("restore", original, e))?;
        tracing::info!(%backup_id, file = %original.display(), "restored from backup");
        Ok(())
    }

    /// Versions for one file, or the whole index flattened.
    pub fn list(&self, original: Option<&Path>) -> Result<Vec<BackupVersion>> {
        let index = self.load_index()?;
        Ok(match original {
            Some(path) => index
                .get(&path.display().to_string())
                .cloned()
                .unwrap_or_default(),
            None => index.into_values().flatten().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_and_restore_are_byte_exact() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        std::fs::write(&file, "x = 1\n").unwrap();

        let manager = BackupManager::new(&dir.path().join("backups"));
        let backup_id = manager.create_backup(&file, "save_tree", Some("before edit")).unwrap();

        std::fs::write(&file, "x = 2\n").unwrap();
        manager.restore_file(&file, backup_id).unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "x = 1\n");
    }

    #[test]
    fn index_tracks_versions_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        std::fs::write(&file, "v1\n").unwrap();

        let manager = BackupManager::new(&dir.path().join("backups"));
        manager.create_backup(&file, "save_tree", None).unwrap();
        std::fs::write(&file, "v2\n").unwrap();
        manager.create_backup(&file, "save_tree", None).unwrap();

        let versions = manager.list(Some(&file)).unwrap();
        assert_eq!(versions.len(), 2);
        assert!(versions[0].created_at <= versions[1].created_at);
    }

    #[test]
    fn restoring_an_unknown_backup_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(&dir.path().join("backups"));
        let err = manager
            .restore_file(&dir.path().join("a.py"), Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Client(ClientError::NotFound { .. })
        ));
    }
}
