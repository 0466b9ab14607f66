//! The save pipeline: validate, backup, write-temp, rename, update the row
//! store, commit — with rollback across all three on any failure.
//!
//! Ordering matters and is part of the contract: the file rename, the
//! row-store commit, and the best-effort VCS commit happen in program
//! order. If anything after the rename fails, the row-store transaction is
//! rolled back and the file is restored from the backup taken up front.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use dashmap::DashMap;
use lazy_static::lazy_static;
use serde_json::Value;
use sylva_cst::{collect_file_facts, parser, CstTree};
use sylva_db::{FileRow, StoreHandle};
use sylva_error::{ClientError, Error, Result};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::backup::BackupManager;
use crate::vcs::Vcs;

lazy_static! {
    static ref FILE_LOCKS: DashMap<PathBuf, Arc<Mutex<()>>> = DashMap::new();
}

fn file_lock(path: &Path) -> Arc<Mutex<()>> {
    FILE_LOCKS
        .entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub project_id: String,
    pub dataset_id: Option<String>,
    /// Target path, relative to the project root (absolute is accepted).
    pub file_path: PathBuf,
    pub validate: bool,
    pub backup: bool,
    pub commit_message: Option<String>,
    pub auto_reload: bool,
}

#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub file_path: PathBuf,
    pub file_id: i64,
    pub backup_id: Option<Uuid>,
    pub update_result: Value,
    pub tree_reloaded: bool,
}

/// Save a tree to disk with joint atomicity over file, row store, and
/// backup.
pub async fn save_tree(
    tree: &mut CstTree,
    store: &StoreHandle,
    backups: &BackupManager,
    vcs: &dyn Vcs,
    project_root: &Path,
    req: &SaveRequest,
) -> Result<SaveOutcome> {
    // Step 1: resolve the target and make sure its directory exists.
    let absolute = if req.file_path.is_absolute() {
        req.file_path.clone()
    } else {
        project_root.join(&req.file_path)
    };
    let parent = absolute
        .parent()
        .ok_or_else(|| {
            Error::from(ClientError::Validation {
                message: format!("target has no parent directory: {}", absolute.display()),
            })
        })?
        .to_path_buf();
    tokio::fs::create_dir_all(&parent)
        .await
        .map_err(|e| Error::file_op("mkdir", &parent, e))?;

    // Concurrent saves to the same path are serialized here.
    let lock = file_lock(&absolute);
    let _guard = lock.lock().await;

    // Step 2: parse the current on-disk content; problems are warnings
    // only, the file is being replaced anyway.
    let target_exists = absolute.exists();
    if req.validate && target_exists {
        match tokio::fs::read_to_string(&absolute).await {
            Ok(existing) => {
                if let Err(e) = parser::check_module(&existing) {
                    tracing::warn!(
                        file = %absolute.display(),
                        "existing file has syntax errors before save: {e}"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(file = %absolute.display(), "could not read existing file: {e}");
            }
        }
    }

    // Step 3: snapshot the current content.
    let mut backup_id = None;
    if req.backup && target_exists {
        match backups.create_backup(&absolute, "cst_save_tree", Some("before saving tree")) {
            Ok(id) => backup_id = Some(id),
            Err(e) => {
                tracing::warn!("failed to create backup, continuing: {e}");
            }
        }
    }

    // Step 4: unparse.
    let source_text = tree.unparse().to_string();

    // Steps 5-6: write a temp file next to the target and validate it.
    let temp_path = parent.join(format!(".sylva-{}.tmp", Uuid::new_v4()));
    write_temp(&temp_path, &source_text).await?;
    if req.validate {
        if let Err(e) = parser::check_module(&source_text) {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }
    }

    if let Err(e) = store
        .ensure_project(
            &req.project_id,
            &project_root.display().to_string(),
            None,
            req.dataset_id
                .as_deref()
                .map(|dataset_id| (dataset_id, "default")),
        )
        .await
    {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    // Step 7: open the row-store transaction.
    let txn_id = match store.begin_transaction().await {
        Ok(txn_id) => txn_id,
        Err(e) => {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
    };

    // Step 8: atomic rename; the temp file is consumed.
    if let Err(e) = tokio::fs::rename(&temp_path, &absolute).await {
        let _ = store.rollback_transaction(txn_id).await;
        let _ = tokio::fs::remove_file(&temp_path).await;
        if let Some(id) = backup_id {
            let _ = backups.restore_file(&absolute, id);
        }
        return Err(Error::file_op("rename", &absolute, e));
    }
    sync_parent_dir(&parent).await;

    // Steps 9-11: upsert the file row, replay entity rows, commit.
    let pipeline = async {
        let row = file_row(req, &absolute, &source_text).await;
        let file_id = store.upsert_file(row).await?;
        let facts = collect_file_facts(tree);
        let update_result = store
            .replay_file_facts(file_id, &req.project_id, facts)
            .await?;
        store.commit_transaction(txn_id).await?;
        Ok::<(i64, Value), sylva_db::DbError>((file_id, update_result))
    };
    let (file_id, update_result) = match pipeline.await {
        Ok(result) => result,
        Err(e) => {
            let _ = store.rollback_transaction(txn_id).await;
            if let Some(id) = backup_id {
                if let Err(restore_err) = backups.restore_file(&absolute, id) {
                    tracing::error!("failed to restore file from backup: {restore_err}");
                }
            }
            return Err(e.into());
        }
    };

    // Step 12: best-effort VCS commit; the file and index are already
    // consistent.
    if let Some(message) = &req.commit_message {
        if let Err(e) = vcs.commit_file(project_root, &absolute, message) {
            tracing::warn!("vcs commit failed: {e}");
        }
    }

    // Step 13: optionally re-point the tree at the saved file and rebuild.
    let mut tree_reloaded = false;
    if req.auto_reload {
        tree.file_path = absolute.clone();
        tree.reload_from_disk()?;
        tree_reloaded = true;
    }

    tracing::info!(
        file = %absolute.display(),
        file_id,
        backup = ?backup_id,
        "saved tree"
    );

    Ok(SaveOutcome {
        file_path: absolute,
        file_id,
        backup_id,
        update_result,
        tree_reloaded,
    })
}

async fn write_temp(temp_path: &Path, source_text: &str) -> Result<()> {
    let mut file = tokio::fs::File::create(temp_path)
        .await
        .map_err(|e| Error::file_op("create", temp_path, e))?;
    file.write_all(source_text.as_bytes())
        .await
        .map_err(|e| Error::file_op("write", temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| Error::file_op("sync", temp_path, e))
}

/// Best-effort fsync of the directory so the rename is durable.
async fn sync_parent_dir(parent: &Path) {
    let parent = parent.to_path_buf();
    let _ = tokio::task::spawn_blocking(move || {
        if let Ok(dir) = std::fs::File::open(&parent) {
            if let Err(e) = dir.sync_all() {
                tracing::trace!("parent fsync failed for {}: {e}", parent.display());
            }
        }
    })
    .await;
}

async fn file_row(req: &SaveRequest, absolute: &Path, source_text: &str) -> FileRow {
    let lines = source_text.lines().count() as i64;
    let stripped = source_text.trim_start();
    let has_docstring = stripped.starts_with("\"\"\"") || stripped.starts_with("'''");
    let last_modified = tokio::fs::metadata(absolute)
        .await
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);

    FileRow {
        project_id: req.project_id.clone(),
        dataset_id: req.dataset_id.clone(),
        path: absolute.display().to_string(),
        content_hash: Some(blake3::hash(source_text.as_bytes()).to_hex().to_string()),
        lines,
        last_modified,
        has_docstring,
    }
}
