//! Status and recovery handlers. Everything here stays legal while a
//! corruption marker freezes the store.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{json, Value};
use sylva_core::HandlerOutcome;
use sylva_error::Result;

use super::decode_params;
use crate::context::ServerContext;

/// Server and store health. While frozen, the store is not touched beyond
/// the marker read.
pub async fn get_status(ctx: &ServerContext) -> Result<HandlerOutcome> {
    let marker = ctx.gate.read_marker();
    let store_status = if marker.is_none() {
        ctx.store.status().await.ok()
    } else {
        None
    };
    Ok(HandlerOutcome::ok(json!({
        "server": "ok",
        "trees": ctx.registry.len(),
        "corrupted": marker.is_some(),
        "store": store_status,
    })))
}

pub async fn get_corruption_status(ctx: &ServerContext) -> Result<HandlerOutcome> {
    match ctx.gate.read_marker() {
        Some(marker) => Ok(HandlerOutcome::ok(json!({
            "corrupted": true,
            "marker_path": ctx.gate.marker_path().display().to_string(),
            "message": marker.message,
            "backup_paths": marker.backup_paths,
            "detected_at": marker.detected_at,
        }))),
        None => Ok(HandlerOutcome::ok(json!({ "corrupted": false }))),
    }
}

#[derive(Deserialize)]
struct BackupCreateParams {
    file_path: PathBuf,
    #[serde(default)]
    comment: Option<String>,
}

pub async fn backup_create(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: BackupCreateParams = decode_params(params)?;
    let path = if params.file_path.is_absolute() {
        params.file_path
    } else {
        ctx.config.root_dir.join(params.file_path)
    };
    let backup_id = ctx
        .backups
        .create_backup(&path, "backup_create", params.comment.as_deref())?;
    Ok(HandlerOutcome::ok(json!({
        "backup_id": backup_id.to_string(),
    })))
}

#[derive(Deserialize)]
struct BackupListParams {
    #[serde(default)]
    file_path: Option<PathBuf>,
}

pub async fn backup_list(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: BackupListParams = decode_params(params)?;
    let path = params.file_path.map(|p| {
        if p.is_absolute() {
            p
        } else {
            ctx.config.root_dir.join(p)
        }
    });
    let versions = ctx.backups.list(path.as_deref())?;
    Ok(HandlerOutcome::ok(json!({
        "count": versions.len(),
        "versions": versions,
    })))
}

#[derive(Deserialize)]
struct BackupRestoreParams {
    file_path: PathBuf,
    backup_id: String,
}

pub async fn backup_restore(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: BackupRestoreParams = decode_params(params)?;
    let backup_id = params.backup_id.parse().map_err(|_| {
        sylva_error::Error::from(sylva_error::ClientError::InvalidRequest {
            message: format!("backup_id is not a UUID: {}", params.backup_id),
        })
    })?;
    let path = if params.file_path.is_absolute() {
        params.file_path
    } else {
        ctx.config.root_dir.join(params.file_path)
    };
    ctx.backups.restore_file(&path, backup_id)?;
    Ok(HandlerOutcome::ok(json!({
        "restored": path.display().to_string(),
    })))
}
