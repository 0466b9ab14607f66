//! The save handler: project-marker precondition, full integrity check,
//! then the persistence pipeline.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};
use sylva_core::HandlerOutcome;
use sylva_error::{ClientError, Result};
use sylva_io::{save_tree, SaveRequest};

use super::{decode_params, parse_tree_id};
use crate::context::ServerContext;

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct SaveParams {
    tree_id: String,
    project_id: String,
    file_path: PathBuf,
    dataset_id: Option<String>,
    #[serde(default = "default_true")]
    validate: bool,
    #[serde(default = "default_true")]
    backup: bool,
    commit_message: Option<String>,
    #[serde(default)]
    auto_reload: bool,
}

pub async fn save(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: SaveParams = decode_params(params)?;

    check_project_marker(&ctx.config.root_dir, &params.project_id)?;
    // A save is the one path that rewrites disk, store, and backups
    // together, so it gets the physical check, not just the marker read.
    ctx.gate.check(&ctx.store).await?;

    let entry = ctx.registry.get(parse_tree_id(&params.tree_id)?)?;
    let mut tree = entry.lock().await;
    let request = SaveRequest {
        project_id: params.project_id,
        dataset_id: params.dataset_id,
        file_path: params.file_path,
        validate: params.validate,
        backup: params.backup,
        commit_message: params.commit_message,
        auto_reload: params.auto_reload,
    };
    let outcome = save_tree(
        &mut tree,
        &ctx.store,
        &ctx.backups,
        ctx.vcs.as_ref(),
        &ctx.config.root_dir,
        &request,
    )
    .await?;

    Ok(HandlerOutcome::ok(json!({
        "file_path": outcome.file_path.display().to_string(),
        "file_id": outcome.file_id,
        "backup_id": outcome.backup_id.map(|id| id.to_string()),
        "update_result": outcome.update_result,
        "tree_reloaded": outcome.tree_reloaded,
    })))
}

/// A `projectid` sidecar in the project root pins the project identifier;
/// mutating commands must name the same project.
fn check_project_marker(root: &Path, project_id: &str) -> Result<()> {
    let path = root.join("projectid");
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Ok(()),
    };
    let trimmed = content.trim();
    let pinned = serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|v| v.get("id").and_then(Value::as_str).map(|s| s.to_string()))
        .unwrap_or_else(|| trimmed.to_string());
    if pinned != project_id {
        return Err(ClientError::PermissionDenied {
            message: format!(
                "project_id {project_id} does not match the projectid marker ({pinned})"
            ),
        }
        .into());
    }
    Ok(())
}
