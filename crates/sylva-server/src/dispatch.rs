//! The method table. Every request funnels through [`dispatch`]: the
//! corruption gate short-circuits first, then the method routes to its
//! handler, and any error folds into the wire envelope.

use serde_json::Value;
use sylva_core::{HandlerOutcome, ALLOWED_WHEN_CORRUPTED};
use sylva_error::{ClientError, Result, Severity};

use crate::context::ServerContext;
use crate::handlers;

pub async fn dispatch(ctx: &ServerContext, method: &str, params: Value) -> HandlerOutcome {
    if !ALLOWED_WHEN_CORRUPTED.contains(&method) {
        if let Err(frozen) = ctx.gate.ensure_ready() {
            return frozen.to_outcome();
        }
    }

    match route(ctx, method, params).await {
        Ok(outcome) => outcome,
        Err(error) => {
            match error.severity() {
                Severity::Warning => tracing::debug!(method, %error, "request failed"),
                Severity::Error => tracing::warn!(method, %error, "request failed"),
                Severity::Fatal => tracing::error!(method, %error, "request failed"),
            }
            error.to_outcome()
        }
    }
}

async fn route(ctx: &ServerContext, method: &str, params: Value) -> Result<HandlerOutcome> {
    match method {
        "cst_load_tree" => handlers::trees::load_tree(ctx, params).await,
        "cst_get_node_info" => handlers::trees::get_node_info(ctx, params).await,
        "cst_find_node" => handlers::trees::find_node(ctx, params).await,
        "cst_get_node_by_range" => handlers::trees::get_node_by_range(ctx, params).await,
        "cst_find_nodes_by_range" => handlers::trees::find_nodes_by_range(ctx, params).await,
        "cst_modify_tree" => handlers::trees::modify(ctx, params).await,
        "cst_reload_tree" => handlers::trees::reload(ctx, params).await,
        "cst_remove_tree" => handlers::trees::remove(ctx, params).await,
        "cst_save_tree" => handlers::save::save(ctx, params).await,

        "db_create" => handlers::store::create(ctx, params).await,
        "db_get" => handlers::store::get(ctx, params).await,
        "db_update" => handlers::store::update(ctx, params).await,
        "db_delete" => handlers::store::delete(ctx, params).await,
        "db_list" => handlers::store::list(ctx, params).await,
        "db_search" => handlers::store::search(ctx, params).await,
        "db_begin_transaction" => handlers::store::begin_transaction(ctx).await,
        "db_commit_transaction" => handlers::store::commit_transaction(ctx, params).await,
        "db_rollback_transaction" => handlers::store::rollback_transaction(ctx, params).await,

        "get_status" => handlers::status::get_status(ctx).await,
        "get_corruption_status" => handlers::status::get_corruption_status(ctx).await,
        "backup_create" => handlers::status::backup_create(ctx, params).await,
        "backup_list" => handlers::status::backup_list(ctx, params).await,
        "backup_restore" => handlers::status::backup_restore(ctx, params).await,

        other => Err(ClientError::InvalidRequest {
            message: format!("unknown method: {other}"),
        }
        .into()),
    }
}
