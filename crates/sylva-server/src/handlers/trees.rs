//! Handlers for the in-memory tree surface: load, inspect, query, modify,
//! reload, remove.

use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use sylva_core::{HandlerOutcome, NodeMetadata, TreeOperation};
use sylva_cst::{
    find_covering, find_intersecting, modify_tree, query_tree, simple_search, IndexOptions,
    SimpleFilters,
};
use sylva_error::{ClientError, Error, Result};

use super::{decode_params, parse_tree_id};
use crate::context::ServerContext;

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct LoadTreeParams {
    file_path: PathBuf,
    node_types: Option<Vec<String>>,
    max_depth: Option<usize>,
    #[serde(default = "default_true")]
    include_children: bool,
}

pub async fn load_tree(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: LoadTreeParams = decode_params(params)?;
    let path = if params.file_path.is_absolute() {
        params.file_path.clone()
    } else {
        ctx.config.root_dir.join(&params.file_path)
    };
    let options = IndexOptions {
        node_types: params.node_types,
        max_depth: params.max_depth,
        include_children: params.include_children,
    };
    let entry = ctx.registry.load_file(&path, options)?;
    let tree = entry.lock().await;
    let root = tree.metadata_map.values().next().cloned();
    Ok(HandlerOutcome::ok(json!({
        "tree_id": tree.tree_id.to_string(),
        "file_path": tree.file_path.display().to_string(),
        "node_count": tree.node_count(),
        "root": root,
    })))
}

#[derive(Deserialize)]
struct NodeInfoParams {
    tree_id: String,
    node_id: String,
    #[serde(default)]
    include_code: bool,
}

pub async fn get_node_info(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: NodeInfoParams = decode_params(params)?;
    let entry = ctx.registry.get(parse_tree_id(&params.tree_id)?)?;
    let tree = entry.lock().await;
    let (_, meta) = tree.resolve(&params.node_id)?;
    let mut meta = meta.clone();
    if params.include_code {
        meta.code = tree.node_code(&params.node_id).map(|s| s.to_string());
    }
    Ok(HandlerOutcome::ok(json!({ "node": meta })))
}

#[derive(Deserialize)]
struct FindNodeParams {
    tree_id: String,
    #[serde(default = "default_search_type")]
    search_type: String,
    query: Option<String>,
    node_type: Option<String>,
    name: Option<String>,
    qualname: Option<String>,
    start_line: Option<u32>,
    end_line: Option<u32>,
    #[serde(default)]
    include_code: bool,
}

fn default_search_type() -> String {
    "xpath".into()
}

pub async fn find_node(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: FindNodeParams = decode_params(params)?;
    let entry = ctx.registry.get(parse_tree_id(&params.tree_id)?)?;
    let tree = entry.lock().await;

    let mut nodes: Vec<NodeMetadata> = match params.search_type.as_str() {
        "xpath" => {
            let query = params.query.as_deref().ok_or_else(|| {
                Error::from(ClientError::InvalidRequest {
                    message: "query parameter required for xpath search".into(),
                })
            })?;
            query_tree(&tree, query)?
        }
        "simple" => simple_search(
            &tree,
            &SimpleFilters {
                node_type: params.node_type,
                name: params.name,
                qualname: params.qualname,
                start_line: params.start_line,
                end_line: params.end_line,
            },
        ),
        other => {
            return Err(ClientError::InvalidRequest {
                message: format!("invalid search_type {other:?}: must be 'simple' or 'xpath'"),
            }
            .into())
        }
    };

    if params.include_code {
        for meta in &mut nodes {
            meta.code = tree.node_code(&meta.node_id).map(|s| s.to_string());
        }
    }
    Ok(HandlerOutcome::ok(json!({
        "count": nodes.len(),
        "nodes": nodes,
    })))
}

#[derive(Deserialize)]
struct RangeParams {
    tree_id: String,
    start_line: u32,
    end_line: u32,
    #[serde(default = "default_true")]
    prefer_exact: bool,
}

pub async fn get_node_by_range(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: RangeParams = decode_params(params)?;
    let entry = ctx.registry.get(parse_tree_id(&params.tree_id)?)?;
    let tree = entry.lock().await;
    let node = find_covering(&tree, params.start_line, params.end_line, params.prefer_exact)?;
    Ok(HandlerOutcome::ok(json!({ "node": node })))
}

pub async fn find_nodes_by_range(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: RangeParams = decode_params(params)?;
    let entry = ctx.registry.get(parse_tree_id(&params.tree_id)?)?;
    let tree = entry.lock().await;
    let nodes = find_intersecting(&tree, params.start_line, params.end_line)?;
    Ok(HandlerOutcome::ok(json!({
        "count": nodes.len(),
        "nodes": nodes,
    })))
}

#[derive(Deserialize)]
struct ModifyParams {
    tree_id: String,
    operations: Vec<TreeOperation>,
}

pub async fn modify(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: ModifyParams = decode_params(params)?;
    let entry = ctx.registry.get(parse_tree_id(&params.tree_id)?)?;
    let mut tree = entry.lock().await;
    let outcome = modify_tree(&mut tree, &params.operations)?;
    Ok(HandlerOutcome::ok(json!({
        "tree_id": params.tree_id,
        "operations_applied": outcome.operations_applied,
        "node_count": outcome.node_count,
    })))
}

#[derive(Deserialize)]
struct TreeIdParams {
    tree_id: String,
}

pub async fn reload(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: TreeIdParams = decode_params(params)?;
    let entry = ctx.registry.get(parse_tree_id(&params.tree_id)?)?;
    let mut tree = entry.lock().await;
    tree.reload_from_disk()?;
    Ok(HandlerOutcome::ok(json!({
        "tree_id": params.tree_id,
        "node_count": tree.node_count(),
    })))
}

pub async fn remove(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: TreeIdParams = decode_params(params)?;
    let removed = ctx.registry.remove(parse_tree_id(&params.tree_id)?);
    Ok(HandlerOutcome::ok(json!({ "removed": removed })))
}
