//! Thin handlers over the row store facade: typed CRUD and explicit
//! transactions.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use sylva_core::HandlerOutcome;
use sylva_db::Entity;
use sylva_error::{ClientError, Error, Result};

use super::decode_params;
use crate::context::ServerContext;

fn parse_entity(name: &str) -> Result<Entity> {
    Entity::parse(name).map_err(sylva_error::Error::from)
}

#[derive(Deserialize)]
struct CreateParams {
    entity: String,
    values: Map<String, Value>,
}

pub async fn create(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: CreateParams = decode_params(params)?;
    let entity = parse_entity(&params.entity)?;
    let id = ctx.store.create(entity, params.values).await?;
    Ok(HandlerOutcome::ok(json!({ "id": id })))
}

#[derive(Deserialize)]
struct GetParams {
    entity: String,
    id: Value,
}

pub async fn get(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: GetParams = decode_params(params)?;
    let entity = parse_entity(&params.entity)?;
    let row = ctx.store.get(entity, params.id.clone()).await?;
    match row {
        Some(row) => Ok(HandlerOutcome::ok(json!({ "row": row }))),
        None => Err(ClientError::NotFound {
            what: entity.table(),
            key: params.id.to_string(),
        }
        .into()),
    }
}

#[derive(Deserialize)]
struct UpdateParams {
    entity: String,
    id: Value,
    values: Map<String, Value>,
}

pub async fn update(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: UpdateParams = decode_params(params)?;
    let entity = parse_entity(&params.entity)?;
    ctx.store.update(entity, params.id, params.values).await?;
    Ok(HandlerOutcome::ok_empty())
}

#[derive(Deserialize)]
struct DeleteParams {
    entity: String,
    id: Value,
    #[serde(default)]
    hard: bool,
}

pub async fn delete(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: DeleteParams = decode_params(params)?;
    let entity = parse_entity(&params.entity)?;
    ctx.store.delete(entity, params.id, params.hard).await?;
    Ok(HandlerOutcome::ok_empty())
}

#[derive(Deserialize)]
struct ListParams {
    entity: String,
    #[serde(default)]
    filters: Map<String, Value>,
    limit: Option<i64>,
    offset: Option<i64>,
}

pub async fn list(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: ListParams = decode_params(params)?;
    let entity = parse_entity(&params.entity)?;
    let rows = ctx
        .store
        .list(entity, params.filters, params.limit, params.offset)
        .await?;
    Ok(HandlerOutcome::ok(json!({
        "count": rows.len(),
        "rows": rows,
    })))
}

#[derive(Deserialize)]
struct SearchParams {
    entity: String,
    #[serde(default)]
    filters: Map<String, Value>,
}

pub async fn search(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: SearchParams = decode_params(params)?;
    let entity = parse_entity(&params.entity)?;
    let rows = ctx.store.search(entity, params.filters).await?;
    Ok(HandlerOutcome::ok(json!({
        "count": rows.len(),
        "rows": rows,
    })))
}

pub async fn begin_transaction(ctx: &ServerContext) -> Result<HandlerOutcome> {
    let txn_id = ctx.store.begin_transaction().await?;
    Ok(HandlerOutcome::ok(json!({ "txn_id": txn_id.to_string() })))
}

#[derive(Deserialize)]
struct TxnParams {
    txn_id: String,
}

fn parse_txn_id(raw: &str) -> Result<uuid::Uuid> {
    raw.parse().map_err(|_| {
        Error::from(ClientError::InvalidRequest {
            message: format!("txn_id is not a UUID: {raw}"),
        })
    })
}

pub async fn commit_transaction(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: TxnParams = decode_params(params)?;
    ctx.store
        .commit_transaction(parse_txn_id(&params.txn_id)?)
        .await?;
    Ok(HandlerOutcome::ok_empty())
}

pub async fn rollback_transaction(ctx: &ServerContext, params: Value) -> Result<HandlerOutcome> {
    let params: TxnParams = decode_params(params)?;
    ctx.store
        .rollback_transaction(parse_txn_id(&params.txn_id)?)
        .await?;
    Ok(HandlerOutcome::ok_empty())
}
