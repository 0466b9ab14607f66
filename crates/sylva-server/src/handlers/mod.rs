//! RPC handlers, grouped by the subsystem they front.

pub mod save;
pub mod status;
pub mod store;
pub mod trees;

use serde::de::DeserializeOwned;
use serde_json::Value;
use sylva_error::{ClientError, Error, Result};

/// Decode `params` into a typed struct, mapping shape errors onto
/// `invalid request`. Missing params decode as an empty object.
pub(crate) fn decode_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    let params = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params
    };
    serde_json::from_value(params).map_err(|e| {
        Error::from(ClientError::InvalidRequest {
            message: format!("invalid params: {e}"),
        })
    })
}

pub(crate) fn parse_tree_id(raw: &str) -> Result<uuid::Uuid> {
    raw.parse().map_err(|_| {
        Error::from(ClientError::InvalidRequest {
            message: format!("tree_id is not a UUID: {raw}"),
        })
    })
}
