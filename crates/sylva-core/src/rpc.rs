use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Wire error codes. The numeric values are stable on the wire and must not
/// be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Success = 0,
    InvalidRequest = 1,
    DatabaseError = 2,
    NotFound = 3,
    ValidationError = 4,
    PermissionDenied = 5,
    Timeout = 6,
    InternalError = 7,
    TransactionError = 8,
    SchemaError = 9,
    ConnectionError = 10,
}

impl ErrorCode {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(ErrorCode::Success),
            1 => Some(ErrorCode::InvalidRequest),
            2 => Some(ErrorCode::DatabaseError),
            3 => Some(ErrorCode::NotFound),
            4 => Some(ErrorCode::ValidationError),
            5 => Some(ErrorCode::PermissionDenied),
            6 => Some(ErrorCode::Timeout),
            7 => Some(ErrorCode::InternalError),
            8 => Some(ErrorCode::TransactionError),
            9 => Some(ErrorCode::SchemaError),
            10 => Some(ErrorCode::ConnectionError),
            _ => None,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        ErrorCode::from_i64(value)
            .ok_or_else(|| de::Error::custom(format!("unknown error code {value}")))
    }
}

/// JSON-RPC 2.0 request. Requests without an `id` are notifications and
/// produce no response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: Option<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Option<String>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<String>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// What a handler hands back to the gateway. The gateway folds this into the
/// `result`/`error` halves of the JSON-RPC response.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    Success {
        data: Option<Value>,
    },
    Error {
        error_code: ErrorCode,
        description: String,
        details: Option<Value>,
    },
}

impl HandlerOutcome {
    pub fn ok(data: Value) -> Self {
        HandlerOutcome::Success { data: Some(data) }
    }

    pub fn ok_empty() -> Self {
        HandlerOutcome::Success { data: None }
    }

    pub fn error(code: ErrorCode, description: impl Into<String>, details: Option<Value>) -> Self {
        HandlerOutcome::Error {
            error_code: code,
            description: description.into(),
            details,
        }
    }

    /// Success envelope: `{"success": true, "data": ...}`.
    /// Error envelope: `{"success": false, "error_code": ..., ...}`.
    pub fn to_envelope(&self) -> Value {
        match self {
            HandlerOutcome::Success { data } => {
                let mut obj = serde_json::Map::new();
                obj.insert("success".into(), Value::Bool(true));
                if let Some(data) = data {
                    obj.insert("data".into(), data.clone());
                }
                Value::Object(obj)
            }
            HandlerOutcome::Error {
                error_code,
                description,
                details,
            } => {
                let mut obj = serde_json::Map::new();
                obj.insert("success".into(), Value::Bool(false));
                obj.insert("error_code".into(), Value::from(error_code.as_i64()));
                obj.insert("description".into(), Value::from(description.clone()));
                if let Some(details) = details {
                    obj.insert("details".into(), details.clone());
                }
                Value::Object(obj)
            }
        }
    }

    pub fn into_response(self, id: Option<String>) -> RpcResponse {
        match self {
            HandlerOutcome::Success { .. } => {
                let envelope = self.to_envelope();
                RpcResponse::success(id, envelope)
            }
            HandlerOutcome::Error {
                error_code,
                description,
                details,
            } => RpcResponse::failure(
                id,
                RpcError {
                    code: error_code,
                    message: description,
                    data: details,
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable_on_the_wire() {
        assert_eq!(serde_json::to_value(ErrorCode::DatabaseError).unwrap(), 2);
        assert_eq!(serde_json::to_value(ErrorCode::ConnectionError).unwrap(), 10);
        let code: ErrorCode = serde_json::from_value(serde_json::json!(6)).unwrap();
        assert_eq!(code, ErrorCode::Timeout);
        assert!(serde_json::from_value::<ErrorCode>(serde_json::json!(99)).is_err());
    }

    #[test]
    fn notification_has_no_id() {
        let req: RpcRequest = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "method": "cst_remove_tree",
            "params": {"tree_id": "x"},
        }))
        .unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn outcome_folds_into_response_halves() {
        let ok = HandlerOutcome::ok(serde_json::json!({"tree_id": "t"}));
        let resp = ok.into_response(Some("1".into()));
        assert!(resp.is_success());
        assert_eq!(resp.result.unwrap()["success"], true);

        let err = HandlerOutcome::error(
            ErrorCode::NotFound,
            "tree not found",
            Some(serde_json::json!({"tree_id": "t"})),
        );
        let resp = err.into_response(Some("2".into()));
        assert!(!resp.is_success());
        let error = resp.error.unwrap();
        assert_eq!(error.code, ErrorCode::NotFound);
        assert_eq!(error.data.unwrap()["tree_id"], "t");
    }
}
