//! JSON-RPC 2.0 envelopes, one per line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INTERNAL_ERROR: i64 = -32603;

/// Incoming request line.
///
/// `jsonrpc` is accepted but not enforced. A missing `id` is echoed back as
/// `null`.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    /// Build a request from an already parsed line.
    ///
    /// On failure returns the id to answer with alongside the error, so a
    /// well-formed object with a bad `method` still echoes its id.
    pub fn from_value(value: Value) -> Result<Self, (Value, RpcError)> {
        let Value::Object(mut fields) = value else {
            return Err((
                Value::Null,
                RpcError::Parse("request must be a JSON object".to_string()),
            ));
        };

        let id = fields.remove("id").unwrap_or(Value::Null);
        let method = match fields.remove("method") {
            Some(Value::String(method)) => method,
            Some(other) => return Err((id, RpcError::MethodNotFound(other.to_string()))),
            None => return Err((id, RpcError::MethodNotFound("null".to_string()))),
        };
        let jsonrpc = match fields.remove("jsonrpc") {
            Some(Value::String(version)) => Some(version),
            _ => None,
        };

        Ok(Self {
            jsonrpc,
            id,
            method,
            params: fields.remove("params").unwrap_or(Value::Null),
        })
    }
}

/// Error member of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

/// Outgoing response line. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, err: &RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcErrorBody {
                code: err.code(),
                message: err.to_string(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
