//! Errors surfaced to JSON-RPC callers.

use face_index_core::IndexError;
use thiserror::Error;

use crate::protocol::{INTERNAL_ERROR, METHOD_NOT_FOUND, PARSE_ERROR};

/// Anything that turns a request into an error response.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RpcError {
    /// JSON-RPC error code for this failure.
    ///
    /// Bad params share the internal error code with engine failures so
    /// existing callers keep matching on `-32603`.
    pub fn code(&self) -> i64 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) | Self::Index(_) | Self::Internal(_) => INTERNAL_ERROR,
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidParams(e.to_string())
    }
}
