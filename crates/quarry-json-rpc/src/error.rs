use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::response::{JsonRpcResponse, ResponseId};
use crate::types::RequestId;

/// JSON-RPC error codes, including the access-denied extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    AccessDenied,
    ServerError(i64), // -32099 to -32000
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::ParseError => -32700,
            JsonRpcErrorCode::InvalidRequest => -32600,
            JsonRpcErrorCode::MethodNotFound => -32601,
            JsonRpcErrorCode::InvalidParams => -32602,
            JsonRpcErrorCode::InternalError => -32603,
            JsonRpcErrorCode::AccessDenied => -32001,
            JsonRpcErrorCode::ServerError(code) => *code,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::AccessDenied => "Access denied",
            JsonRpcErrorCode::ServerError(_) => "Server error",
        }
    }

    /// Reverse lookup used when reading responses back off the wire.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -32700 => Some(JsonRpcErrorCode::ParseError),
            -32600 => Some(JsonRpcErrorCode::InvalidRequest),
            -32601 => Some(JsonRpcErrorCode::MethodNotFound),
            -32602 => Some(JsonRpcErrorCode::InvalidParams),
            -32603 => Some(JsonRpcErrorCode::InternalError),
            -32001 => Some(JsonRpcErrorCode::AccessDenied),
            c if (-32099..=-32000).contains(&c) => Some(JsonRpcErrorCode::ServerError(c)),
            _ => None,
        }
    }

    /// Stamp the canned error for this code onto a response with the given id.
    pub fn response(self, id: impl Into<ResponseId>) -> JsonRpcResponse {
        JsonRpcResponse::error(id, JsonRpcErrorObject::canned(self))
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// JSON-RPC Error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, message: Option<String>, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            data,
        }
    }

    /// The fixed `{code, message}` pair for a well-known code.
    pub fn canned(code: JsonRpcErrorCode) -> Self {
        Self::new(code, None, None)
    }

    pub fn parse_error() -> Self {
        Self::canned(JsonRpcErrorCode::ParseError)
    }

    pub fn invalid_request() -> Self {
        Self::canned(JsonRpcErrorCode::InvalidRequest)
    }

    pub fn method_not_found() -> Self {
        Self::canned(JsonRpcErrorCode::MethodNotFound)
    }

    pub fn invalid_params() -> Self {
        Self::canned(JsonRpcErrorCode::InvalidParams)
    }

    pub fn access_denied() -> Self {
        Self::canned(JsonRpcErrorCode::AccessDenied)
    }

    /// Internal error carrying `{"class": .., "info": ..}` describing the failure.
    pub fn internal_error(class: &str, info: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::InternalError,
            None,
            Some(serde_json::json!({ "class": class, "info": info })),
        )
    }

    pub fn server_error(code: i64, message: &str, data: Option<Value>) -> Self {
        let code = if (-32099..=-32000).contains(&code) {
            code
        } else {
            -32000
        };
        Self::new(
            JsonRpcErrorCode::ServerError(code),
            Some(message.to_string()),
            data,
        )
    }

    pub fn kind(&self) -> Option<JsonRpcErrorCode> {
        JsonRpcErrorCode::from_code(self.code)
    }
}

impl fmt::Display for JsonRpcErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC Error {}: {}", self.code, self.message)
    }
}

/// A request object that failed validation. Carries whatever id could be
/// salvaged from it so the error response can still be correlated.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid request: {reason}")]
pub struct InvalidRequest {
    pub id: Option<RequestId>,
    pub reason: &'static str,
}

impl InvalidRequest {
    pub fn new(id: Option<RequestId>, reason: &'static str) -> Self {
        Self { id, reason }
    }

    pub fn to_response(&self) -> JsonRpcResponse {
        JsonRpcErrorCode::InvalidRequest.response(self.id.clone())
    }
}

/// Payload-level failures detected before any request object is examined
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Top-level JSON value must be an object or an array")]
    NotAContainer,

    #[error("Batch must contain at least one element")]
    EmptyBatch,
}

impl ProtocolError {
    /// Canned response for the failure. Errors found before id extraction
    /// carry no id at all; an empty batch answers with a null id.
    pub fn to_response(&self) -> JsonRpcResponse {
        match self {
            ProtocolError::Parse(_) => JsonRpcErrorCode::ParseError.response(ResponseId::Omitted),
            ProtocolError::NotAContainer => {
                JsonRpcErrorCode::InvalidRequest.response(ResponseId::Omitted)
            }
            ProtocolError::EmptyBatch => JsonRpcErrorCode::InvalidRequest.response(ResponseId::Null),
        }
    }
}
