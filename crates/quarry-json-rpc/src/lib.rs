//! # JSON-RPC 2.0 Protocol Model
//!
//! A pure, transport-agnostic model of JSON-RPC 2.0 requests, responses and
//! batches. This crate contains no dispatch logic and no transport code; it
//! only defines what goes over the wire and the seam a transport uses to hand
//! payloads to an engine.
//!
//! ## Features
//! - Strict request validation with id salvage for error responses
//! - Responses that always carry both `result` and `error` members
//! - Batches whose malformed elements fail independently
//! - `async` feature: [`PayloadHandler`], [`ResponseSink`] and the
//!   single-write [`OneShotSink`]

pub mod batch;
pub mod error;
pub mod message;
pub mod prelude;
pub mod request;
pub mod response;
pub mod types;

#[cfg(feature = "async")]
pub mod r#async;

// Re-export main types
pub use batch::{BatchEntry, RequestBatch, ResponseBatch};
pub use error::{InvalidRequest, JsonRpcErrorCode, JsonRpcErrorObject, ProtocolError};
pub use message::{IncomingMessage, parse};
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcResponse, ResponseId, ResponseOutcome};
pub use types::{JsonRpcVersion, RequestId};

#[cfg(feature = "async")]
pub use r#async::{
    CallContext, InboundPayload, OneShotSink, OutboundPayload, PayloadHandler, PendingResponse,
    ResponseSink,
};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Private method called without an accepted token
    pub const ACCESS_DENIED: i64 = -32001;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
