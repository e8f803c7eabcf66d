//! # JSON-RPC Prelude
//!
//! Convenient re-exports of the most commonly used protocol types.
//!
//! ```rust
//! use quarry_json_rpc::prelude::*;
//! ```

pub use crate::batch::{BatchEntry, RequestBatch, ResponseBatch};
pub use crate::error::{InvalidRequest, JsonRpcErrorCode, JsonRpcErrorObject, ProtocolError};
pub use crate::message::{IncomingMessage, parse};
pub use crate::request::{JsonRpcRequest, RequestParams};
pub use crate::response::{JsonRpcResponse, ResponseId, ResponseOutcome};
pub use crate::types::{JsonRpcVersion, RequestId};

#[cfg(feature = "async")]
pub use crate::r#async::{
    CallContext, InboundPayload, OneShotSink, OutboundPayload, PayloadHandler, ResponseSink,
};

// Standard error codes
pub use crate::error_codes::*;
