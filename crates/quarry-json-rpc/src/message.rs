use serde_json::Value;

use crate::batch::RequestBatch;
use crate::error::{InvalidRequest, ProtocolError};
use crate::request::JsonRpcRequest;

/// A decoded inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    Single(Result<JsonRpcRequest, InvalidRequest>),
    Batch(RequestBatch),
}

/// Decode raw bytes into a single request or a batch.
///
/// Only structural problems with the payload as a whole are reported as
/// `Err`; problems with an individual request object are carried inside the
/// returned message so that they can be answered with the request's id.
pub fn parse(bytes: &[u8]) -> Result<IncomingMessage, ProtocolError> {
    let value: Value = serde_json::from_slice(bytes)?;
    from_value(value)
}

pub fn from_value(value: Value) -> Result<IncomingMessage, ProtocolError> {
    match value {
        Value::Object(_) => Ok(IncomingMessage::Single(JsonRpcRequest::from_value(value))),
        Value::Array(values) if values.is_empty() => Err(ProtocolError::EmptyBatch),
        Value::Array(values) => Ok(IncomingMessage::Batch(RequestBatch::from_values(values))),
        _ => Err(ProtocolError::NotAContainer),
    }
}
