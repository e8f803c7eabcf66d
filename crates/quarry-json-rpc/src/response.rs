use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{JsonRpcErrorCode, JsonRpcErrorObject};
use crate::types::{JsonRpcVersion, RequestId};

/// The `id` member of a response.
///
/// `Omitted` is used for errors detected before any id could be extracted and
/// for the notification acknowledgement; `Null` when the request carried an
/// id that could not be salvaged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResponseId {
    #[default]
    Omitted,
    Null,
    Id(RequestId),
}

impl ResponseId {
    pub fn as_request_id(&self) -> Option<&RequestId> {
        match self {
            ResponseId::Id(id) => Some(id),
            _ => None,
        }
    }
}

impl From<RequestId> for ResponseId {
    fn from(id: RequestId) -> Self {
        ResponseId::Id(id)
    }
}

impl From<Option<RequestId>> for ResponseId {
    fn from(id: Option<RequestId>) -> Self {
        match id {
            Some(id) => ResponseId::Id(id),
            None => ResponseId::Null,
        }
    }
}

/// Exactly one of `result` or `error` is meaningful for a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    Result(Value),
    Error(JsonRpcErrorObject),
}

/// A JSON-RPC response.
///
/// On the wire both `result` and `error` are always present, the unused one
/// being `null`: `{"jsonrpc":"2.0","result":19,"error":null,"id":1}`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    pub id: ResponseId,
    pub outcome: ResponseOutcome,
}

impl JsonRpcResponse {
    pub fn success(id: impl Into<ResponseId>, result: Value) -> Self {
        Self {
            id: id.into(),
            outcome: ResponseOutcome::Result(result),
        }
    }

    pub fn error(id: impl Into<ResponseId>, error: JsonRpcErrorObject) -> Self {
        Self {
            id: id.into(),
            outcome: ResponseOutcome::Error(error),
        }
    }

    /// The body written back for a single notification before it runs.
    pub fn notification_ack() -> Self {
        Self::success(ResponseId::Omitted, Value::Null)
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            ResponseOutcome::Result(value) => Some(value),
            ResponseOutcome::Error(_) => None,
        }
    }

    pub fn error_object(&self) -> Option<&JsonRpcErrorObject> {
        match &self.outcome {
            ResponseOutcome::Error(error) => Some(error),
            ResponseOutcome::Result(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Error(_))
    }

    pub fn error_code(&self) -> Option<JsonRpcErrorCode> {
        self.error_object().and_then(JsonRpcErrorObject::kind)
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.id.as_request_id()
    }

    pub fn to_value(&self) -> Value {
        // Serializing a map of plain JSON values cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for JsonRpcResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("jsonrpc", &JsonRpcVersion::V2_0)?;
        match &self.outcome {
            ResponseOutcome::Result(result) => {
                map.serialize_entry("result", result)?;
                map.serialize_entry("error", &Value::Null)?;
            }
            ResponseOutcome::Error(error) => {
                map.serialize_entry("result", &Value::Null)?;
                map.serialize_entry("error", error)?;
            }
        }
        match &self.id {
            ResponseId::Omitted => {}
            ResponseId::Null => map.serialize_entry("id", &Value::Null)?,
            ResponseId::Id(id) => map.serialize_entry("id", id)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for JsonRpcResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let mut obj = Map::<String, Value>::deserialize(deserializer)?;

        match obj.remove("jsonrpc") {
            Some(version) => {
                serde_json::from_value::<JsonRpcVersion>(version).map_err(D::Error::custom)?;
            }
            None => return Err(D::Error::missing_field("jsonrpc")),
        }

        let id = match obj.remove("id") {
            None => ResponseId::Omitted,
            Some(Value::Null) => ResponseId::Null,
            Some(value) => {
                ResponseId::Id(serde_json::from_value(value).map_err(D::Error::custom)?)
            }
        };

        let outcome = match obj.remove("error") {
            None | Some(Value::Null) => {
                ResponseOutcome::Result(obj.remove("result").unwrap_or(Value::Null))
            }
            Some(error) => {
                ResponseOutcome::Error(serde_json::from_value(error).map_err(D::Error::custom)?)
            }
        };

        Ok(Self { id, outcome })
    }
}
