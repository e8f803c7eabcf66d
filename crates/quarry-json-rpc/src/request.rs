use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::InvalidRequest;
use crate::types::{JsonRpcVersion, RequestId};

/// Parameters for a JSON-RPC request
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestParams {
    /// Positional parameters as an array
    Array(Vec<Value>),
    /// Named parameters as an object
    Object(Map<String, Value>),
}

impl Default for RequestParams {
    fn default() -> Self {
        RequestParams::Object(Map::new())
    }
}

impl RequestParams {
    /// Get a parameter by name (for object params)
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            RequestParams::Object(map) => map.get(key),
            RequestParams::Array(_) => None,
        }
    }

    /// Get a parameter by index (for array params only)
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            RequestParams::Array(vec) => vec.get(index),
            RequestParams::Object(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        match self {
            RequestParams::Object(map) => map.len(),
            RequestParams::Array(vec) => vec.len(),
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, RequestParams::Array(_))
    }

    pub fn to_value(&self) -> Value {
        match self {
            RequestParams::Object(map) => Value::Object(map.clone()),
            RequestParams::Array(arr) => Value::Array(arr.clone()),
        }
    }
}

impl From<Map<String, Value>> for RequestParams {
    fn from(map: Map<String, Value>) -> Self {
        RequestParams::Object(map)
    }
}

impl From<Vec<Value>> for RequestParams {
    fn from(vec: Vec<Value>) -> Self {
        RequestParams::Array(vec)
    }
}

/// A JSON-RPC request. A request without an id is a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    pub method: String,
    pub params: RequestParams,
    pub id: Option<RequestId>,
    /// Top-level members other than `jsonrpc`, `method`, `params` and `id`.
    pub extra: Map<String, Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: RequestParams) -> Self {
        Self {
            method: method.into(),
            params,
            id: Some(id.into()),
            extra: Map::new(),
        }
    }

    pub fn notification(method: impl Into<String>, params: RequestParams) -> Self {
        Self {
            method: method.into(),
            params,
            id: None,
            extra: Map::new(),
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Validate and convert a decoded JSON value into a request.
    pub fn from_value(value: Value) -> Result<Self, InvalidRequest> {
        let Value::Object(mut obj) = value else {
            return Err(InvalidRequest::new(None, "request must be a JSON object"));
        };

        let id = match obj.remove("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(RequestId::String(s)),
            Some(Value::Number(n)) => Some(RequestId::Number(n)),
            Some(_) => {
                return Err(InvalidRequest::new(
                    None,
                    "id must be a string, a number or null",
                ));
            }
        };

        match obj.remove("jsonrpc") {
            Some(Value::String(version)) if version == JsonRpcVersion::V2_0.as_str() => {}
            _ => return Err(InvalidRequest::new(id, "jsonrpc must be exactly \"2.0\"")),
        }

        let method = match obj.remove("method") {
            Some(Value::String(method)) if !method.is_empty() => method,
            _ => return Err(InvalidRequest::new(id, "method must be a non-empty string")),
        };

        let params = match obj.remove("params") {
            None | Some(Value::Null) => RequestParams::default(),
            Some(Value::Array(arr)) => RequestParams::Array(arr),
            Some(Value::Object(map)) => RequestParams::Object(map),
            Some(_) => {
                return Err(InvalidRequest::new(
                    id,
                    "params must be an array or an object",
                ));
            }
        };

        Ok(Self {
            method,
            params,
            id,
            extra: obj,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "jsonrpc".to_string(),
            Value::String(JsonRpcVersion::V2_0.as_str().to_string()),
        );
        obj.insert("method".to_string(), Value::String(self.method.clone()));
        obj.insert("params".to_string(), self.params.to_value());
        if let Some(id) = &self.id {
            obj.insert("id".to_string(), id.to_value());
        }
        for (key, value) in &self.extra {
            obj.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(obj)
    }
}

impl Serialize for JsonRpcRequest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("jsonrpc", &JsonRpcVersion::V2_0)?;
        map.serialize_entry("method", &self.method)?;
        map.serialize_entry("params", &self.params)?;
        if let Some(id) = &self.id {
            map.serialize_entry("id", id)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for JsonRpcRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        JsonRpcRequest::from_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_positional_request() {
        let request = JsonRpcRequest::from_value(
            json!({"jsonrpc": "2.0", "method": "subtract", "params": [42, 23], "id": 1}),
        )
        .unwrap();

        assert_eq!(request.method, "subtract");
        assert_eq!(request.params.get_index(1), Some(&json!(23)));
        assert_eq!(request.id, Some(RequestId::from(1_i64)));
        assert!(!request.is_notification());
    }

    #[test]
    fn test_missing_or_null_id_is_notification() {
        let request =
            JsonRpcRequest::from_value(json!({"jsonrpc": "2.0", "method": "update"})).unwrap();
        assert!(request.is_notification());
        assert!(request.params.is_empty());

        let request =
            JsonRpcRequest::from_value(json!({"jsonrpc": "2.0", "method": "update", "id": null}))
                .unwrap();
        assert!(request.is_notification());
    }

    #[test]
    fn test_wrong_version_keeps_id() {
        let err = JsonRpcRequest::from_value(json!({"jsonrpc": "1.0", "method": "x", "id": 33}))
            .unwrap_err();
        assert_eq!(err.id, Some(RequestId::from(33_i64)));

        let err = JsonRpcRequest::from_value(json!({"method": "x", "id": "a"})).unwrap_err();
        assert_eq!(err.id, Some(RequestId::from("a")));
    }

    #[test]
    fn test_scalar_params_are_invalid() {
        for params in [json!("foobar"), json!(true), json!(7)] {
            let err = JsonRpcRequest::from_value(
                json!({"jsonrpc": "2.0", "method": "x", "params": params, "id": 2}),
            )
            .unwrap_err();
            assert_eq!(err.id, Some(RequestId::from(2_i64)));
        }
    }

    #[test]
    fn test_bad_id_or_method_is_invalid() {
        let err = JsonRpcRequest::from_value(json!({"jsonrpc": "2.0", "method": "x", "id": true}))
            .unwrap_err();
        assert_eq!(err.id, None);

        assert!(JsonRpcRequest::from_value(json!({"jsonrpc": "2.0", "id": 1})).is_err());
        assert!(JsonRpcRequest::from_value(json!({"jsonrpc": "2.0", "method": 1, "id": 1})).is_err());
        assert!(JsonRpcRequest::from_value(json!({"jsonrpc": "2.0", "method": "", "id": 1})).is_err());
        assert!(JsonRpcRequest::from_value(json!(1)).is_err());
    }

    #[test]
    fn test_round_trip_preserves_semantics() {
        let original = JsonRpcRequest::from_value(json!({
            "jsonrpc": "2.0",
            "method": "sum",
            "params": {"a": 1, "b": [2, 3]},
            "id": "abc",
            "trace": "t-1"
        }))
        .unwrap();
        assert_eq!(original.extra.get("trace"), Some(&json!("t-1")));

        let encoded = serde_json::to_string(&original).unwrap();
        let decoded: JsonRpcRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_notification_serializes_without_id() {
        let request = JsonRpcRequest::notification("notify", RequestParams::from(vec![json!(1)]));
        let value = request.to_value();
        assert!(value.get("id").is_none());
        assert_eq!(value["params"], json!([1]));
        assert_eq!(serde_json::to_value(&request).unwrap(), value);
    }
}
