use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::request::JsonRpcRequest;
use crate::response::JsonRpcResponse;
use crate::types::RequestId;

/// One element of an inbound batch after independent validation.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEntry {
    Request(JsonRpcRequest),
    /// Malformed element, already turned into its invalid-request response.
    Invalid(JsonRpcResponse),
}

/// A non-empty batch of request objects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestBatch {
    entries: Vec<BatchEntry>,
}

impl RequestBatch {
    /// Validate every element on its own. A bad element never spoils its
    /// neighbours; it becomes an invalid-request response with a null id.
    pub fn from_values(values: Vec<Value>) -> Self {
        let entries = values
            .into_iter()
            .map(|value| match JsonRpcRequest::from_value(value) {
                Ok(request) => BatchEntry::Request(request),
                Err(_) => BatchEntry::Invalid(
                    crate::error::JsonRpcErrorCode::InvalidRequest
                        .response(crate::response::ResponseId::Null),
                ),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Requests that expect an answer plus invalid entries.
    pub fn expected_responses(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| match entry {
                BatchEntry::Request(request) => !request.is_notification(),
                BatchEntry::Invalid(_) => true,
            })
            .count()
    }
}

impl From<Vec<JsonRpcRequest>> for RequestBatch {
    fn from(requests: Vec<JsonRpcRequest>) -> Self {
        Self {
            entries: requests.into_iter().map(BatchEntry::Request).collect(),
        }
    }
}

/// Responses to a batch. Order is not significant; look entries up by id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseBatch {
    responses: Vec<JsonRpcResponse>,
}

impl ResponseBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, response: JsonRpcResponse) {
        self.responses.push(response);
    }

    pub fn get(&self, id: &RequestId) -> Option<&JsonRpcResponse> {
        self.responses
            .iter()
            .find(|response| response.request_id() == Some(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &JsonRpcResponse> {
        self.responses.iter()
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn into_inner(self) -> Vec<JsonRpcResponse> {
        self.responses
    }
}

impl From<Vec<JsonRpcResponse>> for ResponseBatch {
    fn from(responses: Vec<JsonRpcResponse>) -> Self {
        Self { responses }
    }
}

impl FromIterator<JsonRpcResponse> for ResponseBatch {
    fn from_iter<I: IntoIterator<Item = JsonRpcResponse>>(iter: I) -> Self {
        Self {
            responses: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JsonRpcErrorCode;
    use serde_json::json;

    #[test]
    fn test_malformed_elements_become_invalid_entries() {
        let batch = RequestBatch::from_values(vec![json!(1), json!(2), json!(3)]);
        assert_eq!(batch.len(), 3);
        for entry in batch.entries() {
            let BatchEntry::Invalid(response) = entry else {
                panic!("expected invalid entry");
            };
            assert_eq!(response.error_code(), Some(JsonRpcErrorCode::InvalidRequest));
            assert_eq!(response.to_value()["id"], json!(null));
        }
    }

    #[test]
    fn test_expected_responses_skips_notifications() {
        let batch = RequestBatch::from_values(vec![
            json!({"jsonrpc": "2.0", "method": "sum", "params": [1, 2], "id": "1"}),
            json!({"jsonrpc": "2.0", "method": "notify_hello", "params": [7]}),
            json!({"foo": "boo"}),
        ]);
        assert_eq!(batch.expected_responses(), 2);
    }

    #[test]
    fn test_lookup_by_id() {
        let batch: ResponseBatch = vec![
            JsonRpcResponse::success(RequestId::from("2"), json!(19)),
            JsonRpcResponse::success(RequestId::from("1"), json!(7)),
        ]
        .into();
        assert_eq!(batch.get(&RequestId::from("1")).and_then(|r| r.result()), Some(&json!(7)));
        assert!(batch.get(&RequestId::from("9")).is_none());

        let text = serde_json::to_string(&batch).unwrap();
        assert!(text.starts_with('['));
    }
}
