use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::oneshot;
use parking_lot::Mutex;
use serde::{Serialize, Serializer};

use crate::batch::ResponseBatch;
use crate::response::JsonRpcResponse;

/// Per-call transport context: request headers and cookies, used by
/// credential validation strategies. Header names are stored lower-cased.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    peer: Option<SocketAddr>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from raw header pairs. `Cookie` headers are also
    /// split into individual cookies.
    pub fn from_header_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |ctx, (name, value)| {
                ctx.with_header(name.as_ref(), value.as_ref())
            })
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name == "cookie" {
            for (cookie, cookie_value) in parse_cookie_header(value) {
                self.cookies.insert(cookie, cookie_value);
            }
        }
        self.headers.insert(name, value.to_string());
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn parse_cookie_header(value: &str) -> impl Iterator<Item = (String, String)> + '_ {
    value.split(';').filter_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Some((name.to_string(), value.to_string()))
    })
}

/// The terminal payload written back for one inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundPayload {
    Single(JsonRpcResponse),
    Batch(ResponseBatch),
}

impl OutboundPayload {
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    pub fn as_single(&self) -> Option<&JsonRpcResponse> {
        match self {
            OutboundPayload::Single(response) => Some(response),
            OutboundPayload::Batch(_) => None,
        }
    }

    pub fn as_batch(&self) -> Option<&ResponseBatch> {
        match self {
            OutboundPayload::Batch(batch) => Some(batch),
            OutboundPayload::Single(_) => None,
        }
    }
}

impl Serialize for OutboundPayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            OutboundPayload::Single(response) => response.serialize(serializer),
            OutboundPayload::Batch(batch) => batch.serialize(serializer),
        }
    }
}

/// Where the engine writes the one terminal payload for an inbound payload.
pub trait ResponseSink: Send + Sync {
    /// Returns `false` when a payload was already written; the new one is dropped.
    fn write(&self, payload: OutboundPayload) -> bool;

    fn is_written(&self) -> bool;
}

/// Single-write guard backed by a oneshot channel.
pub struct OneShotSink {
    written: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<OutboundPayload>>>,
}

impl OneShotSink {
    pub fn channel() -> (Arc<OneShotSink>, PendingResponse) {
        let (sender, receiver) = oneshot::channel();
        let sink = Arc::new(OneShotSink {
            written: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
        });
        (sink, PendingResponse { receiver })
    }
}

impl ResponseSink for OneShotSink {
    fn write(&self, payload: OutboundPayload) -> bool {
        if self.written.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(sender) = self.sender.lock().take() {
            // The reader may have gone away (client disconnected); the write
            // still counts as the one terminal write.
            let _ = sender.send(payload);
        }
        true
    }

    fn is_written(&self) -> bool {
        self.written.load(Ordering::SeqCst)
    }
}

/// Resolves with the payload written to the paired [`OneShotSink`], or
/// `None` if the sink was dropped without a write.
pub struct PendingResponse {
    receiver: oneshot::Receiver<OutboundPayload>,
}

impl Future for PendingResponse {
    type Output = Option<OutboundPayload>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(Result::ok)
    }
}

/// Raw payload handed over by a transport.
#[derive(Debug, Clone)]
pub struct InboundPayload {
    pub content_type: Option<String>,
    pub body: Bytes,
    pub context: CallContext,
}

impl InboundPayload {
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            body: body.into(),
            context: CallContext::default(),
        }
    }

    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }
}

/// Seam between a transport and the dispatch engine.
///
/// Implementations must write exactly one payload to `sink` for every
/// inbound payload; they may keep working after the write (notifications).
#[async_trait]
pub trait PayloadHandler: Send + Sync + 'static {
    async fn handle_payload(&self, payload: InboundPayload, sink: Arc<dyn ResponseSink>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headers_are_case_insensitive() {
        let ctx = CallContext::from_header_pairs([("X-Api-Token", "secret")]);
        assert_eq!(ctx.header("x-api-token"), Some("secret"));
        assert_eq!(ctx.header("X-API-TOKEN"), Some("secret"));
        assert_eq!(ctx.header("missing"), None);
    }

    #[test]
    fn test_cookie_header_is_split() {
        let ctx = CallContext::new().with_header("Cookie", "AuthToken=abc; theme=\"dark\"; junk");
        assert_eq!(ctx.cookie("AuthToken"), Some("abc"));
        assert_eq!(ctx.cookie("theme"), Some("dark"));
        assert_eq!(ctx.cookie("junk"), None);
    }

    #[tokio::test]
    async fn test_one_shot_sink_accepts_a_single_write() {
        let (sink, pending) = OneShotSink::channel();
        let first = OutboundPayload::Single(JsonRpcResponse::notification_ack());
        let second = OutboundPayload::Batch(ResponseBatch::new());

        assert!(!sink.is_written());
        assert!(sink.write(first.clone()));
        assert!(!sink.write(second));
        assert!(sink.is_written());

        assert_eq!(pending.await, Some(first));
    }

    #[tokio::test]
    async fn test_dropped_sink_resolves_to_none() {
        let (sink, pending) = OneShotSink::channel();
        drop(sink);
        assert_eq!(pending.await, None);
    }

    #[test]
    fn test_outbound_payload_bytes() {
        let payload = OutboundPayload::Batch(ResponseBatch::new());
        assert_eq!(&payload.to_bytes().unwrap()[..], b"[]");

        let payload = OutboundPayload::Single(JsonRpcResponse::notification_ack());
        let value: serde_json::Value = serde_json::from_slice(&payload.to_bytes().unwrap()).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "result": null, "error": null}));
    }
}
