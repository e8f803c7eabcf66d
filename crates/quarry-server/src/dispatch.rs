//! Dispatch engine
//!
//! Takes one inbound payload from a transport through
//! parse → route → authorize → bind → execute → respond, and writes exactly
//! one payload back. Single notifications are acknowledged before they run;
//! batch calls run concurrently and answer in one array, and batched
//! notifications run once that array has been written.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use quarry_json_rpc::{
    BatchEntry, CallContext, IncomingMessage, InboundPayload, JsonRpcErrorCode,
    JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse, OneShotSink, OutboundPayload,
    PayloadHandler, RequestBatch, ResponseBatch, ResponseId, ResponseSink,
};

use crate::auth::Authenticator;
use crate::executor::{ExecutionError, WorkerPool, panic_message};
use crate::hooks::{CallFailure, HookChain};
use crate::method::{ExposedMethod, MethodBody, MethodError};
use crate::registry::MethodTable;

/// How a call that reached a method body went wrong
#[derive(Debug, Clone, PartialEq)]
enum CallError {
    InvalidParams(String),
    Internal(CallFailure),
}

impl From<MethodError> for CallError {
    fn from(err: MethodError) -> Self {
        match err {
            MethodError::InvalidParams(reason) => CallError::InvalidParams(reason),
            MethodError::Failed { class, info } => CallError::Internal(CallFailure { class, info }),
        }
    }
}

impl From<ExecutionError> for CallError {
    fn from(err: ExecutionError) -> Self {
        let failure = match err {
            ExecutionError::Panicked(info) => CallFailure {
                class: "Panic".to_string(),
                info,
            },
            other => CallFailure {
                class: "ExecutionError".to_string(),
                info: other.to_string(),
            },
        };
        CallError::Internal(failure)
    }
}

/// `application/json`, optionally with parameters such as a charset
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Routes payloads to registered methods. Immutable once built; every
/// payload is handled independently.
pub struct Dispatcher {
    table: MethodTable,
    authenticator: Authenticator,
    pool: WorkerPool,
    hooks: HookChain,
}

impl Dispatcher {
    pub(crate) fn new(
        table: MethodTable,
        authenticator: Authenticator,
        pool: WorkerPool,
        hooks: HookChain,
    ) -> Self {
        debug!(
            "Dispatcher ready: {} methods, {} workers, {} hooks",
            table.len(),
            pool.size(),
            hooks.len()
        );
        Self {
            table,
            authenticator,
            pool,
            hooks,
        }
    }

    pub fn methods(&self) -> &MethodTable {
        &self.table
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Handle one inbound payload, writing its single terminal payload to
    /// `sink`. Notifications, single or batched, are still running after
    /// the write; this returns only once they have finished.
    pub async fn handle(&self, payload: InboundPayload, sink: &dyn ResponseSink) {
        if !is_json_content_type(payload.content_type.as_deref()) {
            warn!(
                "Rejecting payload with content type {:?}",
                payload.content_type
            );
            sink.write(OutboundPayload::Single(
                JsonRpcErrorCode::InvalidRequest.response(ResponseId::Omitted),
            ));
            return;
        }

        let message = match quarry_json_rpc::parse(&payload.body) {
            Ok(message) => message,
            Err(err) => {
                debug!("Rejecting payload: {}", err);
                sink.write(OutboundPayload::Single(err.to_response()));
                return;
            }
        };

        let context = &payload.context;
        match message {
            IncomingMessage::Single(Err(invalid)) => {
                debug!("{}", invalid);
                sink.write(OutboundPayload::Single(invalid.to_response()));
            }
            IncomingMessage::Single(Ok(request)) if request.is_notification() => {
                sink.write(OutboundPayload::Single(JsonRpcResponse::notification_ack()));
                self.dispatch_request(request, context).await;
            }
            IncomingMessage::Single(Ok(request)) => {
                if let Some(response) = self.dispatch_request(request, context).await {
                    sink.write(OutboundPayload::Single(response));
                }
            }
            IncomingMessage::Batch(batch) => {
                let (mut responses, calls, notifications) = split_batch(batch);
                for response in join_all(calls.into_iter().map(|r| self.dispatch_request(r, context)))
                    .await
                    .into_iter()
                    .flatten()
                {
                    responses.push(response);
                }
                sink.write(OutboundPayload::Batch(responses));

                if !notifications.is_empty() {
                    debug!("Running {} batched notifications after the answer", notifications.len());
                    join_all(notifications.into_iter().map(|r| self.dispatch_request(r, context))).await;
                }
            }
        }
    }

    /// Handle a payload to completion and return what was written.
    pub async fn process(&self, payload: InboundPayload) -> Option<OutboundPayload> {
        let (sink, pending) = OneShotSink::channel();
        self.handle(payload, sink.as_ref()).await;
        drop(sink);
        pending.await
    }

    /// Run every element of a batch concurrently. Notifications contribute
    /// nothing to the result. Unlike [`Dispatcher::handle`], this returns
    /// only once the batched notifications have finished too.
    pub async fn dispatch_batch(&self, batch: RequestBatch, context: &CallContext) -> ResponseBatch {
        debug!(
            "Dispatching batch of {} ({} answers expected)",
            batch.len(),
            batch.expected_responses()
        );

        let (mut responses, calls, notifications) = split_batch(batch);
        let requests = calls.into_iter().chain(notifications);
        for response in join_all(requests.map(|r| self.dispatch_request(r, context)))
            .await
            .into_iter()
            .flatten()
        {
            responses.push(response);
        }
        responses
    }

    /// Route, authorize and execute one request. Returns `None` for
    /// notifications, whose failures are never reported.
    pub async fn dispatch_request(
        &self,
        request: JsonRpcRequest,
        context: &CallContext,
    ) -> Option<JsonRpcResponse> {
        let notification = request.is_notification();
        let id = ResponseId::from(request.id.clone());
        let reply = |code: JsonRpcErrorCode| (!notification).then(|| code.response(id.clone()));

        let Some(method) = self.table.get(&request.method) else {
            debug!(method = %request.method, notification, "Method not found");
            return reply(JsonRpcErrorCode::MethodNotFound);
        };

        if method.is_private() && !self.authenticator.authorize(context) {
            debug!(method = %request.method, notification, "Access denied");
            return reply(JsonRpcErrorCode::AccessDenied);
        }

        if notification {
            if let Err(err) = self.execute(method, &request).await {
                debug!(method = %request.method, "Notification failed silently: {:?}", err);
            }
            return None;
        }

        self.hooks.before_call(&request).await;
        let started = Instant::now();

        let response = match self.execute(method, &request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(CallError::InvalidParams(reason)) => {
                debug!(method = %request.method, "Invalid params: {}", reason);
                JsonRpcErrorCode::InvalidParams.response(id)
            }
            Err(CallError::Internal(failure)) => {
                warn!(
                    method = %request.method,
                    "Method failed with {}: {}", failure.class, failure.info
                );
                self.hooks.on_internal_error(&request, &failure).await;
                JsonRpcResponse::error(
                    id,
                    JsonRpcErrorObject::internal_error(&failure.class, &failure.info),
                )
            }
        };

        let elapsed = started.elapsed();
        debug!(method = %request.method, ?elapsed, "Call finished");
        self.hooks.after_call(&request, &response, elapsed).await;
        Some(response)
    }

    async fn execute(
        &self,
        method: &ExposedMethod,
        request: &JsonRpcRequest,
    ) -> Result<Value, CallError> {
        let args = method
            .get_signature()
            .bind(&request.params)
            .map_err(|err| CallError::InvalidParams(err.to_string()))?;

        let outcome = match method.body() {
            MethodBody::Blocking(body) => {
                let body = Arc::clone(body);
                self.pool.run(move || body(args)).await?
            }
            MethodBody::Suspending(body) => AssertUnwindSafe(async { body(args).await })
                .catch_unwind()
                .await
                .map_err(|panic| {
                    CallError::Internal(CallFailure {
                        class: "Panic".to_string(),
                        info: panic_message(panic),
                    })
                })?,
        };

        Ok(outcome?)
    }
}

/// Canned answers for malformed elements, then the calls and the
/// notifications of a batch
fn split_batch(batch: RequestBatch) -> (ResponseBatch, Vec<JsonRpcRequest>, Vec<JsonRpcRequest>) {
    let mut responses = ResponseBatch::new();
    let mut calls = Vec::new();
    let mut notifications = Vec::new();
    for entry in batch.into_entries() {
        match entry {
            BatchEntry::Invalid(response) => responses.push(response),
            BatchEntry::Request(request) if request.is_notification() => notifications.push(request),
            BatchEntry::Request(request) => calls.push(request),
        }
    }
    (responses, calls, notifications)
}

#[async_trait]
impl PayloadHandler for Dispatcher {
    async fn handle_payload(&self, payload: InboundPayload, sink: Arc<dyn ResponseSink>) {
        self.handle(payload, sink.as_ref()).await;
    }
}
