//! Request handling for the JSON-RPC endpoint

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::header::{ALLOW, CONTENT_TYPE, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use tracing::{debug, error, warn};

use quarry_json_rpc::{
    CallContext, InboundPayload, JsonRpcErrorCode, JsonRpcErrorObject, JsonRpcResponse,
    OneShotSink, PayloadHandler, ResponseId,
};

use crate::server::ServerConfig;

/// Routes HTTP requests to the payload handler and turns the single
/// engine-written payload back into an HTTP response.
#[derive(Clone)]
pub struct RpcHttpHandler {
    config: Arc<ServerConfig>,
    handler: Arc<dyn PayloadHandler>,
}

impl RpcHttpHandler {
    pub fn new(config: Arc<ServerConfig>, handler: Arc<dyn PayloadHandler>) -> Self {
        Self { config, handler }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn handle<B>(&self, req: Request<B>, peer: Option<SocketAddr>) -> Response<Full<Bytes>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!("Handling {} {}", method, path);

        if path != self.config.rpc_path {
            return plain_response(StatusCode::NOT_FOUND, "Not Found");
        }
        if method != Method::POST {
            return self.method_not_allowed();
        }

        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(str::to_string);

        let mut context = CallContext::from_header_pairs(
            req.headers()
                .iter()
                .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
        );
        if let Some(peer) = peer {
            context = context.with_peer(peer);
        }

        let body = match Limited::new(req.into_body(), self.config.max_body_size)
            .collect()
            .await
        {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                warn!(
                    "Request body exceeds {} bytes, rejecting",
                    self.config.max_body_size
                );
                return plain_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
            }
            Err(err) => {
                error!("Failed to read request body: {}", err);
                return plain_response(StatusCode::BAD_REQUEST, "Bad Request");
            }
        };

        let payload = InboundPayload {
            content_type,
            body,
            context,
        };

        // The engine keeps running after the write for notifications, so it
        // gets its own task and we only wait for the first payload.
        let (sink, pending) = OneShotSink::channel();
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            handler.handle_payload(payload, sink).await;
        });

        let response = match pending.await {
            Some(payload) => payload.to_bytes(),
            None => {
                error!("Payload handler finished without writing a response");
                serde_json::to_vec(&JsonRpcErrorCode::InternalError.response(ResponseId::Omitted))
                    .map(Bytes::from)
            }
        };

        match response {
            Ok(bytes) => json_response(StatusCode::OK, bytes),
            Err(err) => {
                error!("Failed to serialize response: {}", err);
                plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    fn method_not_allowed(&self) -> Response<Full<Bytes>> {
        let body = JsonRpcResponse::error(
            ResponseId::Omitted,
            JsonRpcErrorObject {
                code: 405,
                message: "Method not allowed".to_string(),
                data: None,
            },
        );
        let bytes = serde_json::to_vec(&body).map(Bytes::from).unwrap_or_default();
        let mut response = json_response(StatusCode::METHOD_NOT_ALLOWED, bytes);
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("POST"));
        response
    }
}

fn json_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}
