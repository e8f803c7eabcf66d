//! # HTTP transport for Quarry services
//!
//! Serves a single JSON-RPC endpoint over HTTP/1.1 and hands every POSTed
//! payload to a [`PayloadHandler`](quarry_json_rpc::PayloadHandler).
//!
//! ## Features
//! - One task per connection on the current tokio runtime
//! - `405 Method not allowed` for anything but POST on the endpoint
//! - Request body size limit
//! - Headers and cookies exposed to the engine as a
//!   [`CallContext`](quarry_json_rpc::CallContext)

pub mod handler;
pub mod server;

// Re-export main types
pub use handler::RpcHttpHandler;
pub use server::{HttpRpcServer, HttpRpcServerBuilder, ServerConfig};

/// Result type for HTTP transport operations
pub type Result<T> = std::result::Result<T, HttpServiceError>;

/// HTTP transport errors
#[derive(Debug, thiserror::Error)]
pub enum HttpServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
