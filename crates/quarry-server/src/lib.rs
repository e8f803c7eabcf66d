//! # Quarry Service Framework
//!
//! Build JSON-RPC 2.0 microservices: declare methods, group them in modules,
//! protect some behind a credential token, run periodic tasks alongside, and
//! serve them over HTTP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quarry_server::{ExposedMethod, Service};
//! use serde_json::json;
//!
//! fn main() -> quarry_server::Result<()> {
//!     let service = Service::builder()
//!         .name("calculator")
//!         .port(8000)
//!         .method(
//!             ExposedMethod::blocking("subtract", |args| {
//!                 let a: f64 = args.get("a")?;
//!                 let b: f64 = args.get("b")?;
//!                 Ok(json!(a - b))
//!             })
//!             .param("a")
//!             .param("b"),
//!         )
//!         .build()?;
//!
//!     service.start()
//! }
//! ```
//!
//! ## Features
//!
//! - `http` (default): serve through `quarry-http-server`

// Lets `#[exposed_method]` output name this crate from its own tests
extern crate self as quarry_server;

pub mod auth;
pub mod binding;
pub mod builder;
pub mod config;
pub mod dispatch;
pub mod executor;
pub mod hooks;
pub mod method;
pub mod periodic;
pub mod plugin;
pub mod prelude;
pub mod registry;
pub mod service;
pub mod stats;

#[cfg(test)]
mod tests;

pub use auth::{Authenticator, CookieStrategy, HeaderStrategy, TokenValidator, ValidationStrategy};
pub use binding::{BindError, BoundArgs, KwArgs, Parameter, Signature, VarArgs};
pub use builder::ServiceBuilder;
pub use config::ServiceConfig;
pub use dispatch::{Dispatcher, is_json_content_type};
pub use executor::{ExecutionError, WorkerPool};
pub use hooks::{CallFailure, DispatchHook, HookError};
pub use method::{ExposedMethod, MethodBody, MethodError, MethodResult, Visibility};
pub use periodic::{PeriodicScheduler, PeriodicTask, TaskBody};
pub use plugin::Plugin;
pub use registry::{MethodContainer, MethodRegistry, MethodTable, Module, RegistryError};
pub use service::{SERVICE_SPECS_METHOD, SERVICE_STATS_METHOD, Service, ServiceSpecs};
pub use stats::{CallStats, MethodStats, StatsSnapshot};

pub use quarry_json_rpc;

#[cfg(feature = "http")]
pub use quarry_http_server;

/// Result type for framework operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Problems found while assembling a service. All of them are fatal at
/// start-up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Service name is required")]
    MissingName,

    #[error("max_parallel_blocking_tasks must be at least 1")]
    InvalidMaxParallelBlockingTasks,

    #[error("Endpoint '{0}' must start with '/'")]
    InvalidEndpoint(String),

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("Periodic task '{0}' needs a non-zero interval")]
    InvalidPeriodicInterval(String),

    #[error("Plugin name must not be empty")]
    MissingPluginName,

    #[error("Plugin '{0}' is already registered")]
    DuplicatePlugin(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Framework-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("No plugin named '{0}'")]
    PluginNotFound(String),

    #[cfg(feature = "http")]
    #[error("HTTP transport error: {0}")]
    Http(#[from] quarry_http_server::HttpServiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        ServiceError::Configuration(err.into())
    }
}
