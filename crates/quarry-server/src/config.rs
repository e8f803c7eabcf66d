//! Service configuration
//!
//! Every service owns its own [`ServiceConfig`]; defaults come from
//! [`Default`] and may be overridden from a deserialized file, from
//! environment variables, or through the builder.

use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigurationError;
use crate::executor::WorkerPool;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Required, non-empty service name
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Path of the JSON-RPC endpoint
    pub endpoint: String,
    /// Public URL; derived from host, port and endpoint when unset
    pub accessible_at: Option<String>,
    pub max_parallel_blocking_tasks: usize,
    pub max_body_size: usize,
    pub use_statistics: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            endpoint: "/api".to_string(),
            accessible_at: None,
            max_parallel_blocking_tasks: WorkerPool::default_size(),
            max_body_size: 1024 * 1024,
            use_statistics: false,
        }
    }
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn accessible_at(&self) -> String {
        self.accessible_at
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}{}", self.host, self.port, self.endpoint))
    }

    /// Defaults overridden by `{PREFIX}_NAME`, `{PREFIX}_HOST`, `{PREFIX}_PORT`,
    /// `{PREFIX}_ENDPOINT`, `{PREFIX}_ACCESSIBLE_AT`,
    /// `{PREFIX}_MAX_PARALLEL_BLOCKING_TASKS`, `{PREFIX}_MAX_BODY_SIZE` and
    /// `{PREFIX}_USE_STATISTICS`.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigurationError> {
        Self::default().apply_env(prefix)
    }

    pub fn apply_env(self, prefix: &str) -> Result<Self, ConfigurationError> {
        self.apply_vars(prefix, |key| std::env::var(key).ok())
    }

    /// Apply overrides from any key/value source
    pub fn apply_vars<F>(mut self, prefix: &str, lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let key = format!("{}_{}", prefix, suffix);
            lookup(&key).map(|value| (key, value))
        };

        if let Some((_, value)) = var("NAME") {
            self.name = value;
        }
        if let Some((_, value)) = var("HOST") {
            self.host = value;
        }
        if let Some((key, value)) = var("PORT") {
            self.port = parse_var(&key, &value)?;
        }
        if let Some((_, value)) = var("ENDPOINT") {
            self.endpoint = value;
        }
        if let Some((_, value)) = var("ACCESSIBLE_AT") {
            self.accessible_at = Some(value);
        }
        if let Some((key, value)) = var("MAX_PARALLEL_BLOCKING_TASKS") {
            self.max_parallel_blocking_tasks = parse_var(&key, &value)?;
        }
        if let Some((key, value)) = var("MAX_BODY_SIZE") {
            self.max_body_size = parse_var(&key, &value)?;
        }
        if let Some((key, value)) = var("USE_STATISTICS") {
            self.use_statistics = parse_var(&key, &value)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::MissingName);
        }
        if self.max_parallel_blocking_tasks == 0 {
            return Err(ConfigurationError::InvalidMaxParallelBlockingTasks);
        }
        if !self.endpoint.starts_with('/') {
            return Err(ConfigurationError::InvalidEndpoint(self.endpoint.clone()));
        }
        Ok(())
    }

    /// Resolve `host:port` to the address to listen on
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidValue {
            key: "host".to_string(),
            value: format!("{}:{}", self.host, self.port),
        };
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|_| invalid())?
            .next()
            .ok_or_else(invalid)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigurationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigurationError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}
