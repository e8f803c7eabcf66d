//! The running service: specs, built-in methods and lifecycle

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::builder::ServiceBuilder;
use crate::config::ServiceConfig;
use crate::dispatch::Dispatcher;
use crate::method::ExposedMethod;
use crate::periodic::{PeriodicScheduler, PeriodicTask};
use crate::plugin::Plugin;
use crate::registry::MethodTable;
use crate::stats::{CallStats, StatsSnapshot};
use crate::{Result, ServiceError};

pub const SERVICE_SPECS_METHOD: &str = "get_service_specs";
pub const SERVICE_STATS_METHOD: &str = "get_service_stats";

/// Self-description returned by `get_service_specs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpecs {
    pub host: String,
    pub port: u16,
    pub accessible_at: String,
    pub name: String,
    pub max_parallel_blocking_tasks: usize,
    /// Exposed method names with their descriptions
    pub methods: BTreeMap<String, Option<String>>,
}

impl ServiceSpecs {
    pub(crate) fn describe(config: &ServiceConfig, table: &MethodTable) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            accessible_at: config.accessible_at(),
            name: config.name.clone(),
            max_parallel_blocking_tasks: config.max_parallel_blocking_tasks,
            methods: table
                .iter()
                .map(|method| {
                    (
                        method.name().to_string(),
                        method.description().map(str::to_string),
                    )
                })
                .collect(),
        }
    }
}

pub(crate) fn service_specs_method(specs: Arc<OnceLock<ServiceSpecs>>) -> ExposedMethod {
    ExposedMethod::suspending(SERVICE_SPECS_METHOD, move |_| {
        let specs = Arc::clone(&specs);
        async move {
            match specs.get() {
                Some(specs) => Ok(serde_json::to_value(specs)?),
                None => Ok(Value::Null),
            }
        }
    })
    .describe("Returns the service name, address, limits and exposed methods")
}

pub(crate) fn service_stats_method(stats: Arc<CallStats>) -> ExposedMethod {
    ExposedMethod::suspending(SERVICE_STATS_METHOD, move |_| {
        let snapshot = stats.snapshot();
        async move { Ok(serde_json::to_value(snapshot)?) }
    })
    .describe("Returns per-method call statistics")
}

/// A built service, ready to serve
pub struct Service {
    pub(crate) config: ServiceConfig,
    pub(crate) specs: ServiceSpecs,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) plugins: Vec<Arc<dyn Plugin>>,
    pub(crate) stats: Option<Arc<CallStats>>,
    pub(crate) periodic_tasks: Vec<PeriodicTask>,
}

impl Service {
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn specs(&self) -> &ServiceSpecs {
        &self.specs
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// `None` unless statistics are enabled
    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.stats.as_ref().map(|stats| stats.snapshot())
    }

    pub fn plugin(&self, name: &str) -> Result<Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .find(|plugin| plugin.name() == name)
            .cloned()
            .ok_or_else(|| ServiceError::PluginNotFound(name.to_string()))
    }

    pub fn periodic_tasks(&self) -> &[PeriodicTask] {
        &self.periodic_tasks
    }

    /// Start every periodic task on the current runtime, sharing the
    /// dispatcher's worker pool
    pub fn start_periodic_tasks(&self) -> PeriodicScheduler {
        PeriodicScheduler::start(&self.periodic_tasks, self.dispatcher.pool())
    }

    pub(crate) async fn notify_start(&self) {
        for plugin in &self.plugins {
            if let Err(err) = plugin.on_service_start(&self.specs).await {
                warn!("Plugin '{}' failed on start: {}", plugin.name(), err);
            }
        }
    }

    pub(crate) async fn notify_stop(&self) {
        for plugin in &self.plugins {
            if let Err(err) = plugin.on_service_stop().await {
                warn!("Plugin '{}' failed on stop: {}", plugin.name(), err);
            }
        }
    }
}

#[cfg(feature = "http")]
mod http {
    use super::*;
    use quarry_http_server::HttpRpcServer;
    use tokio::net::TcpListener;

    impl Service {
        pub fn http_server(&self) -> Result<HttpRpcServer> {
            let server = HttpRpcServer::builder()
                .rpc_path(self.config.endpoint.clone())
                .max_body_size(self.config.max_body_size)
                .handler(self.dispatcher.clone())
                .build()?;
            Ok(server)
        }

        /// Bind the configured host and port and serve until the process ends
        pub async fn run(&self) -> Result<()> {
            let listener = TcpListener::bind(self.config.bind_address()?).await?;
            self.serve(listener).await
        }

        pub async fn serve(&self, listener: TcpListener) -> Result<()> {
            self.serve_with_shutdown(listener, std::future::pending())
                .await
        }

        /// Serve on `listener` until `shutdown` resolves. Plugins hear about
        /// the start before the first accept and about the stop afterwards.
        /// Periodic tasks run in between.
        pub async fn serve_with_shutdown<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
        where
            F: Future<Output = ()>,
        {
            let server = self.http_server()?;
            self.notify_start().await;
            info!(
                "Service '{}' accessible at {} ({} methods, {} workers)",
                self.config.name,
                self.specs.accessible_at,
                self.specs.methods.len(),
                self.config.max_parallel_blocking_tasks
            );

            let periodic = self.start_periodic_tasks();
            let result = server.serve_with_shutdown(listener, shutdown).await;
            periodic.shutdown().await;
            self.notify_stop().await;
            result.map_err(ServiceError::from)
        }

        /// Blocking entry point: runs the service on a single-threaded event
        /// loop until Ctrl-C.
        pub fn start(self) -> Result<()> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async {
                let listener = TcpListener::bind(self.config.bind_address()?).await?;
                self.serve_with_shutdown(listener, async {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        warn!("Unable to listen for Ctrl-C: {}", err);
                        std::future::pending::<()>().await;
                    }
                })
                .await
            })
        }
    }
}
