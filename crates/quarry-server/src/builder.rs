//! Service Builder
//!
//! Collects configuration, methods, modules, credential handling,
//! periodic tasks and plugins, then validates everything at once in [`ServiceBuilder::build`].

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::auth::{Authenticator, HeaderStrategy, TokenValidator, ValidationStrategy};
use crate::config::ServiceConfig;
use crate::dispatch::Dispatcher;
use crate::executor::WorkerPool;
use crate::hooks::{DispatchHook, HookChain};
use crate::method::ExposedMethod;
use crate::periodic::PeriodicTask;
use crate::plugin::{Plugin, PluginHook};
use crate::registry::{MethodContainer, MethodRegistry};
use crate::service::{Service, ServiceSpecs, service_specs_method, service_stats_method};
use crate::stats::CallStats;
use crate::{ConfigurationError, Result};

/// Methods declared directly on the service
struct RootMethods {
    name: String,
    methods: Vec<ExposedMethod>,
}

impl MethodContainer for RootMethods {
    fn container_name(&self) -> &str {
        &self.name
    }

    fn exposed_methods(&self) -> Vec<ExposedMethod> {
        self.methods.clone()
    }
}

/// Builder for services
#[derive(Default)]
pub struct ServiceBuilder {
    config: ServiceConfig,

    /// Methods exposed by the service itself
    methods: Vec<ExposedMethod>,

    /// Modules whose methods are merged into the service
    modules: Vec<Arc<dyn MethodContainer>>,

    strategies: Vec<Arc<dyn ValidationStrategy>>,
    token_validator: Option<TokenValidator>,

    hooks: Vec<Arc<dyn DispatchHook>>,
    plugins: Vec<Arc<dyn Plugin>>,

    periodic_tasks: Vec<PeriodicTask>,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn accessible_at(mut self, url: impl Into<String>) -> Self {
        self.config.accessible_at = Some(url.into());
        self
    }

    pub fn max_parallel_blocking_tasks(mut self, tasks: usize) -> Self {
        self.config.max_parallel_blocking_tasks = tasks;
        self
    }

    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.config.max_body_size = bytes;
        self
    }

    pub fn use_statistics(mut self, enabled: bool) -> Self {
        self.config.use_statistics = enabled;
        self
    }

    /// Replace the whole configuration, e.g. one loaded with
    /// [`ServiceConfig::from_env`]
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn method(mut self, method: impl Into<ExposedMethod>) -> Self {
        self.methods.push(method.into());
        self
    }

    pub fn methods<I, M>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ExposedMethod>,
    {
        self.methods.extend(methods.into_iter().map(Into::into));
        self
    }

    /// Attach a module; its methods are exposed alongside the service's own
    pub fn module<C: MethodContainer + 'static>(mut self, module: C) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    /// Add a strategy for extracting tokens. Strategies are tried in the
    /// order they were added.
    pub fn validation_strategy<S: ValidationStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    /// Decide which tokens grant access to private methods. Without one,
    /// every caller is accepted.
    pub fn token_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.token_validator = Some(Arc::new(validator));
        self
    }

    pub fn hook<H: DispatchHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Run `task` on its interval while the service is serving
    pub fn periodic_task(mut self, task: PeriodicTask) -> Self {
        self.periodic_tasks.push(task);
        self
    }

    pub fn build(self) -> Result<Service> {
        let config = self.config;
        config.validate()?;

        let mut plugin_names = HashSet::new();
        for plugin in &self.plugins {
            let name = plugin.name();
            if name.trim().is_empty() {
                return Err(ConfigurationError::MissingPluginName.into());
            }
            if !plugin_names.insert(name.to_string()) {
                return Err(ConfigurationError::DuplicatePlugin(name.to_string()).into());
            }
        }

        if let Some(task) = self.periodic_tasks.iter().find(|task| task.interval().is_zero()) {
            return Err(ConfigurationError::InvalidPeriodicInterval(task.name().to_string()).into());
        }

        let mut registry = MethodRegistry::new();
        registry.register(&RootMethods {
            name: config.name.clone(),
            methods: self.methods,
        })?;
        for module in &self.modules {
            registry.register(module.as_ref())?;
        }
        let table = registry.freeze()?;

        let stats = config.use_statistics.then(|| Arc::new(CallStats::new()));

        let specs_cell = Arc::new(OnceLock::new());
        let mut builtins = vec![service_specs_method(Arc::clone(&specs_cell))];
        if let Some(stats) = &stats {
            builtins.push(service_stats_method(Arc::clone(stats)));
        }
        let table = table.with_builtins(builtins)?;

        let specs = ServiceSpecs::describe(&config, &table);
        // the cell is fresh, so this cannot already be set
        let _ = specs_cell.set(specs.clone());

        let mut hooks: Vec<Arc<dyn DispatchHook>> = Vec::new();
        if let Some(stats) = &stats {
            hooks.push(stats.clone());
        }
        hooks.extend(self.hooks);
        hooks.extend(
            self.plugins
                .iter()
                .map(|plugin| Arc::new(PluginHook(Arc::clone(plugin))) as Arc<dyn DispatchHook>),
        );

        let authenticator = match self.token_validator {
            Some(validator) => {
                let mut strategies = self.strategies;
                if strategies.is_empty() {
                    debug!(
                        "No validation strategy configured, reading tokens from '{}'",
                        HeaderStrategy::DEFAULT_HEADER
                    );
                    strategies.push(Arc::new(HeaderStrategy::default()));
                }
                Authenticator::new(strategies, validator)
            }
            None => Authenticator::new(self.strategies, Arc::new(|_: Option<&str>| true)),
        };

        let pool = WorkerPool::new(config.max_parallel_blocking_tasks);
        let dispatcher = Arc::new(Dispatcher::new(
            table,
            authenticator,
            pool,
            HookChain::new(hooks),
        ));

        info!(
            "Built service '{}' with {} methods ({} modules, {} plugins, {} periodic tasks)",
            config.name,
            specs.methods.len(),
            self.modules.len(),
            self.plugins.len(),
            self.periodic_tasks.len()
        );

        Ok(Service {
            config,
            specs,
            dispatcher,
            plugins: self.plugins,
            stats,
            periodic_tasks: self.periodic_tasks,
        })
    }
}
