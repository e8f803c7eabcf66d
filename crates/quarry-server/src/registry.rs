//! Method registry
//!
//! Collects exposed methods from the service and its modules at start-up,
//! validates names, and freezes them into an immutable [`MethodTable`] that
//! dispatches read without locking.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::method::ExposedMethod;

static METHOD_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9._]*$").expect("method name pattern is a valid regex")
});

/// Fatal start-up errors found while registering methods
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error(
        "Invalid method name '{0}': must start with a letter and contain only letters, digits, '.' and '_'"
    )]
    InvalidName(String),

    #[error("Method '{0}' is already registered")]
    DuplicateName(String),

    #[error("No methods are exposed")]
    NoMethods,
}

pub fn is_valid_method_name(name: &str) -> bool {
    METHOD_NAME.is_match(name)
}

/// Anything that contributes exposed methods: the service itself or a module
pub trait MethodContainer: Send + Sync {
    /// Identity used to make registration idempotent
    fn container_name(&self) -> &str;

    fn exposed_methods(&self) -> Vec<ExposedMethod>;
}

/// A named group of methods attached to a service
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    methods: Vec<ExposedMethod>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
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
}

impl MethodContainer for Module {
    fn container_name(&self) -> &str {
        &self.name
    }

    fn exposed_methods(&self) -> Vec<ExposedMethod> {
        self.methods.clone()
    }
}

/// Mutable registration phase
#[derive(Debug, Default)]
pub struct MethodRegistry {
    methods: HashMap<String, ExposedMethod>,
    containers: HashSet<String>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every method of `container`. Registering the same container
    /// twice is a no-op.
    pub fn register(&mut self, container: &dyn MethodContainer) -> Result<(), RegistryError> {
        let container_name = container.container_name();
        if !self.containers.insert(container_name.to_string()) {
            debug!("Container '{}' already registered, skipping", container_name);
            return Ok(());
        }

        for method in container.exposed_methods() {
            debug!(
                "Registering {} method '{}' from '{}' ({:?})",
                method.body().kind(),
                method.name(),
                container_name,
                method.visibility()
            );
            self.insert(method)?;
        }
        Ok(())
    }

    pub fn insert(&mut self, method: ExposedMethod) -> Result<(), RegistryError> {
        let name = method.name();
        if !is_valid_method_name(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if self.methods.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        self.methods.insert(name.to_string(), method);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// End registration. A registry without methods is a configuration error.
    pub fn freeze(self) -> Result<MethodTable, RegistryError> {
        if self.methods.is_empty() {
            return Err(RegistryError::NoMethods);
        }
        Ok(MethodTable {
            methods: Arc::new(self.methods),
        })
    }
}

/// Immutable name → method lookup shared by all dispatches
#[derive(Debug, Clone)]
pub struct MethodTable {
    methods: Arc<HashMap<String, ExposedMethod>>,
}

impl MethodTable {
    pub fn get(&self, name: &str) -> Option<&ExposedMethod> {
        self.methods.get(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Methods sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &ExposedMethod> {
        let mut methods: Vec<_> = self.methods.values().collect();
        methods.sort_by(|a, b| a.name().cmp(b.name()));
        methods.into_iter()
    }

    /// Add built-in methods after the user registration pass
    pub(crate) fn with_builtins(
        self,
        builtins: impl IntoIterator<Item = ExposedMethod>,
    ) -> Result<Self, RegistryError> {
        let mut registry = MethodRegistry {
            methods: Arc::unwrap_or_clone(self.methods),
            containers: HashSet::new(),
        };
        for method in builtins {
            registry.insert(method)?;
        }
        registry.freeze()
    }
}
