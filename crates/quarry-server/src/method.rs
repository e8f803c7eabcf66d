//! Exposed methods: what a service offers to its callers
//!
//! An [`ExposedMethod`] pairs a resolved name and visibility with a
//! declared [`Signature`] and a [`MethodBody`]. Bodies are either blocking
//! (run on the worker pool) or suspending (awaited on the event loop).

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::binding::{BoundArgs, Signature};

/// Outcome of a method body
pub type MethodResult = Result<Value, MethodError>;

pub type BlockingFn = dyn Fn(BoundArgs) -> MethodResult + Send + Sync;
pub type SuspendingFn = dyn Fn(BoundArgs) -> BoxFuture<'static, MethodResult> + Send + Sync;

/// Failure raised by a method body.
///
/// Any `std::error::Error` converts into [`MethodError::Failed`] with the
/// error's type name as `class`, so bodies can use `?` freely.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodError {
    /// The arguments bound but could not be used; answered as invalid params.
    InvalidParams(String),
    /// Anything else; answered as an internal error carrying class and info.
    Failed { class: String, info: String },
}

impl MethodError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        MethodError::InvalidParams(message.into())
    }

    pub fn failed(class: impl Into<String>, info: impl Into<String>) -> Self {
        MethodError::Failed {
            class: class.into(),
            info: info.into(),
        }
    }

    pub fn class(&self) -> &str {
        match self {
            MethodError::InvalidParams(_) => "InvalidParams",
            MethodError::Failed { class, .. } => class,
        }
    }

    pub fn info(&self) -> &str {
        match self {
            MethodError::InvalidParams(info) | MethodError::Failed { info, .. } => info,
        }
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodError::InvalidParams(message) => write!(f, "Invalid params: {}", message),
            MethodError::Failed { class, info } => write!(f, "{}: {}", class, info),
        }
    }
}

impl<E> From<E> for MethodError
where
    E: std::error::Error,
{
    fn from(err: E) -> Self {
        MethodError::Failed {
            class: short_type_name::<E>().to_string(),
            info: err.to_string(),
        }
    }
}

/// `core::num::error::ParseIntError` -> `ParseIntError`
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Whether a method requires an accepted credential token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Executable body of an exposed method
#[derive(Clone)]
pub enum MethodBody {
    /// Runs on the bounded worker pool
    Blocking(Arc<BlockingFn>),
    /// Awaited directly on the event loop
    Suspending(Arc<SuspendingFn>),
}

impl MethodBody {
    pub fn is_blocking(&self) -> bool {
        matches!(self, MethodBody::Blocking(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MethodBody::Blocking(_) => "blocking",
            MethodBody::Suspending(_) => "suspending",
        }
    }
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodBody::{}", self.kind())
    }
}

/// A method registered with a service
#[derive(Debug, Clone)]
pub struct ExposedMethod {
    member_name: String,
    exposed_as: Option<String>,
    description: Option<String>,
    visibility: Visibility,
    signature: Signature,
    body: MethodBody,
}

impl ExposedMethod {
    /// Method whose body runs on the worker pool
    pub fn blocking<F>(member_name: impl Into<String>, body: F) -> Self
    where
        F: Fn(BoundArgs) -> MethodResult + Send + Sync + 'static,
    {
        Self::with_body(member_name, MethodBody::Blocking(Arc::new(body)))
    }

    /// Method whose body is awaited on the event loop
    pub fn suspending<F, Fut>(member_name: impl Into<String>, body: F) -> Self
    where
        F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        Self::with_body(
            member_name,
            MethodBody::Suspending(Arc::new(move |args| body(args).boxed())),
        )
    }

    pub fn with_body(member_name: impl Into<String>, body: MethodBody) -> Self {
        Self {
            member_name: member_name.into(),
            exposed_as: None,
            description: None,
            visibility: Visibility::Public,
            signature: Signature::default(),
            body,
        }
    }

    /// Expose under a different name than the member's own
    pub fn exposed_as(mut self, name: impl Into<String>) -> Self {
        self.exposed_as = Some(name.into());
        self
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn public(mut self) -> Self {
        self.visibility = Visibility::Public;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.signature = self.signature.param(name);
        self
    }

    pub fn optional_param(mut self, name: impl Into<String>, default: Value) -> Self {
        self.signature = self.signature.optional_param(name, default);
        self
    }

    pub fn var_positional(mut self) -> Self {
        self.signature = self.signature.var_positional();
        self
    }

    pub fn var_keyword(mut self) -> Self {
        self.signature = self.signature.var_keyword();
        self
    }

    /// The name callers use: the override if one was given, else the member name
    pub fn name(&self) -> &str {
        self.exposed_as.as_deref().unwrap_or(&self.member_name)
    }

    pub fn member_name(&self) -> &str {
        &self.member_name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }

    pub fn get_signature(&self) -> &Signature {
        &self.signature
    }

    pub fn body(&self) -> &MethodBody {
        &self.body
    }
}
