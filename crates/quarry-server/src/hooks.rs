//! Observation hooks around method calls
//!
//! Hooks see every non-notification call that reached a registered method.
//! They receive shared references only and cannot change the outcome; an
//! error or panic inside a hook is logged and otherwise ignored.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tracing::warn;

use quarry_json_rpc::{JsonRpcRequest, JsonRpcResponse};

use crate::executor::panic_message;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Hook '{hook}' failed: {message}")]
pub struct HookError {
    pub hook: String,
    pub message: String,
}

impl HookError {
    pub fn new(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

/// The failure behind an internal-error response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    pub class: String,
    pub info: String,
}

/// Extension points around each dispatched call. All methods default to no-ops.
#[async_trait]
#[allow(unused_variables)]
pub trait DispatchHook: Send + Sync {
    /// Called after routing and authorization, before the body runs
    async fn before_call(&self, request: &JsonRpcRequest) -> Result<(), HookError> {
        Ok(())
    }

    /// Called with the response that will be sent
    async fn after_call(
        &self,
        request: &JsonRpcRequest,
        response: &JsonRpcResponse,
        elapsed: Duration,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Called when the body failed in a way that becomes an internal error
    async fn on_internal_error(
        &self,
        request: &JsonRpcRequest,
        failure: &CallFailure,
    ) -> Result<(), HookError> {
        Ok(())
    }
}

/// Ordered hook list that shields the engine from misbehaving hooks
#[derive(Clone, Default)]
pub(crate) struct HookChain {
    hooks: Vec<Arc<dyn DispatchHook>>,
}

impl HookChain {
    pub(crate) fn new(hooks: Vec<Arc<dyn DispatchHook>>) -> Self {
        Self { hooks }
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) async fn before_call(&self, request: &JsonRpcRequest) {
        for hook in &self.hooks {
            isolate("before_call", hook.before_call(request)).await;
        }
    }

    pub(crate) async fn after_call(
        &self,
        request: &JsonRpcRequest,
        response: &JsonRpcResponse,
        elapsed: Duration,
    ) {
        for hook in &self.hooks {
            isolate("after_call", hook.after_call(request, response, elapsed)).await;
        }
    }

    pub(crate) async fn on_internal_error(&self, request: &JsonRpcRequest, failure: &CallFailure) {
        for hook in &self.hooks {
            isolate("on_internal_error", hook.on_internal_error(request, failure)).await;
        }
    }
}

async fn isolate<F>(stage: &str, hook: F)
where
    F: std::future::Future<Output = Result<(), HookError>>,
{
    match AssertUnwindSafe(hook).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!("{} hook returned an error: {}", stage, err),
        Err(panic) => warn!("{} hook panicked: {}", stage, panic_message(panic)),
    }
}
