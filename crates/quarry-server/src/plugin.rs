//! Service plugins
//!
//! A plugin is a named [`DispatchHook`] that is also told when the service
//! starts and stops listening.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use quarry_json_rpc::{JsonRpcRequest, JsonRpcResponse};

use crate::hooks::{CallFailure, DispatchHook, HookError};
use crate::service::ServiceSpecs;

#[async_trait]
#[allow(unused_variables)]
pub trait Plugin: DispatchHook {
    /// Unique, non-empty plugin name
    fn name(&self) -> &str;

    async fn on_service_start(&self, specs: &ServiceSpecs) -> Result<(), HookError> {
        Ok(())
    }

    async fn on_service_stop(&self) -> Result<(), HookError> {
        Ok(())
    }
}

/// Lets a plugin sit in the dispatcher's hook chain
pub(crate) struct PluginHook(pub(crate) Arc<dyn Plugin>);

#[async_trait]
impl DispatchHook for PluginHook {
    async fn before_call(&self, request: &JsonRpcRequest) -> Result<(), HookError> {
        self.0.before_call(request).await
    }

    async fn after_call(
        &self,
        request: &JsonRpcRequest,
        response: &JsonRpcResponse,
        elapsed: Duration,
    ) -> Result<(), HookError> {
        self.0.after_call(request, response, elapsed).await
    }

    async fn on_internal_error(
        &self,
        request: &JsonRpcRequest,
        failure: &CallFailure,
    ) -> Result<(), HookError> {
        self.0.on_internal_error(request, failure).await
    }
}
