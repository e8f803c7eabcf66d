//! Prelude module for common service imports
//!
//! ```rust
//! use quarry_server::prelude::*;
//! ```

pub use quarry_json_rpc::prelude::*;

pub use crate::{
    BoundArgs, CookieStrategy, DispatchHook, ExposedMethod, HeaderStrategy, KwArgs, MethodError,
    MethodResult, Module, PeriodicTask, Plugin, Service, ServiceBuilder, ServiceConfig, VarArgs,
};
