//! Engine-level tests: whole payloads through a built service, no sockets

pub mod batch_tests;
pub mod derive_tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use quarry_json_rpc::{CallContext, InboundPayload};
use serde_json::{Value, json};

use crate::{ExposedMethod, MethodError, Service, ServiceBuilder};

#[derive(Debug, thiserror::Error)]
#[error("division by zero")]
pub(crate) struct ZeroDivisionError;

/// Calculator-style fixture shared by the test modules
pub(crate) fn calculator() -> ServiceBuilder {
    Service::builder()
        .name("test.calculator")
        .max_parallel_blocking_tasks(2)
        .method(
            ExposedMethod::blocking("subtract", |args| {
                let minuend: i64 = args.get("minuend")?;
                let subtrahend: i64 = args.get("subtrahend")?;
                Ok(json!(minuend - subtrahend))
            })
            .param("minuend")
            .param("subtrahend")
            .describe("Subtracts the second number from the first"),
        )
        .method(
            ExposedMethod::blocking("sum", |args| {
                let numbers: Vec<f64> = args.var_args().parse()?;
                Ok(json!(numbers.iter().sum::<f64>()))
            })
            .var_positional(),
        )
        .method(
            ExposedMethod::blocking("divide", |args| {
                let a: i64 = args.get("a")?;
                let b: i64 = args.get("b")?;
                if b == 0 {
                    return Err(ZeroDivisionError.into());
                }
                Ok(json!(a / b))
            })
            .param("a")
            .param("b"),
        )
        .method(
            ExposedMethod::suspending("greet", |args| async move {
                let name: String = args.get("name")?;
                let greeting: String = args.get("greeting")?;
                Ok(json!(format!("{} {}", greeting, name)))
            })
            .param("name")
            .optional_param("greeting", json!("hello")),
        )
        .method(
            ExposedMethod::blocking("explode", |_| -> Result<Value, MethodError> {
                panic!("kaboom")
            }),
        )
        .method(
            ExposedMethod::suspending("explode_later", |_| async {
                if true {
                    panic!("later kaboom");
                }
                Ok(Value::Null)
            }),
        )
        .method(
            ExposedMethod::blocking("options", |args| Ok(args.kw_args().into_value()))
                .var_keyword(),
        )
}

/// Records every call to `update`, which is only ever sent as a notification
pub(crate) fn with_update_counter(builder: ServiceBuilder) -> (ServiceBuilder, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let builder = builder.method(
        ExposedMethod::blocking("update", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        })
        .var_positional()
        .var_keyword(),
    );
    (builder, calls)
}

pub(crate) async fn call(service: &Service, body: Value) -> Value {
    call_raw(service, body.to_string(), CallContext::new()).await
}

pub(crate) async fn call_with(service: &Service, body: Value, context: CallContext) -> Value {
    call_raw(service, body.to_string(), context).await
}

pub(crate) async fn call_raw(service: &Service, body: impl Into<String>, context: CallContext) -> Value {
    let payload = InboundPayload::json(body.into()).with_context(context);
    let answer = service
        .dispatcher()
        .process(payload)
        .await
        .expect("every payload is answered");
    serde_json::to_value(&answer).unwrap()
}

pub(crate) fn error_code(response: &Value) -> Option<i64> {
    response["error"]["code"].as_i64()
}
