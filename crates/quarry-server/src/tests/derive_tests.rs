//! Methods declared with `#[exposed_method]`

use quarry_derive::exposed_method;
use serde_json::json;

use super::{ZeroDivisionError, call, call_with, error_code};
use crate::{ExposedMethod, HeaderStrategy, KwArgs, MethodError, Module, Service, VarArgs};

/// Subtracts the second number from the first
#[exposed_method]
fn subtract(minuend: i64, subtrahend: i64) -> i64 {
    minuend - subtrahend
}

#[exposed_method(name = "math.divide", description = "Integer division")]
fn divide(a: i64, b: i64) -> Result<i64, ZeroDivisionError> {
    if b == 0 {
        return Err(ZeroDivisionError);
    }
    Ok(a / b)
}

#[exposed_method]
async fn greet(name: String, greeting: Option<String>) -> String {
    format!("{} {}", greeting.as_deref().unwrap_or("hello"), name)
}

#[exposed_method]
fn collect(first: i64, rest: VarArgs, options: KwArgs) -> Result<serde_json::Value, MethodError> {
    let rest: Vec<i64> = rest.parse()?;
    Ok(json!({"first": first, "rest": rest, "options": options.into_value()}))
}

#[exposed_method(private)]
fn reset() {}

fn service() -> Service {
    Service::builder()
        .name("derived")
        .method(SubtractMethod)
        .method(DivideMethod)
        .method(GreetMethod)
        .module(Module::new("extras").method(CollectMethod).method(ResetMethod))
        .validation_strategy(HeaderStrategy::default())
        .token_validator(|token: Option<&str>| token == Some("t0ken"))
        .build()
        .unwrap()
}

#[test]
fn test_generated_metadata() {
    let method = ExposedMethod::from(SubtractMethod);
    assert_eq!(method.name(), "subtract");
    assert_eq!(
        method.description(),
        Some("Subtracts the second number from the first")
    );
    assert!(method.body().is_blocking());
    let names: Vec<_> = method.get_signature().params().iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["minuend", "subtrahend"]);

    let method = ExposedMethod::from(DivideMethod);
    assert_eq!(method.name(), "math.divide");
    assert_eq!(method.member_name(), "divide");
    assert_eq!(method.description(), Some("Integer division"));

    let method = ExposedMethod::from(GreetMethod);
    assert!(!method.body().is_blocking());
    assert!(!method.get_signature().params()[1].is_required());

    let method = ExposedMethod::from(CollectMethod);
    assert!(method.get_signature().accepts_var_positional());
    assert!(method.get_signature().accepts_var_keyword());

    assert!(ExposedMethod::from(ResetMethod).is_private());
}

#[tokio::test]
async fn test_derived_methods_dispatch() {
    let service = service();

    let response = call(
        &service,
        json!({"jsonrpc": "2.0", "method": "subtract", "params": {"minuend": 42, "subtrahend": 23}, "id": 1}),
    )
    .await;
    assert_eq!(response["result"], json!(19));

    let response = call(
        &service,
        json!({"jsonrpc": "2.0", "method": "math.divide", "params": [7, 0], "id": 2}),
    )
    .await;
    assert_eq!(error_code(&response), Some(-32603));
    assert_eq!(response["error"]["data"]["class"], json!("ZeroDivisionError"));

    let response = call(
        &service,
        json!({"jsonrpc": "2.0", "method": "greet", "params": ["ada"], "id": 3}),
    )
    .await;
    assert_eq!(response["result"], json!("hello ada"));

    let response = call(
        &service,
        json!({"jsonrpc": "2.0", "method": "collect", "params": [1, 2, 3], "id": 4}),
    )
    .await;
    assert_eq!(
        response["result"],
        json!({"first": 1, "rest": [2, 3], "options": {}})
    );

    let response = call(
        &service,
        json!({"jsonrpc": "2.0", "method": "collect", "params": {"first": 1, "verbose": true}, "id": 5}),
    )
    .await;
    assert_eq!(
        response["result"],
        json!({"first": 1, "rest": [], "options": {"verbose": true}})
    );
}

#[tokio::test]
async fn test_derived_private_method() {
    let service = service();
    let request = json!({"jsonrpc": "2.0", "method": "reset", "id": 1});

    let response = call(&service, request.clone()).await;
    assert_eq!(error_code(&response), Some(-32001));

    let ctx = quarry_json_rpc::CallContext::new().with_header("X-Api-Token", "t0ken");
    let response = call_with(&service, request, ctx).await;
    assert_eq!(response["result"], json!(null));
    assert_eq!(response["error"], json!(null));
}

#[tokio::test]
async fn test_derived_conversion_failure_is_invalid_params() {
    let service = service();
    let response = call(
        &service,
        json!({"jsonrpc": "2.0", "method": "subtract", "params": ["forty", 2], "id": 1}),
    )
    .await;
    assert_eq!(error_code(&response), Some(-32602));
}
