//! Batch dispatch

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use quarry_json_rpc::{InboundPayload, RequestId};
use serde_json::{Value, json};

use super::{calculator, call, error_code, with_update_counter};
use crate::ExposedMethod;

fn by_id(responses: &Value, id: Value) -> &Value {
    responses
        .as_array()
        .unwrap()
        .iter()
        .find(|response| response["id"] == id)
        .unwrap_or_else(|| panic!("no response with id {id}"))
}

#[tokio::test]
async fn test_empty_batch() {
    let service = calculator().build().unwrap();
    let response = call(&service, json!([])).await;
    assert_eq!(
        response,
        json!({
            "jsonrpc": "2.0",
            "result": null,
            "error": {"code": -32600, "message": "Invalid Request"},
            "id": null
        })
    );
}

#[tokio::test]
async fn test_batch_of_scalars() {
    let service = calculator().build().unwrap();
    let response = call(&service, json!([1, 2, 3])).await;
    let entries = response.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    for entry in entries {
        assert_eq!(
            entry,
            &json!({
                "jsonrpc": "2.0",
                "result": null,
                "error": {"code": -32600, "message": "Invalid Request"},
                "id": null
            })
        );
    }
}

#[tokio::test]
async fn test_mixed_batch() {
    let (builder, calls) = with_update_counter(calculator());
    let service = builder.build().unwrap();

    let response = call(
        &service,
        json!([
            {"jsonrpc": "2.0", "method": "sum", "params": [1, 2, 4], "id": "1"},
            {"jsonrpc": "2.0", "method": "update", "params": [7]},
            {"jsonrpc": "2.0", "method": "subtract", "params": [42, 23], "id": "2"},
            {"foo": "boo"},
            {"jsonrpc": "2.0", "method": "foo.get", "params": {"name": "myself"}, "id": "5"},
            {"jsonrpc": "2.0", "method": "divide", "params": [1, 0], "id": "9"}
        ]),
    )
    .await;

    // one entry per element except the notification
    assert_eq!(response.as_array().unwrap().len(), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(by_id(&response, json!("1"))["result"], json!(7.0));
    assert_eq!(by_id(&response, json!("2"))["result"], json!(19));
    assert_eq!(error_code(by_id(&response, json!(null))), Some(-32600));
    assert_eq!(error_code(by_id(&response, json!("5"))), Some(-32601));
    assert_eq!(error_code(by_id(&response, json!("9"))), Some(-32603));
}

#[tokio::test]
async fn test_all_notification_batch_answers_empty_array() {
    let (builder, calls) = with_update_counter(calculator());
    let service = builder.build().unwrap();

    let response = call(
        &service,
        json!([
            {"jsonrpc": "2.0", "method": "update", "params": [1, 2, 4]},
            {"jsonrpc": "2.0", "method": "update", "params": [7]},
            {"jsonrpc": "2.0", "method": "missing"}
        ]),
    )
    .await;
    assert_eq!(response, json!([]));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_batch_responses_are_addressable_by_id() {
    let service = calculator().build().unwrap();
    let payload = InboundPayload::json(
        json!([
            {"jsonrpc": "2.0", "method": "subtract", "params": [10, 1], "id": 1},
            {"jsonrpc": "2.0", "method": "subtract", "params": [10, 2], "id": 2},
            {"jsonrpc": "2.0", "method": "subtract", "params": [10, 3], "id": "three"}
        ])
        .to_string(),
    );

    let answer = service.dispatcher().process(payload).await.unwrap();
    let batch = answer.as_batch().unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.get(&RequestId::from(2i64)).unwrap().result(), Some(&json!(8)));
    assert_eq!(
        batch.get(&RequestId::from("three")).unwrap().result(),
        Some(&json!(7))
    );
}

#[tokio::test]
async fn test_batch_elements_run_concurrently() {
    let service = calculator()
        .method(ExposedMethod::suspending("nap", |_| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(json!("rested"))
        }))
        .build()
        .unwrap();

    let batch: Vec<Value> = (0..5)
        .map(|id| json!({"jsonrpc": "2.0", "method": "nap", "id": id}))
        .collect();

    let started = Instant::now();
    let response = call(&service, Value::Array(batch)).await;
    assert_eq!(response.as_array().unwrap().len(), 5);
    assert!(started.elapsed() < Duration::from_millis(900));
}

#[tokio::test]
async fn test_batched_notifications_run_after_the_answer() {
    let finished = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = std::sync::Arc::clone(&finished);
    let service = calculator()
        .method(ExposedMethod::blocking("slow_update", move |_| {
            std::thread::sleep(Duration::from_millis(800));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }))
        .build()
        .unwrap();

    let payload = InboundPayload::json(
        json!([
            {"jsonrpc": "2.0", "method": "greet", "params": ["ada"], "id": 1},
            {"jsonrpc": "2.0", "method": "slow_update"}
        ])
        .to_string(),
    );
    let (sink, pending) = quarry_json_rpc::OneShotSink::channel();

    let started = Instant::now();
    let answered = async {
        let answer = pending.await.unwrap();
        (answer, started.elapsed(), finished.load(Ordering::SeqCst))
    };
    let dispatcher = service.dispatcher();
    let ((answer, elapsed, finished_when_answered), ()) =
        tokio::join!(answered, dispatcher.handle(payload, sink.as_ref()));

    let batch = answer.as_batch().unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(
        batch.get(&RequestId::from(1i64)).unwrap().result(),
        Some(&json!("hello ada"))
    );
    assert!(elapsed < Duration::from_millis(500));
    assert_eq!(finished_when_answered, 0);

    // handle returns only once the notification has run
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}
