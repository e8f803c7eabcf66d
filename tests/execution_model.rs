//! Blocking bodies on the worker pool, suspending bodies on the event loop

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use common::TestServer;
use quarry_server::{ExposedMethod, Service};
use serde_json::{Value, json};

fn sleepy(workers: usize) -> Service {
    Service::builder()
        .name("sleepy")
        .max_parallel_blocking_tasks(workers)
        .method(
            ExposedMethod::blocking("block", |args| {
                let millis: u64 = args.get("millis")?;
                std::thread::sleep(Duration::from_millis(millis));
                Ok(json!(millis))
            })
            .param("millis"),
        )
        .method(ExposedMethod::suspending("ping", |_| async { Ok(json!("pong")) }))
        .build()
        .unwrap()
}

fn block_batch(count: u64, millis: u64) -> Value {
    Value::Array(
        (0..count)
            .map(|id| json!({"jsonrpc": "2.0", "method": "block", "params": [millis], "id": id}))
            .collect(),
    )
}

#[tokio::test]
async fn test_pool_size_bounds_blocking_work() {
    let server = TestServer::start(sleepy(1)).await;

    let started = Instant::now();
    let body = server.call(block_batch(3, 100)).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
    // a single worker runs the three bodies one after another
    assert!(started.elapsed() >= Duration::from_millis(300));

    server.stop().await;
}

#[tokio::test]
async fn test_event_loop_stays_responsive() {
    let server = TestServer::start(sleepy(1)).await;

    let slow = server.call(block_batch(1, 600));
    let fast = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let started = Instant::now();
        let body = server
            .call(json!({"jsonrpc": "2.0", "method": "ping", "id": "p"}))
            .await;
        (body, started.elapsed())
    };

    let (slow_body, (fast_body, fast_elapsed)) = tokio::join!(slow, fast);
    assert_eq!(slow_body[0]["result"], json!(600));
    assert_eq!(fast_body["result"], json!("pong"));
    assert!(fast_elapsed < Duration::from_millis(400));

    server.stop().await;
}

#[tokio::test]
async fn test_notification_is_acknowledged_before_it_finishes() {
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    let service = Service::builder()
        .name("acks")
        .method(ExposedMethod::blocking("slow_update", move |_| {
            std::thread::sleep(Duration::from_millis(400));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }))
        .build()
        .unwrap();
    let server = TestServer::start(service).await;

    let started = Instant::now();
    let body = server
        .call(json!({"jsonrpc": "2.0", "method": "slow_update"}))
        .await;
    assert_eq!(body, json!({"jsonrpc": "2.0", "result": null, "error": null}));
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(finished.load(Ordering::SeqCst), 0);

    // the call still runs to completion after the ack
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_batch_answer_does_not_wait_for_notifications() {
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    let service = Service::builder()
        .name("batched.acks")
        .method(ExposedMethod::suspending("fast", |_| async { Ok(json!(1)) }))
        .method(ExposedMethod::blocking("slow", move |_| {
            std::thread::sleep(Duration::from_millis(800));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }))
        .build()
        .unwrap();
    let server = TestServer::start(service).await;

    let started = Instant::now();
    let body = server
        .call(json!([
            {"jsonrpc": "2.0", "method": "fast", "id": 1},
            {"jsonrpc": "2.0", "method": "slow"}
        ]))
        .await;
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(
        body,
        json!([{"jsonrpc": "2.0", "result": 1, "error": null, "id": 1}])
    );
    assert_eq!(finished.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_clients() {
    let server = TestServer::start(sleepy(4)).await;

    let calls = (0..16).map(|id| {
        server.call(json!({"jsonrpc": "2.0", "method": "block", "params": {"millis": 10}, "id": id}))
    });
    let bodies = futures::future::join_all(calls).await;

    for (id, body) in bodies.iter().enumerate() {
        assert_eq!(body["id"], json!(id));
        assert_eq!(body["result"], json!(10));
    }

    server.stop().await;
}
