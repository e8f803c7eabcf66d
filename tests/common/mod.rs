//! Shared helpers: run a service on an ephemeral port and talk to it

#![allow(dead_code)]

use std::sync::Once;

use quarry_server::Service;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A service listening on `127.0.0.1:<ephemeral>` until stopped
pub struct TestServer {
    pub url: String,
    pub base: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<quarry_server::Result<()>>,
}

impl TestServer {
    pub async fn start(service: Service) -> Self {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base = format!("http://{}", addr);
        let url = format!("{}{}", base, service.config().endpoint);

        let (shutdown, signal) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            service
                .serve_with_shutdown(listener, async {
                    let _ = signal.await;
                })
                .await
        });

        Self {
            url,
            base,
            shutdown: Some(shutdown),
            handle,
        }
    }

    pub async fn post(&self, body: &Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(&self.url)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// POST and decode the JSON answer, asserting HTTP 200
    pub async fn call(&self, body: Value) -> Value {
        let response = self.post(&body).await;
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }

    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}
