//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Router};
use serde_json::Value;
use tokio::net::TcpListener;

type Responder = dyn Fn(usize) -> StatusCode + Send + Sync;

#[derive(Clone)]
struct CollectorState {
    payloads: Arc<Mutex<Vec<Value>>>,
    attempts: Arc<AtomicUsize>,
    respond: Arc<Responder>,
}

/// Mock trace collector accepting `POST /traces`.
pub struct MockCollector {
    pub addr: SocketAddr,
    state: CollectorState,
}

impl MockCollector {
    /// Collector that accepts every batch.
    pub async fn start() -> Self {
        Self::programmable(|_| StatusCode::OK).await
    }

    /// Collector whose status for the n-th request (1-based) is `respond(n)`.
    /// Only payloads answered with 2xx are kept.
    pub async fn programmable<F>(respond: F) -> Self
    where
        F: Fn(usize) -> StatusCode + Send + Sync + 'static,
    {
        let state = CollectorState {
            payloads: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            respond: Arc::new(respond),
        };

        let app = Router::new()
            .route("/traces", post(receive))
            .with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}/traces", self.addr)
    }

    pub fn attempts(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.state.payloads.lock().unwrap().clone()
    }

    /// Every accepted span, in arrival order.
    pub fn spans(&self) -> Vec<Value> {
        self.payloads()
            .iter()
            .flat_map(|p| p["spans"].as_array().cloned().unwrap_or_default())
            .collect()
    }

    /// Poll until at least `count` spans arrived or `limit` elapses.
    pub async fn wait_for_spans(&self, count: usize, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if self.spans().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.spans().len() >= count
    }
}

async fn receive(State(state): State<CollectorState>, body: Bytes) -> StatusCode {
    let attempt = state.attempts.fetch_add(1, Ordering::SeqCst) + 1;
    let status = (state.respond)(attempt);
    if status.is_success() {
        if let Ok(payload) = serde_json::from_slice::<Value>(&body) {
            state.payloads.lock().unwrap().push(payload);
        }
    }
    status
}

/// Serve `router` on an ephemeral port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
