//! Request failures become error spans; clients see a generic 500.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};
use telemetry_app::config::AppConfig;
use telemetry_app::http::HttpServer;
use telemetry_app::store::Store;
use telemetry_app::telemetry::{
    AttributeValue, BatchConfig, ErrorReporter, InMemoryExporter, Resource, SpanStatus,
    TraceProvider,
};

struct TestApp {
    base: String,
    provider: TraceProvider,
    exporter: Arc<InMemoryExporter>,
}

async fn start_app() -> TestApp {
    let exporter = Arc::new(InMemoryExporter::new());
    let provider = TraceProvider::with_exporter(
        Resource::for_service("test-app", "0.0.0"),
        BatchConfig::default(),
        exporter.clone(),
    );
    let server = HttpServer::new(
        &AppConfig::default(),
        Arc::new(Store::seeded()),
        ErrorReporter::new(provider.tracer("errorTracer")),
    );
    let addr = common::serve(server.router()).await;

    TestApp {
        base: format!("http://{}", addr),
        provider,
        exporter,
    }
}

#[tokio::test]
async fn test_failing_route_reports_one_error_span() {
    let app = start_app().await;

    let response = reqwest::get(format!("{}/users", app.base)).await.unwrap();
    assert_eq!(response.status(), 500);
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Internal Server Error" }));

    app.provider.shutdown().await.unwrap();
    let spans = app.exporter.spans();
    assert_eq!(spans.len(), 1);

    let span = &spans[0];
    assert_eq!(span.scope(), "errorTracer");
    assert_eq!(span.name(), "error");
    assert_eq!(span.status(), SpanStatus::Error);
    assert_eq!(span.attributes().get("route"), Some(&AttributeValue::from("GET /users")));
    assert_eq!(span.attributes().get("errorCode"), Some(&AttributeValue::Int(1)));
    assert_eq!(
        span.attributes().get("component"),
        Some(&AttributeValue::from("errorHandler"))
    );
    match span.attributes().get("errMsg") {
        Some(AttributeValue::String(msg)) => {
            assert!(msg.starts_with("Error: Something went wrong"));
        }
        other => panic!("unexpected errMsg {:?}", other),
    }
}

#[tokio::test]
async fn test_each_failure_is_reported_separately() {
    let app = start_app().await;

    for _ in 0..3 {
        let response = reqwest::get(format!("{}/users", app.base)).await.unwrap();
        assert_eq!(response.status(), 500);
    }

    app.provider.shutdown().await.unwrap();
    assert_eq!(app.exporter.exported_count(), 3);
}

#[tokio::test]
async fn test_successful_and_missing_records_emit_no_spans() {
    let app = start_app().await;

    let users: Value = reqwest::get(format!("{}/", app.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(users.as_array().map(Vec::len), Some(2));
    assert_eq!(users[0]["name"], "John Doe");

    let products: Value = reqwest::get(format!("{}/products", app.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(products.as_array().map(Vec::len), Some(4));

    let order = reqwest::get(format!("{}/orders/3", app.base)).await.unwrap();
    assert_eq!(order.status(), 200);
    let order: Value = order.json().await.unwrap();
    assert_eq!(order["row"]["product_name"], "Product 3");

    let user = reqwest::get(format!("{}/users/2", app.base)).await.unwrap();
    let user: Value = user.json().await.unwrap();
    assert_eq!(user["row"]["email"], "jane@example.com");

    for path in ["/users/99", "/orders/abc"] {
        let response = reqwest::get(format!("{}{}", app.base, path)).await.unwrap();
        assert_eq!(response.status(), 404);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "error": "Not found" }));
    }

    app.provider.shutdown().await.unwrap();
    assert_eq!(app.exporter.exported_count(), 0);
}

#[tokio::test]
async fn test_incoming_request_id_is_echoed() {
    let app = start_app().await;

    let response = reqwest::Client::new()
        .get(format!("{}/orders", app.base))
        .header("x-request-id", "req-1234")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-1234");

    app.provider.shutdown().await.unwrap();
}
