//! Health Check API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/health/live").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_readiness_degraded_without_push_transport() {
    let app = TestApp::new();
    let (status, body) = app.get_json("/health/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["outbox_store"]["status"], "healthy");
    assert_eq!(body["checks"]["push_transport"]["status"], "degraded");
}

#[tokio::test]
async fn test_readiness_unavailable_when_store_is_down() {
    let app = TestApp::new();
    app.db.set_unavailable(true);
    let (status, body) = app.get_json("/health/ready").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_endpoint_is_prometheus_text() {
    let app = TestApp::new();
    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = TestApp::new();
    let response = app.get("/api/v1/users/@me").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
