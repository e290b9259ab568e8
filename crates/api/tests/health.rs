//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, get};

// ---------------------------------------------------------------------------
// Test: GET /health reports version and storage state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_unmounted_storage_as_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(common::test_state(dir.path(), vec![]));

    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["storage_mounted"], false);
    assert!(json["version"].is_string());
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(common::test_state(dir.path(), vec![]));

    let response = get(app, "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(common::test_state(dir.path(), vec![]));

    let response = get(app, "/health").await;
    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");

    // The value should be a UUID (36 chars with hyphens).
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

// ---------------------------------------------------------------------------
// Test: browsers can read the download headers of an allowed origin
// ---------------------------------------------------------------------------

#[tokio::test]
async fn allowed_origin_sees_download_headers() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(common::test_state(dir.path(), vec![]));

    let response = common::send(
        app,
        Method::GET,
        "/health",
        &[("origin", "http://localhost:8080")],
    )
    .await;

    let headers = response.headers();
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        "http://localhost:8080"
    );
    let exposed = headers
        .get("access-control-expose-headers")
        .unwrap()
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    for name in ["content-range", "content-disposition", "accept-ranges", "x-request-id"] {
        assert!(exposed.contains(name), "{name} not exposed in '{exposed}'");
    }
}

#[tokio::test]
async fn unknown_origin_gets_no_cors_grant() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(common::test_state(dir.path(), vec![]));

    let response = common::send(
        app,
        Method::GET,
        "/health",
        &[("origin", "http://elsewhere.example")],
    )
    .await;

    assert!(response.headers().get("access-control-allow-origin").is_none());
}
