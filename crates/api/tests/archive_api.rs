//! Integration tests for dataset archive preparation and download.
//!
//! Covers: range requests (bounded, open-ended, suffix, unsatisfiable and
//! unparseable), full downloads, status reporting and a missing dataset.

mod common;

use std::path::Path;
use std::time::{Duration, SystemTime};

use axum::http::{header, Method, StatusCode};
use common::{body_bytes, body_json, get, send};
use lswb_core::config::PipelineConfig;

const ARCHIVE_SIZE: usize = 1000;

/// A dataset with one image and an archive of `ARCHIVE_SIZE` bytes that is
/// newer than every dataset file, so it is served as is.
fn fresh_archive(root: &Path) -> Vec<u8> {
    let config = PipelineConfig::rooted_at(root);
    std::fs::create_dir_all(config.dataset_path.join("train/free")).unwrap();
    std::fs::write(config.dataset_path.join("train/free/a.jpg"), b"jpeg").unwrap();

    let content: Vec<u8> = (0..ARCHIVE_SIZE).map(|i| (i % 251) as u8).collect();
    std::fs::write(&config.archive_path, &content).unwrap();
    std::fs::File::options()
        .write(true)
        .open(&config.archive_path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(3600))
        .unwrap();
    content
}

// ---------------------------------------------------------------------------
// Range requests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bounded_range_returns_partial_content() {
    let dir = tempfile::tempdir().unwrap();
    let state = common::test_state(dir.path(), vec![]);
    let content = fresh_archive(dir.path());
    let app = common::build_test_app(state);

    let response = send(app, Method::GET, "/api/v1/dataset/archive", &[("range", "bytes=100-199")]).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 100-199/1000");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(body_bytes(response).await, content[100..200]);
}

#[tokio::test]
async fn open_and_suffix_ranges_run_to_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let state = common::test_state(dir.path(), vec![]);
    let content = fresh_archive(dir.path());

    let app = common::build_test_app(state.clone());
    let response = send(app, Method::GET, "/api/v1/dataset/archive", &[("range", "bytes=900-")]).await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 900-999/1000");
    assert_eq!(body_bytes(response).await, content[900..]);

    let app = common::build_test_app(state);
    let response = send(app, Method::GET, "/api/v1/dataset/archive", &[("range", "bytes=-10")]).await;
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 990-999/1000");
    assert_eq!(body_bytes(response).await.len(), 10);
}

#[tokio::test]
async fn range_past_the_end_is_not_satisfiable() {
    let dir = tempfile::tempdir().unwrap();
    let state = common::test_state(dir.path(), vec![]);
    fresh_archive(dir.path());
    let app = common::build_test_app(state);

    let response = send(app, Method::GET, "/api/v1/dataset/archive", &[("range", "bytes=1000-1100")]).await;

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
}

#[tokio::test]
async fn unparseable_range_serves_everything() {
    let dir = tempfile::tempdir().unwrap();
    let state = common::test_state(dir.path(), vec![]);
    let content = fresh_archive(dir.path());
    let app = common::build_test_app(state);

    let response = send(app, Method::GET, "/api/v1/dataset/archive", &[("range", "bytes=abc")]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "1000");
    assert_eq!(body_bytes(response).await, content);
}

// ---------------------------------------------------------------------------
// Preparation and status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prepare_packages_dataset_in_background() {
    let dir = tempfile::tempdir().unwrap();
    let state = common::test_state(dir.path(), vec![]);
    let config = PipelineConfig::rooted_at(dir.path());
    std::fs::create_dir_all(config.dataset_path.join("val/free")).unwrap();
    std::fs::write(config.dataset_path.join("val/free/b.jpg"), b"jpeg").unwrap();

    let response = send(common::build_test_app(state.clone()), Method::POST, "/api/v1/dataset/archive", &[]).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["data"]["status"], "preparing");

    state.archive.wait_ready(Duration::from_secs(10)).await.unwrap();

    let response = get(common::build_test_app(state), "/api/v1/dataset/archive/status").await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "ready");
    assert!(json["data"]["size"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn missing_dataset_cannot_be_archived() {
    let dir = tempfile::tempdir().unwrap();
    let app = common::build_test_app(common::test_state(dir.path(), vec![]));

    let response = send(app, Method::POST, "/api/v1/dataset/archive", &[]).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}
