#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use lswb_api::background::archive::ArchiveJob;
use lswb_api::config::ServerConfig;
use lswb_api::router::build_app_router;
use lswb_api::state::AppState;
use lswb_core::config::PipelineConfig;
use lswb_core::task::TaskBatch;
use lswb_core::types::TaskId;
use lswb_labelstudio::{AnnotationService, LabelStudioError};
use lswb_pipeline::ffmpeg::FfmpegDecoder;
use lswb_pipeline::{DownloadHistory, PipelineContext, PipelineService};
use lswb_webdav::{LocalDirectory, NoRemount};
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:8080".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

/// Annotation service serving a fixed export.
pub struct StaticAnnotations(pub Vec<serde_json::Value>);

#[async_trait]
impl AnnotationService for StaticAnnotations {
    async fn list_tasks(&self) -> Result<TaskBatch, LabelStudioError> {
        Ok(TaskBatch::from_values(self.0.clone()))
    }

    async fn delete_task(&self, _id: TaskId) -> Result<bool, LabelStudioError> {
        Ok(true)
    }

    async fn sync_storage(&self) -> Result<bool, LabelStudioError> {
        Ok(true)
    }
}

/// Application state with every path under `root` and the given task export.
pub fn test_state(root: &Path, tasks: Vec<serde_json::Value>) -> AppState {
    let pipeline_config = PipelineConfig::rooted_at(root);
    std::fs::create_dir_all(&pipeline_config.mounted_path).unwrap();
    std::fs::create_dir_all(root.join("remote/frames")).unwrap();
    std::fs::create_dir_all(root.join("remote/videos")).unwrap();

    let archive = Arc::new(ArchiveJob::new(&pipeline_config));
    let history = DownloadHistory::empty(&pipeline_config.download_history_file);
    let context = PipelineContext::new(
        pipeline_config,
        Arc::new(LocalDirectory::new(root.join("remote"))),
        Arc::new(NoRemount),
        Arc::new(StaticAnnotations(tasks)),
        Arc::new(FfmpegDecoder),
        history,
    );

    AppState {
        config: Arc::new(test_config()),
        pipeline: Arc::new(PipelineService::new(context)),
        archive,
    }
}

/// Build the full application router, the same middleware stack production
/// uses.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

pub async fn send(app: Router, method: Method, uri: &str, headers: &[(&str, &str)]) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
}

pub async fn send_json(app: Router, method: Method, uri: &str, body: &serde_json::Value) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, &[]).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
