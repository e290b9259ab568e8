use axum::extract::State;
use axum::{routing::get, Json, Router};
use lswb_webdav::remount::is_mounted;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the frame storage mount is live.
    pub storage_mounted: bool,
}

/// GET /health -- returns service and frame storage health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mount = state.pipeline.context().config.mounted_path.clone();
    let storage_mounted = tokio::task::spawn_blocking(move || is_mounted(&mount))
        .await
        .unwrap_or(false);

    let status = if storage_mounted { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        storage_mounted,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
