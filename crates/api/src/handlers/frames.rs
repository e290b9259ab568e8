//! Handlers for the `/frames` resource: harvesting and cleanup.

use axum::extract::{Query, State};
use axum::Json;
use lswb_pipeline::{CleanupReport, FrameWipeReport, HarvestRequest, HarvestSummary};
use serde::Deserialize;

use crate::error::AppResult;
use crate::handlers::settings::resolve_dry_run;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DeleteFramesParams {
    /// Unset means the runtime default.
    pub dry_run: Option<bool>,
    /// Keep annotated tasks and their frames.
    #[serde(default = "default_save_annotated")]
    pub save_annotated: bool,
}

fn default_save_annotated() -> bool {
    true
}

/// POST /api/v1/frames/load
///
/// Runs one harvest pass and answers when it is finished.
pub async fn load_frames(
    State(state): State<AppState>,
    Query(request): Query<HarvestRequest>,
) -> AppResult<Json<DataResponse<HarvestSummary>>> {
    let summary = state.pipeline.load_frames(request).await?;
    Ok(Json(DataResponse { data: summary }))
}

/// DELETE /api/v1/frames
pub async fn delete_frames(
    State(state): State<AppState>,
    Query(params): Query<DeleteFramesParams>,
) -> AppResult<Json<DataResponse<CleanupReport>>> {
    let dry_run = resolve_dry_run(&state, params.dry_run).await;
    let report = state
        .pipeline
        .delete_frames(dry_run, params.save_annotated)
        .await?;
    Ok(Json(DataResponse { data: report }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteAllFramesParams {
    pub dry_run: Option<bool>,
}

/// DELETE /api/v1/frames/all
///
/// Empties the frame storage, annotated frames included.
pub async fn delete_all_frames(
    State(state): State<AppState>,
    Query(params): Query<DeleteAllFramesParams>,
) -> AppResult<Json<DataResponse<FrameWipeReport>>> {
    let dry_run = resolve_dry_run(&state, params.dry_run).await;
    let report = state.pipeline.delete_all_frames(dry_run).await?;
    Ok(Json(DataResponse { data: report }))
}
