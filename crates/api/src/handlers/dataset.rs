//! Handlers for the `/dataset` resource.

use axum::extract::{Query, State};
use axum::Json;
use lswb_dataset::{AnalysisResult, SplitRatios};
use lswb_pipeline::{DatasetBuildSummary, DeleteDatasetResult};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::handlers::settings::resolve_dry_run;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct BuildParams {
    pub train: Option<f64>,
    pub val: Option<f64>,
    pub test: Option<f64>,
    /// Only report what cleanup would delete. Unset means the runtime default.
    pub dry_run: Option<bool>,
    /// Delete unannotated tasks and their frames after building.
    #[serde(default)]
    pub delete_unannotated: bool,
}

impl BuildParams {
    /// Split ratios when any was given; all three are required then.
    fn ratios(&self) -> AppResult<Option<SplitRatios>> {
        match (self.train, self.val, self.test) {
            (None, None, None) => Ok(None),
            (Some(train), Some(val), Some(test)) => Ok(Some(SplitRatios { train, val, test })),
            _ => Err(AppError::BadRequest(
                "train, val and test ratios must be given together".into(),
            )),
        }
    }
}

/// POST /api/v1/dataset/build
pub async fn build_dataset(
    State(state): State<AppState>,
    Query(params): Query<BuildParams>,
) -> AppResult<Json<DataResponse<DatasetBuildSummary>>> {
    let ratios = params.ratios()?;
    let dry_run = resolve_dry_run(&state, params.dry_run).await;
    let summary = state
        .pipeline
        .build_dataset(ratios, dry_run, params.delete_unannotated)
        .await?;
    Ok(Json(DataResponse { data: summary }))
}

/// GET /api/v1/dataset/analyze
pub async fn analyze_dataset(State(state): State<AppState>) -> AppResult<Json<DataResponse<AnalysisResult>>> {
    let analysis = state.pipeline.analyze_dataset().await?;
    Ok(Json(DataResponse { data: analysis }))
}

/// DELETE /api/v1/dataset
pub async fn delete_dataset(State(state): State<AppState>) -> AppResult<Json<DataResponse<DeleteDatasetResult>>> {
    let result = state.pipeline.delete_dataset().await?;
    Ok(Json(DataResponse { data: result }))
}
