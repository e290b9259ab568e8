//! Handlers for `/settings`: the persisted operator defaults.

use axum::extract::State;
use axum::Json;
use lswb_pipeline::{RuntimeSettings, RuntimeSettingsUpdate};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/settings
pub async fn get_settings(State(state): State<AppState>) -> Json<DataResponse<RuntimeSettings>> {
    Json(DataResponse {
        data: state.pipeline.runtime_settings().await,
    })
}

/// PATCH /api/v1/settings
///
/// Fields left out of the body keep their current value.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<RuntimeSettingsUpdate>,
) -> AppResult<Json<DataResponse<RuntimeSettings>>> {
    let settings = state.pipeline.update_runtime_settings(update).await?;
    Ok(Json(DataResponse { data: settings }))
}

/// `dry_run` as given, else the runtime default.
pub(crate) async fn resolve_dry_run(state: &AppState, dry_run: Option<bool>) -> bool {
    match dry_run {
        Some(dry_run) => dry_run,
        None => state.pipeline.runtime_settings().await.dry_run,
    }
}
