use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClearedHistory {
    pub dropped: usize,
}

/// DELETE /api/v1/history
pub async fn clear_history(State(state): State<AppState>) -> AppResult<Json<DataResponse<ClearedHistory>>> {
    let dropped = state.pipeline.clear_download_history().await?;
    Ok(Json(DataResponse {
        data: ClearedHistory { dropped },
    }))
}
