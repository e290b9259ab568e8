//! Route definitions for the dataset and its archive.
//!
//! Mounted at `/dataset` by `api_routes()`.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{archive, dataset};
use crate::state::AppState;

/// ```text
/// DELETE /                  -> delete_dataset
/// POST   /build             -> build_dataset
/// GET    /analyze           -> analyze_dataset
/// POST   /archive           -> prepare_archive
/// GET    /archive           -> download_archive
/// GET    /archive/status    -> archive_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", delete(dataset::delete_dataset))
        .route("/build", post(dataset::build_dataset))
        .route("/analyze", get(dataset::analyze_dataset))
        .route(
            "/archive",
            get(archive::download_archive).post(archive::prepare_archive),
        )
        .route("/archive/status", get(archive::archive_status))
}
