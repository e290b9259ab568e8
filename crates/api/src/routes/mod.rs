pub mod dataset;
pub mod frames;
pub mod health;

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /dataset                     delete dataset (DELETE)
/// /dataset/build               build from annotated tasks (POST)
/// /dataset/analyze             per-class statistics (GET)
/// /dataset/archive             prepare (POST), download (GET, range aware)
/// /dataset/archive/status      packaging status (GET)
///
/// /frames                      delete tasks and frames (DELETE)
/// /frames/all                  wipe frame storage, annotated or not (DELETE)
/// /frames/load                 run one harvest pass (POST)
///
/// /history                     clear download history (DELETE)
/// /settings                    runtime defaults (GET, PATCH)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/dataset", dataset::router())
        .nest("/frames", frames::router())
        .route("/history", delete(handlers::history::clear_history))
        .route(
            "/settings",
            get(handlers::settings::get_settings).patch(handlers::settings::update_settings),
        )
}
