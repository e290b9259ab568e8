use axum::routing::{delete, post};
use axum::Router;

use crate::handlers::frames;
use crate::state::AppState;

/// Frame harvesting routes, mounted at `/frames`.
///
/// ```text
/// DELETE /                  -> delete_frames
/// DELETE /all               -> delete_all_frames
/// POST   /load              -> load_frames
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", delete(frames::delete_frames))
        .route("/all", delete(frames::delete_all_frames))
        .route("/load", post(frames::load_frames))
}
