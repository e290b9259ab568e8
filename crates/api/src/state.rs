use std::sync::Arc;

use lswb_pipeline::PipelineService;

use crate::background::archive::ArchiveJob;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Pipeline operations; serializes mutating calls internally.
    pub pipeline: Arc<PipelineService>,
    /// Background packaging of the dataset archive.
    pub archive: Arc<ArchiveJob>,
}
