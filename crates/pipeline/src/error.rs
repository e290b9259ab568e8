use std::path::PathBuf;

use lswb_core::error::CoreError;
use lswb_dataset::DatasetError;
use lswb_labelstudio::LabelStudioError;
use lswb_webdav::RemoteError;

use crate::decoder::DecodeError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    LabelStudio(#[from] LabelStudioError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Frame storage was already full before any video was downloaded.
    #[error("frame budget exhausted ({frames_in_storage}/{max_frames} frames in storage)")]
    BudgetExhausted { frames_in_storage: u64, max_frames: u64 },

    /// Frame storage occupancy could not be determined.
    #[error("frame storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
