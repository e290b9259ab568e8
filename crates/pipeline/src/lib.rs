//! The harvesting pipeline: remote videos in, sampled frames out, and the
//! dataset and cleanup operations built on top of the annotation service.
//!
//! Everything runs against a [`PipelineContext`]; there is no global state.
//! [`PipelineService`] is the entry point used by the API and the worker.

pub mod classifier;
pub mod cleanup;
pub mod context;
pub mod decoder;
pub mod error;
pub mod extractor;
pub mod ffmpeg;
pub mod history;
pub mod orchestrator;
pub mod runtime;
pub mod service;
pub mod storage;
pub mod walker;

pub use cleanup::{cleanup, wipe_frames, CleanupReport, FrameWipeReport};
pub use context::PipelineContext;
pub use decoder::{DecodeError, FrameSource, VideoDecoder};
pub use error::PipelineError;
pub use extractor::{ExtractionFailure, ExtractionOutcome, FrameExtractor};
pub use history::DownloadHistory;
pub use orchestrator::{harvest, HarvestRequest, HarvestSummary, PostRunReport, StopReason, VideoResult};
pub use runtime::{RuntimeSettings, RuntimeSettingsUpdate, RuntimeStore};
pub use service::{DatasetBuildSummary, DeleteDatasetResult, DeleteStatus, PipelineService};
