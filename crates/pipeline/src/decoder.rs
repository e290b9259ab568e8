//! Video decoding seam used by the frame extractor.

use std::path::Path;

use async_trait::async_trait;
use image::RgbImage;

/// Error type for opening and reading videos.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("video file not found: {0}")]
    VideoNotFound(String),

    /// `retrieve` was called without a successfully grabbed frame.
    #[error("no frame has been grabbed")]
    NoFrame,
}

/// An opened video, read one frame at a time.
#[async_trait]
pub trait FrameSource: Send {
    /// Frames per second reported by the container; `<= 0` when unknown.
    fn native_fps(&self) -> f64;

    /// Advance by one decoded frame. `false` at end of stream.
    async fn grab(&mut self) -> Result<bool, DecodeError>;

    /// The most recently grabbed frame.
    fn retrieve(&mut self) -> Result<RgbImage, DecodeError>;
}

#[async_trait]
pub trait VideoDecoder: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, DecodeError>;
}
