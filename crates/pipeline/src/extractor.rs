//! Sampling frames out of a downloaded video into remote frame storage.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use lswb_core::paths::join_remote;
use lswb_core::retry::RetryPolicy;
use lswb_core::sampling::{frame_file_name, keeps, stride};
use lswb_webdav::{RemoteError, RemoteFileSystem};
use serde::Serialize;

use crate::decoder::VideoDecoder;
use crate::storage::count_stored_frames;

const JPEG_QUALITY: u8 = 95;

/// Why an extraction stopped early.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionFailure {
    #[error("frame storage holds {frames_in_storage} frames, ceiling is {ceiling}")]
    StorageFull { frames_in_storage: u64, ceiling: u64 },

    #[error("failed to open video: {message}")]
    Open { message: String },

    #[error("video reports an unusable frame rate ({fps})")]
    InvalidFps { fps: f64 },

    #[error("decoding failed: {message}")]
    Decode { message: String },

    #[error("failed to write frame: {message}")]
    Encode { message: String },

    #[error("upload of {frame} failed: {message}")]
    Upload { frame: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionOutcome {
    pub success: bool,
    /// Frames uploaded, including those uploaded before a failure.
    pub frames_written: u64,
    pub failure: Option<ExtractionFailure>,
}

impl ExtractionOutcome {
    fn failed(frames_written: u64, failure: ExtractionFailure) -> Self {
        Self {
            success: false,
            frames_written,
            failure: Some(failure),
        }
    }
}

pub struct FrameExtractor<'a> {
    pub remote: &'a dyn RemoteFileSystem,
    pub decoder: &'a dyn VideoDecoder,
    pub remote_frame_dir: &'a str,
    /// Local scratch directory for encoded frames awaiting upload.
    pub frame_dir_temp: &'a Path,
    /// Extraction refuses to start at or above this many stored frames.
    pub storage_ceiling: u64,
    pub listing_retry: RetryPolicy,
    pub upload_retry: RetryPolicy,
}

impl FrameExtractor<'_> {
    /// Sample `local_video` at `fps` and upload every kept frame.
    ///
    /// Never returns an error: every failure is reported in the outcome and
    /// frames uploaded before it stay in storage.
    pub async fn extract(&self, local_video: &Path, fps: f64) -> ExtractionOutcome {
        let stored = match count_stored_frames(self.remote, self.remote_frame_dir, self.listing_retry).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Failed to count stored frames, assuming empty storage");
                0
            }
        };
        if stored >= self.storage_ceiling {
            tracing::warn!(
                video = %local_video.display(),
                stored,
                ceiling = self.storage_ceiling,
                "Frame storage is full, skipping video",
            );
            return ExtractionOutcome::failed(
                0,
                ExtractionFailure::StorageFull {
                    frames_in_storage: stored,
                    ceiling: self.storage_ceiling,
                },
            );
        }

        let mut source = match self.decoder.open(local_video).await {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(video = %local_video.display(), error = %e, "Failed to open video");
                return ExtractionOutcome::failed(0, ExtractionFailure::Open { message: e.to_string() });
            }
        };

        let native_fps = source.native_fps();
        if !(native_fps.is_finite() && native_fps > 0.0) {
            tracing::error!(video = %local_video.display(), native_fps, "Video has no usable frame rate");
            return ExtractionOutcome::failed(0, ExtractionFailure::InvalidFps { fps: native_fps });
        }

        if let Err(e) = tokio::fs::create_dir_all(self.frame_dir_temp).await {
            return ExtractionOutcome::failed(0, ExtractionFailure::Encode { message: e.to_string() });
        }

        let stride = stride(native_fps, fps);
        let stem = local_video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!(video = %local_video.display(), native_fps, target_fps = fps, stride, "Extracting frames");

        let mut index = 0u64;
        let mut sequence = 0u64;
        loop {
            match source.grab().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::error!(video = %local_video.display(), index, error = %e, "Decoding failed");
                    return ExtractionOutcome::failed(sequence, ExtractionFailure::Decode { message: e.to_string() });
                }
            }

            if keeps(index, stride) {
                let name = frame_file_name(&stem, sequence);
                let frame = match source.retrieve() {
                    Ok(frame) => frame,
                    Err(e) => {
                        return ExtractionOutcome::failed(sequence, ExtractionFailure::Decode { message: e.to_string() });
                    }
                };
                if let Err(failure) = self.store_frame(&frame, &name).await {
                    return ExtractionOutcome::failed(sequence, failure);
                }
                sequence += 1;
            }
            index += 1;
        }

        tracing::info!(video = %local_video.display(), frames = sequence, decoded = index, "Frames extracted");
        ExtractionOutcome {
            success: true,
            frames_written: sequence,
            failure: None,
        }
    }

    /// Encode one frame, upload it and drop the local copy.
    async fn store_frame(&self, frame: &RgbImage, name: &str) -> Result<(), ExtractionFailure> {
        let local = self.frame_dir_temp.join(name);
        let encode_failed = |message: String| ExtractionFailure::Encode { message };

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode_image(frame)
            .map_err(|e| encode_failed(e.to_string()))?;
        tokio::fs::write(&local, jpeg)
            .await
            .map_err(|e| encode_failed(e.to_string()))?;

        let remote_path = join_remote(self.remote_frame_dir, name);
        let uploaded = self.upload(&local, &remote_path).await;
        remove_local(&local).await;

        uploaded.map_err(|e| {
            tracing::error!(frame = %name, error = %e, "Frame upload failed, aborting video");
            ExtractionFailure::Upload {
                frame: name.to_string(),
                message: e.to_string(),
            }
        })
    }

    async fn upload(&self, local: &Path, remote_path: &str) -> Result<(), RemoteError> {
        let remote = self.remote;
        self.upload_retry
            .run_if("webdav.upload_frame", |_: &RemoteError| true, move || {
                remote.upload(local, remote_path)
            })
            .await
    }
}

async fn remove_local(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove local frame");
    }
}
