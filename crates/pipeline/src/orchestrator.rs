//! One harvest run: pick videos, download them, extract frames, record them.
//!
//! The run is serial. Before each video the frame budget is checked against
//! the remote frame directory. After the loop, whatever its outcome, the
//! mount is verified, the annotation storage re-synced and local videos
//! removed.

use std::path::{Path, PathBuf};

use lswb_core::cargo_type::CargoType;
use lswb_core::paths::has_extension;
use lswb_core::retry::RetryPolicy;
use lswb_core::video_name::VideoCandidate;
use lswb_webdav::RemoteFileSystem;
use serde::{Deserialize, Serialize};

use crate::classifier::classify;
use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::extractor::{ExtractionFailure, FrameExtractor};
use crate::storage::count_stored_frames;
use crate::walker::{resolve_targeted, RemoteTreeWalker};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarvestRequest {
    /// Stop once the frame directory holds this many frames. Unset means the
    /// runtime settings budget.
    pub max_frames: Option<u64>,
    /// Only harvest videos of this cargo type.
    pub cargo_type: Option<CargoType>,
    /// Sampling rate overriding the per-cargo default.
    pub fps: Option<f64>,
    /// Harvest exactly this recording, even if it was harvested before.
    pub video_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoResult {
    pub video_path: String,
    pub cargo_type: CargoType,
    pub fps: f64,
    pub frames: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExtractionFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    BudgetReached { frames_in_storage: u64, max_frames: u64 },
    /// All videos processed.
    CandidatesExhausted,
    TargetProcessed,
}

/// Outcome of the steps run after the loop. Failures here are reported,
/// never fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostRunReport {
    pub remounted: bool,
    pub storage_synced: bool,
    pub videos_removed: usize,
    /// Frames listed in the frame directory and confirmed to exist.
    pub frames_verified: usize,
    pub missing_frames: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestSummary {
    pub stop_reason: StopReason,
    pub max_frames: u64,
    pub total_frames_downloaded: u64,
    pub frames_in_storage: u64,
    pub results: Vec<VideoResult>,
    pub post_run: PostRunReport,
}

struct LoopOutcome {
    stop_reason: StopReason,
    total_frames_downloaded: u64,
    frames_in_storage: u64,
    results: Vec<VideoResult>,
}

enum Candidates<'a> {
    Walk(RemoteTreeWalker<'a>),
    Targeted { pending: Option<VideoCandidate>, name: String },
}

/// Run the harvest loop followed by the post-run steps.
pub async fn harvest(ctx: &PipelineContext, request: &HarvestRequest) -> Result<HarvestSummary, PipelineError> {
    let max_frames = match request.max_frames {
        Some(max_frames) => max_frames,
        None => ctx.runtime.lock().await.settings().max_frames,
    };
    tracing::info!(
        max_frames,
        cargo_type = ?request.cargo_type,
        fps = ?request.fps,
        video_name = ?request.video_name,
        "Harvest run started",
    );

    if let Err(e) = ctx.mount.remount().await {
        tracing::warn!(error = %e, "Frame storage mount check failed before run");
    }

    let outcome = run_loop(ctx, request, max_frames).await;
    let post_run = post_run(ctx).await;

    let outcome = outcome?;
    tracing::info!(
        videos = outcome.results.len(),
        frames = outcome.total_frames_downloaded,
        stop_reason = ?outcome.stop_reason,
        "Harvest run finished",
    );
    Ok(HarvestSummary {
        stop_reason: outcome.stop_reason,
        max_frames,
        total_frames_downloaded: outcome.total_frames_downloaded,
        frames_in_storage: outcome.frames_in_storage,
        results: outcome.results,
        post_run,
    })
}

async fn run_loop(
    ctx: &PipelineContext,
    request: &HarvestRequest,
    max_frames: u64,
) -> Result<LoopOutcome, PipelineError> {
    let config = &ctx.config;
    let remote: &dyn RemoteFileSystem = ctx.remote.as_ref();
    tokio::fs::create_dir_all(&config.local_video_dir)
        .await
        .map_err(PipelineError::io(&config.local_video_dir))?;

    let mut candidates = match &request.video_name {
        Some(name) => Candidates::Targeted {
            pending: Some(resolve_targeted(remote, &config.base_remote_dir, name, ctx.remote_retry).await?),
            name: name.clone(),
        },
        None => Candidates::Walk(RemoteTreeWalker::new(
            remote,
            &config.base_remote_dir,
            &config.blacklisted_registrators,
            ctx.remote_retry,
        )),
    };
    let targeted = request.video_name.is_some();

    let extractor = FrameExtractor {
        remote,
        decoder: ctx.decoder.as_ref(),
        remote_frame_dir: &config.remote_frame_dir,
        frame_dir_temp: &config.frame_dir_temp,
        storage_ceiling: config.frame_storage_ceiling,
        listing_retry: ctx.remote_retry,
        upload_retry: ctx.upload_retry,
    };

    let mut outcome = LoopOutcome {
        stop_reason: StopReason::CandidatesExhausted,
        total_frames_downloaded: 0,
        frames_in_storage: 0,
        results: Vec::new(),
    };
    let mut downloaded = 0usize;

    loop {
        // CHECK_BUDGET
        let stored = count_stored_frames(remote, &config.remote_frame_dir, ctx.remote_retry)
            .await
            .map_err(|e| PipelineError::StorageUnavailable(e.to_string()))?;
        outcome.frames_in_storage = stored;
        if stored >= max_frames {
            tracing::info!(stored, max_frames, "Frame budget reached");
            if downloaded == 0 {
                return Err(PipelineError::BudgetExhausted {
                    frames_in_storage: stored,
                    max_frames,
                });
            }
            outcome.stop_reason = StopReason::BudgetReached {
                frames_in_storage: stored,
                max_frames,
            };
            return Ok(outcome);
        }

        // NEXT_CANDIDATE
        let next = match &mut candidates {
            Candidates::Walk(walker) => {
                let history = ctx.history.lock().await;
                walker.next(&history).await?
            }
            Candidates::Targeted { pending, .. } => pending.take(),
        };
        let Some(candidate) = next else {
            tracing::info!("All videos processed");
            outcome.stop_reason = StopReason::CandidatesExhausted;
            return Ok(outcome);
        };

        // CLASSIFY_AND_FILTER
        tracing::debug!(
            video = %candidate.remote_path,
            registrator = ?candidate.registrator_id,
            date = ?candidate.capture_date,
            "Next candidate"
        );
        let video = candidate.remote_path;
        let video_file = candidate.file_name;
        if let Candidates::Targeted { name, .. } = &candidates {
            if *name != video_file {
                tracing::debug!(video = %video, wanted = %name, "Skipping non-matching file");
                continue;
            }
        }
        if !targeted && ctx.history.lock().await.contains(&video) {
            tracing::debug!(video = %video, "Already downloaded");
            continue;
        }
        let cargo = classify(remote, &video, ctx.remote_retry).await;
        if let Some(wanted) = request.cargo_type {
            if cargo != wanted {
                tracing::debug!(video = %video, cargo = %cargo, wanted = %wanted, "Skipping other cargo type");
                continue;
            }
        }

        // DOWNLOAD
        let local = config.local_video_dir.join(&video_file);
        if let Err(e) = download(remote, &video, &local, ctx.remote_retry).await {
            tracing::error!(video = %video, error = %e, "Download failed");
            continue;
        }
        downloaded += 1;

        // EXTRACT
        let fps = config.frame_rates.effective(cargo, request.fps);
        let extraction = extractor.extract(&local, fps).await;
        if !extraction.success {
            tracing::warn!(video = %video, failure = ?extraction.failure, "Video not fully processed");
        }

        // RECORD
        if extraction.success {
            let mut history = ctx.history.lock().await;
            history.insert(&video);
            if let Err(e) = history.persist().await {
                tracing::error!(error = %e, "Failed to persist download history");
            }
        }
        outcome.total_frames_downloaded += extraction.frames_written;
        outcome.frames_in_storage = stored + extraction.frames_written;
        outcome.results.push(VideoResult {
            video_path: video,
            cargo_type: cargo,
            fps,
            frames: extraction.frames_written,
            success: extraction.success,
            failure: extraction.failure,
        });

        if targeted {
            outcome.stop_reason = StopReason::TargetProcessed;
            return Ok(outcome);
        }
    }
}

/// Download to `{local}.part` and rename into place once complete.
async fn download(
    remote: &dyn RemoteFileSystem,
    video: &str,
    local: &Path,
    retry: RetryPolicy,
) -> Result<u64, PipelineError> {
    let part = part_path(local);
    tracing::info!(video = %video, local = %local.display(), "Downloading video");

    let target = part.as_path();
    let result = retry
        .run("webdav.download", move || remote.download(video, target))
        .await;
    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e.into());
        }
    };

    tokio::fs::rename(&part, local)
        .await
        .map_err(PipelineError::io(local))?;
    tracing::info!(video = %video, bytes, "Video downloaded");
    Ok(bytes)
}

fn part_path(local: &Path) -> PathBuf {
    let mut name = local.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    local.with_file_name(name)
}

async fn post_run(ctx: &PipelineContext) -> PostRunReport {
    let mut report = PostRunReport::default();

    match ctx.mount.remount().await {
        Ok(()) => report.remounted = true,
        Err(e) => {
            tracing::error!(error = %e, "Remount after run failed");
            report.errors.push(format!("remount: {e}"));
        }
    }

    match ctx.annotations.sync_storage().await {
        Ok(true) => report.storage_synced = true,
        Ok(false) => report.errors.push("storage sync refused".to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Storage sync after run failed");
            report.errors.push(format!("storage sync: {e}"));
        }
    }

    match remove_local_videos(&ctx.config.local_video_dir).await {
        Ok(removed) => report.videos_removed = removed,
        Err(e) => {
            tracing::error!(error = %e, "Failed to clean local videos");
            report.errors.push(format!("local cleanup: {e}"));
        }
    }

    verify_frames(ctx, &mut report).await;
    report
}

/// Delete downloaded videos and leftover partial downloads.
async fn remove_local_videos(dir: &Path) -> std::io::Result<usize> {
    let mut reader = match tokio::fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(entry) = reader.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !(has_extension(&name, "mp4") || has_extension(&name, "part")) {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                removed += 1;
                tracing::debug!(file = %name, "Removed local video");
            }
            Err(e) => tracing::warn!(file = %name, error = %e, "Failed to remove local video"),
        }
    }
    Ok(removed)
}

/// Touch every stored frame through the remote client.
async fn verify_frames(ctx: &PipelineContext, report: &mut PostRunReport) {
    let remote = ctx.remote.as_ref();
    let dir = ctx.config.remote_frame_dir.as_str();
    let entries = match ctx.remote_retry.run("webdav.list_frames", move || remote.list(dir)).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list frame storage for verification");
            report.errors.push(format!("frame verification: {e}"));
            return;
        }
    };

    for entry in entries.iter().filter(|e| !e.is_dir) {
        match remote.exists(&entry.path).await {
            Ok(true) => report.frames_verified += 1,
            Ok(false) => report.missing_frames.push(entry.name.clone()),
            Err(e) => {
                tracing::warn!(frame = %entry.name, error = %e, "Frame check failed");
                report.missing_frames.push(entry.name.clone());
            }
        }
    }
    if !report.missing_frames.is_empty() {
        tracing::warn!(missing = report.missing_frames.len(), "Listed frames are not reachable");
    }
}
