//! The harvest cycle.
//!
//! Each tick runs one harvest pass with the configured frame budget. A pass
//! that finds the budget already spent, or another operation holding the
//! pipeline, is not an error for the loop: it waits for the next tick.

use std::sync::Arc;
use std::time::Duration;

use lswb_core::error::CoreError;
use lswb_pipeline::{HarvestRequest, PipelineError, PipelineService};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Run harvest passes every `interval` until `cancel` fires.
///
/// The first pass starts immediately. A pass in progress is never
/// interrupted; cancellation is observed between passes. Returns the number
/// of passes run.
pub async fn run(
    service: Arc<PipelineService>,
    max_frames: u64,
    interval: Duration,
    cancel: CancellationToken,
) -> u64 {
    tracing::info!(
        max_frames,
        interval_secs = interval.as_secs(),
        "Harvest cycle started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut passes = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(passes, "Harvest cycle stopping");
                break;
            }
            _ = ticker.tick() => {
                passes += 1;
                run_pass(&service, max_frames, passes).await;
            }
        }
    }

    passes
}

async fn run_pass(service: &PipelineService, max_frames: u64, pass: u64) {
    let request = HarvestRequest {
        max_frames: Some(max_frames),
        ..Default::default()
    };

    match service.load_frames(request).await {
        Ok(summary) => {
            tracing::info!(
                pass,
                stop_reason = ?summary.stop_reason,
                downloaded = summary.total_frames_downloaded,
                frames_in_storage = summary.frames_in_storage,
                videos = summary.results.len(),
                "Harvest pass finished"
            );
        }
        Err(PipelineError::BudgetExhausted {
            frames_in_storage,
            max_frames,
        }) => {
            tracing::info!(pass, frames_in_storage, max_frames, "Frame budget spent, nothing to harvest");
        }
        Err(PipelineError::Core(CoreError::Conflict(msg))) => {
            tracing::warn!(pass, reason = %msg, "Pipeline busy, skipping pass");
        }
        Err(e) => {
            tracing::error!(pass, error = %e, "Harvest pass failed");
        }
    }
}
