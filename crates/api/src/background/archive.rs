//! Packaging the dataset into a zip archive for download.
//!
//! At most one packaging job runs at a time. The job holds a lock file for
//! its whole duration, so the status can be read by anyone who can see the
//! lock, including other processes. An archive that is still current is
//! reused instead of rebuilt.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lswb_core::config::PipelineConfig;
use lswb_core::error::CoreError;
use lswb_core::file_lock::FileLock;
use lswb_dataset::ensure_archive;
use serde::Serialize;
use tokio::time::Instant;

/// First poll delay while waiting for a packaging job.
const INITIAL_POLL: Duration = Duration::from_millis(250);

/// Upper bound for the poll delay.
const MAX_POLL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArchiveStatus {
    Missing,
    Preparing,
    Ready { path: PathBuf, size: u64 },
    Failed { message: String },
}

/// Why [`ArchiveJob::wait_ready`] gave up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    #[error("archive is still being prepared after {0:?}")]
    TimedOut(Duration),

    #[error("archive preparation failed: {0}")]
    Failed(String),

    #[error("no archive has been prepared")]
    Missing,
}

pub struct ArchiveJob {
    dataset: PathBuf,
    archive: PathBuf,
    lock: PathBuf,
    last_error: Mutex<Option<String>>,
}

impl ArchiveJob {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            dataset: config.dataset_path.clone(),
            archive: config.archive_path.clone(),
            lock: config.archive_lock_path(),
            last_error: Mutex::new(None),
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }

    fn set_last_error(&self, error: Option<String>) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = error;
        }
    }

    pub fn status(&self) -> ArchiveStatus {
        if FileLock::is_held(&self.lock) {
            return ArchiveStatus::Preparing;
        }
        if let Some(message) = self.last_error() {
            return ArchiveStatus::Failed { message };
        }
        match std::fs::metadata(&self.archive) {
            Ok(meta) if meta.is_file() => ArchiveStatus::Ready {
                path: self.archive.clone(),
                size: meta.len(),
            },
            _ => ArchiveStatus::Missing,
        }
    }

    /// Start packaging unless a job is already running.
    ///
    /// Returns the status right after the call: `Preparing` in both cases.
    pub fn start(self: &Arc<Self>) -> Result<ArchiveStatus, CoreError> {
        if !self.dataset.is_dir() {
            return Err(CoreError::NotFound {
                entity: "dataset",
                id: self.dataset.display().to_string(),
            });
        }

        let lock = FileLock::try_acquire(&self.lock)
            .map_err(|e| CoreError::Internal(format!("failed to take archive lock: {e}")))?;
        let Some(lock) = lock else {
            tracing::debug!("Archive packaging already in progress");
            return Ok(ArchiveStatus::Preparing);
        };

        self.set_last_error(None);
        let job = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let _lock = lock;
            tracing::info!(dataset = %job.dataset.display(), "Archive packaging started");
            match ensure_archive(&job.dataset, &job.archive) {
                Ok(info) => {
                    tracing::info!(archive = %info.path.display(), size = info.size, files = ?info.files, "Archive ready");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Archive packaging failed");
                    job.set_last_error(Some(e.to_string()));
                }
            }
        });
        Ok(ArchiveStatus::Preparing)
    }

    /// Poll until the archive is ready, backing off from 250 ms up to 5 s
    /// between checks, for at most `max_wait`.
    pub async fn wait_ready(&self, max_wait: Duration) -> Result<(PathBuf, u64), WaitError> {
        let deadline = Instant::now() + max_wait;
        let mut delay = INITIAL_POLL;

        loop {
            match self.status() {
                ArchiveStatus::Ready { path, size } => return Ok((path, size)),
                ArchiveStatus::Failed { message } => return Err(WaitError::Failed(message)),
                ArchiveStatus::Missing => return Err(WaitError::Missing),
                ArchiveStatus::Preparing => {}
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(waited = ?max_wait, "Gave up waiting for archive");
                return Err(WaitError::TimedOut(max_wait));
            }
            tokio::time::sleep(delay.min(deadline - now)).await;
            delay = (delay * 2).min(MAX_POLL);
        }
    }
}
