//! Removing processed tasks and their frames from the annotation project.
//!
//! Tasks go through the annotation service; frame files are removed from
//! the mounted frame storage. Individual failures are logged and counted,
//! never fatal. Dry runs report the same sets without touching anything.
//!
//! [`wipe_frames`] ignores tasks and empties the mounted frame storage.

use std::path::Path;

use lswb_core::paths::has_extension;
use lswb_core::task::{AnnotationTask, TaskBatch, TaskParseError};
use lswb_core::types::TaskId;
use lswb_labelstudio::AnnotationService;
use serde::Serialize;

use crate::error::PipelineError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    /// Tasks deleted, or that would be deleted in a dry run.
    pub tasks_deleted: usize,
    pub task_failures: Vec<TaskId>,
    /// Frame files deleted, or that would be deleted in a dry run.
    pub files_deleted: usize,
    /// Frames kept because their task is annotated.
    pub files_saved: usize,
    pub deleted: Vec<String>,
    pub saved: Vec<String>,
    pub failed: Vec<String>,
    /// Records that could not be parsed; listed, never acted on.
    pub rejected: Vec<TaskParseError>,
}

/// Delete tasks and frame files.
///
/// With `save_annotated`, annotated tasks and their frames are kept and only
/// the rest is removed; otherwise everything in `batch` goes.
pub async fn cleanup(
    annotations: &dyn AnnotationService,
    batch: &TaskBatch,
    mounted_root: &Path,
    dry_run: bool,
    save_annotated: bool,
) -> CleanupReport {
    let mut report = CleanupReport {
        dry_run,
        rejected: batch.rejected.clone(),
        ..Default::default()
    };
    if !report.rejected.is_empty() {
        tracing::warn!(count = report.rejected.len(), "Ignoring unparseable tasks during cleanup");
    }

    let doomed = |task: &AnnotationTask| !save_annotated || !task.is_annotated();

    // Tasks
    for task in batch.tasks.iter().filter(|t| doomed(t)) {
        if dry_run {
            tracing::info!(task_id = task.id, "Would delete task");
            report.tasks_deleted += 1;
            continue;
        }
        match annotations.delete_task(task.id).await {
            Ok(true) => report.tasks_deleted += 1,
            Ok(false) => {
                tracing::warn!(task_id = task.id, "Task deletion was refused");
                report.task_failures.push(task.id);
            }
            Err(e) => {
                tracing::warn!(task_id = task.id, error = %e, "Failed to delete task");
                report.task_failures.push(task.id);
            }
        }
    }

    // Frame files
    for task in &batch.tasks {
        let image = match task.image_ref() {
            Ok(image) => image,
            Err(reason) => {
                tracing::debug!(task_id = task.id, %reason, "Task has no usable image");
                continue;
            }
        };

        if !doomed(task) {
            report.files_saved += 1;
            report.saved.push(image.file_name);
            continue;
        }

        let path = image.resolve(mounted_root);
        if dry_run {
            tracing::info!(file = %path.display(), "Would delete frame");
            report.files_deleted += 1;
            report.deleted.push(image.file_name);
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                report.files_deleted += 1;
                report.deleted.push(image.file_name);
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Failed to delete frame");
                report.failed.push(image.file_name);
            }
        }
    }

    tracing::info!(
        dry_run,
        save_annotated,
        tasks = report.tasks_deleted,
        files = report.files_deleted,
        saved = report.files_saved,
        failed = report.failed.len(),
        "Cleanup finished",
    );
    report
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameWipeReport {
    pub dry_run: bool,
    /// Frames deleted, or that would be deleted in a dry run.
    pub files_deleted: usize,
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Delete every `.jpg` directly under `mounted_root`, annotated or not.
///
/// An unreadable directory is an error; a frame that cannot be removed is
/// logged and listed in `failed`.
pub async fn wipe_frames(mounted_root: &Path, dry_run: bool) -> Result<FrameWipeReport, PipelineError> {
    let mut report = FrameWipeReport {
        dry_run,
        ..Default::default()
    };

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(mounted_root)
        .await
        .map_err(PipelineError::io(mounted_root))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(PipelineError::io(mounted_root))?
    {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && has_extension(&name, "jpg") {
            names.push(name);
        }
    }
    names.sort();

    for name in names {
        let path = mounted_root.join(&name);
        if dry_run {
            tracing::info!(file = %path.display(), "Would delete frame");
            report.files_deleted += 1;
            report.deleted.push(name);
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                report.files_deleted += 1;
                report.deleted.push(name);
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Failed to delete frame");
                report.failed.push(name);
            }
        }
    }

    tracing::info!(
        dry_run,
        files = report.files_deleted,
        failed = report.failed.len(),
        "Frame storage wiped",
    );
    Ok(report)
}
