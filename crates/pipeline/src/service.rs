//! Operations exposed to the HTTP API and the worker.
//!
//! Operations that mutate shared state take the pipeline guard with
//! `try_lock`: a second caller gets [`CoreError::Conflict`] instead of
//! waiting behind a run that may take hours.

use std::path::PathBuf;
use std::sync::Arc;

use lswb_core::error::CoreError;
use lswb_core::file_lock::FileLock;
use lswb_core::types::DatasetLayout;
use lswb_dataset::archive::remove_archive;
use lswb_dataset::{AnalysisResult, BuildOptions, BuildReport, SplitRatios};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::cleanup::{cleanup, wipe_frames, CleanupReport, FrameWipeReport};
use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::orchestrator::{harvest, HarvestRequest, HarvestSummary};
use crate::runtime::{RuntimeSettings, RuntimeSettingsUpdate};

#[derive(Debug, Clone, Serialize)]
pub struct DatasetBuildSummary {
    pub before: AnalysisResult,
    pub build: BuildReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupReport>,
    pub after: AnalysisResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    Deleted,
    NotFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteDatasetResult {
    pub status: DeleteStatus,
    pub path: PathBuf,
    pub archive_removed: bool,
}

pub struct PipelineService {
    ctx: Arc<PipelineContext>,
    guard: Mutex<()>,
}

impl PipelineService {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            guard: Mutex::new(()),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    fn exclusive(&self, operation: &str) -> Result<MutexGuard<'_, ()>, PipelineError> {
        self.guard.try_lock().map_err(|_| {
            tracing::warn!(operation, "Rejected while another pipeline operation is running");
            CoreError::Conflict(format!("cannot {operation}: another pipeline operation is running")).into()
        })
    }

    /// Fetch tasks, add the annotated ones to the dataset and optionally
    /// delete what was not annotated.
    pub async fn build_dataset(
        &self,
        ratios: Option<SplitRatios>,
        dry_run: bool,
        delete_unannotated: bool,
    ) -> Result<DatasetBuildSummary, PipelineError> {
        let _guard = self.exclusive("build the dataset")?;
        let ratios = ratios.unwrap_or_default();
        ratios.validate()?;

        let before = self.analysis().await?;
        let batch = self.ctx.annotations.list_tasks().await?;
        tracing::info!(tasks = batch.tasks.len(), rejected = batch.rejected.len(), "Fetched tasks");

        let config = &self.ctx.config;
        let options = BuildOptions {
            symlink: config.dataset_symlink,
            ratios,
            ..BuildOptions::new(config.dataset_layout, config.mounted_path.clone())
        };
        let root = config.dataset_path.clone();
        let build_batch = batch.clone();
        let build = tokio::task::spawn_blocking(move || lswb_dataset::build(&build_batch, &root, &options)).await??;

        let cleanup = if delete_unannotated {
            Some(cleanup(self.ctx.annotations.as_ref(), &batch, &config.mounted_path, dry_run, true).await)
        } else {
            None
        };

        let after = self.analysis().await?;
        Ok(DatasetBuildSummary {
            before,
            build,
            cleanup,
            after,
        })
    }

    pub async fn analyze_dataset(&self) -> Result<AnalysisResult, PipelineError> {
        self.analysis().await
    }

    async fn analysis(&self) -> Result<AnalysisResult, PipelineError> {
        let root = self.ctx.config.dataset_path.clone();
        let layout: DatasetLayout = self.ctx.config.dataset_layout;
        Ok(tokio::task::spawn_blocking(move || lswb_dataset::analyze(&root, layout)).await??)
    }

    /// Remove the dataset tree and its cached archive.
    pub async fn delete_dataset(&self) -> Result<DeleteDatasetResult, PipelineError> {
        let _guard = self.exclusive("delete the dataset")?;
        let config = &self.ctx.config;
        if FileLock::is_held(config.archive_lock_path()) {
            return Err(CoreError::Conflict("dataset archive is being prepared".into()).into());
        }

        let root = config.dataset_path.clone();
        let archive = config.archive_path.clone();
        let (removed, archive_removed) = tokio::task::spawn_blocking(move || {
            let removed = lswb_dataset::remove_dataset(&root)?;
            let archive_removed = remove_archive(&archive)?;
            Ok::<_, lswb_dataset::DatasetError>((removed, archive_removed))
        })
        .await??;

        let status = if removed {
            tracing::info!(path = %config.dataset_path.display(), "Dataset deleted");
            DeleteStatus::Deleted
        } else {
            DeleteStatus::NotFound
        };
        Ok(DeleteDatasetResult {
            status,
            path: config.dataset_path.clone(),
            archive_removed,
        })
    }

    pub async fn load_frames(&self, request: HarvestRequest) -> Result<HarvestSummary, PipelineError> {
        let _guard = self.exclusive("load frames")?;
        if let Some(fps) = request.fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(CoreError::Validation(format!("fps must be positive, got {fps}")).into());
            }
        }
        harvest(&self.ctx, &request).await
    }

    /// Delete tasks and their frames from the annotation project.
    pub async fn delete_frames(&self, dry_run: bool, save_annotated: bool) -> Result<CleanupReport, PipelineError> {
        let _guard = self.exclusive("delete frames")?;
        let batch = self.ctx.annotations.list_tasks().await?;
        let report = cleanup(
            self.ctx.annotations.as_ref(),
            &batch,
            &self.ctx.config.mounted_path,
            dry_run,
            save_annotated,
        )
        .await;

        if !dry_run {
            self.sync_storage().await;
        }
        Ok(report)
    }

    /// Delete every frame in the mounted storage, whatever its tasks say.
    pub async fn delete_all_frames(&self, dry_run: bool) -> Result<FrameWipeReport, PipelineError> {
        let _guard = self.exclusive("delete all frames")?;
        let report = wipe_frames(&self.ctx.config.mounted_path, dry_run).await?;
        if !dry_run {
            self.sync_storage().await;
        }
        Ok(report)
    }

    async fn sync_storage(&self) {
        match self.ctx.annotations.sync_storage().await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Storage sync after cleanup was refused"),
            Err(e) => tracing::warn!(error = %e, "Storage sync after cleanup failed"),
        }
    }

    pub async fn runtime_settings(&self) -> RuntimeSettings {
        self.ctx.runtime.lock().await.settings().clone()
    }

    pub async fn update_runtime_settings(
        &self,
        update: RuntimeSettingsUpdate,
    ) -> Result<RuntimeSettings, PipelineError> {
        self.ctx.runtime.lock().await.update(update).await
    }

    /// Forget every harvested video. Returns how many paths were dropped.
    pub async fn clear_download_history(&self) -> Result<usize, PipelineError> {
        let _guard = self.exclusive("clear the download history")?;
        let dropped = self.ctx.history.lock().await.clear().await?;
        tracing::info!(dropped, "Download history cleared");
        Ok(dropped)
    }
}
