//! Operator-adjustable defaults that survive restarts.
//!
//! Requests that leave the frame budget or `dry_run` unset fall back to
//! these. The file is JSON; a missing file means the defaults derived from
//! [`PipelineConfig`]. Writes go through a sibling temp file and a rename,
//! like the download history.

use std::path::{Path, PathBuf};

use lswb_core::config::PipelineConfig;
use lswb_core::error::CoreError;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Frame budget of a harvest pass that names none.
    pub max_frames: u64,
    /// Whether destructive operations only report when the caller is silent.
    pub dry_run: bool,
}

impl RuntimeSettings {
    /// Starting values: the configured budget, and dry runs until an
    /// operator opts out.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_frames: config.default_max_frames,
            dry_run: true,
        }
    }
}

/// Partial update; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeSettingsUpdate {
    pub max_frames: Option<u64>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct RuntimeStore {
    path: PathBuf,
    settings: RuntimeSettings,
}

impl RuntimeStore {
    /// Store holding `settings`, nothing read from disk.
    pub fn new(path: impl Into<PathBuf>, settings: RuntimeSettings) -> Self {
        Self {
            path: path.into(),
            settings,
        }
    }

    /// Read the settings file. Keys missing from the file keep `defaults`.
    pub async fn load(path: impl Into<PathBuf>, defaults: RuntimeSettings) -> Result<Self, PipelineError> {
        let path = path.into();
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new(path, defaults)),
            Err(e) => return Err(PipelineError::io(&path)(e)),
        };

        let stored: RuntimeSettingsUpdate = serde_json::from_slice(&raw).map_err(|e| PipelineError::Io {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        let mut store = Self::new(path, defaults);
        store.merge(stored)?;

        tracing::info!(
            path = %store.path.display(),
            max_frames = store.settings.max_frames,
            dry_run = store.settings.dry_run,
            "Loaded runtime settings"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Apply `update`, persist, and return the resulting settings.
    pub async fn update(&mut self, update: RuntimeSettingsUpdate) -> Result<RuntimeSettings, PipelineError> {
        let previous = self.settings.clone();
        self.merge(update)?;
        if let Err(e) = self.persist().await {
            self.settings = previous;
            return Err(e);
        }
        tracing::info!(
            max_frames = self.settings.max_frames,
            dry_run = self.settings.dry_run,
            "Runtime settings updated"
        );
        Ok(self.settings.clone())
    }

    fn merge(&mut self, update: RuntimeSettingsUpdate) -> Result<(), CoreError> {
        if let Some(max_frames) = update.max_frames {
            if max_frames == 0 {
                return Err(CoreError::Validation("max_frames must be at least 1".into()));
            }
            self.settings.max_frames = max_frames;
        }
        if let Some(dry_run) = update.dry_run {
            self.settings.dry_run = dry_run;
        }
        Ok(())
    }

    async fn persist(&self) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(PipelineError::io(parent))?;
        }
        let body = serde_json::to_vec_pretty(&self.settings).map_err(|e| PipelineError::Io {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        let mut tmp_name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        tokio::fs::write(&tmp, body)
            .await
            .map_err(PipelineError::io(&tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(PipelineError::io(&self.path))?;
        Ok(())
    }
}
