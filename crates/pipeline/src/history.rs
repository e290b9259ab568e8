//! Remote videos already downloaded and extracted.
//!
//! Persisted as a JSON array of normalized remote paths. Every write goes
//! to a sibling temp file that is renamed over the history file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use lswb_core::paths::normalize_remote_path;

use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub struct DownloadHistory {
    path: PathBuf,
    paths: BTreeSet<String>,
}

impl DownloadHistory {
    /// Empty history persisted at `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            paths: BTreeSet::new(),
        }
    }

    /// Read the history file; a missing file is an empty history.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::empty(path)),
            Err(e) => return Err(PipelineError::io(&path)(e)),
        };

        let entries: Vec<String> = serde_json::from_slice(&raw).map_err(|e| {
            PipelineError::Io {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            }
        })?;
        let paths = entries.iter().map(|p| normalize_remote_path(p)).collect();

        let history = Self { path, paths };
        tracing::info!(path = %history.path.display(), videos = history.len(), "Loaded download history");
        Ok(history)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, remote_path: &str) -> bool {
        self.paths.contains(&normalize_remote_path(remote_path))
    }

    /// Record a video; returns `false` when it was already present.
    pub fn insert(&mut self, remote_path: &str) -> bool {
        self.paths.insert(normalize_remote_path(remote_path))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Rewrite the history file with the current contents.
    pub async fn persist(&self) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(PipelineError::io(parent))?;
        }
        let entries: Vec<&String> = self.paths.iter().collect();
        let body = serde_json::to_vec_pretty(&entries).map_err(|e| PipelineError::Io {
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

    /// Forget every video and persist; returns how many were dropped.
    pub async fn clear(&mut self) -> Result<usize, PipelineError> {
        let dropped = self.paths.len();
        self.paths.clear();
        self.persist().await?;
        tracing::info!(dropped, "Download history cleared");
        Ok(dropped)
    }
}
