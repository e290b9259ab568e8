//! [`RemoteFileSystem`] over a local directory tree.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lswb_core::paths::{join_remote, normalize_remote_path};

use crate::error::RemoteError;
use crate::fs::{RemoteEntry, RemoteFileSystem};

/// Serves remote paths from a directory on local disk.
///
/// Remote `/a/b.mp4` maps to `{root}/a/b.mp4`. Listings are sorted by name.
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    root: PathBuf,
}

impl LocalDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local location of a remote path. `..` components are dropped.
    pub fn local_path(&self, remote: &str) -> PathBuf {
        let normalized = normalize_remote_path(remote);
        let mut path = self.root.clone();
        for part in normalized.split('/') {
            if part.is_empty() || part == "." || part == ".." {
                continue;
            }
            path.push(part);
        }
        path
    }
}

fn not_found(remote: &str, e: std::io::Error) -> RemoteError {
    if e.kind() == ErrorKind::NotFound {
        RemoteError::NotFound(remote.to_string())
    } else {
        RemoteError::Io(e)
    }
}

#[async_trait]
impl RemoteFileSystem for LocalDirectory {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let dir = self.local_path(path);
        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| not_found(path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().await?.is_dir();
            entries.push(RemoteEntry {
                path: join_remote(path, &name),
                name,
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn is_dir(&self, path: &str) -> Result<bool, RemoteError> {
        match tokio::fs::metadata(self.local_path(path)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RemoteError::Io(e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        Ok(tokio::fs::try_exists(self.local_path(path)).await?)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        tokio::fs::read(self.local_path(path))
            .await
            .map_err(|e| not_found(path, e))
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<u64, RemoteError> {
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(self.local_path(remote), local)
            .await
            .map_err(|e| not_found(remote, e))
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        let target = self.local_path(remote);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local, &target).await?;
        Ok(())
    }
}
