use std::path::Path;

use async_trait::async_trait;

use crate::error::RemoteError;

/// One child of a listed remote directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    /// Full normalized remote path.
    pub path: String,
    pub is_dir: bool,
}

/// Remote file storage as seen by the pipeline.
///
/// Paths are `/`-separated and absolute within the storage. Implementations
/// report transient failures through [`RemoteError`] and leave retrying to
/// the caller's retry policy.
#[async_trait]
pub trait RemoteFileSystem: Send + Sync {
    /// Direct children of a directory.
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// `false` for files and for paths that do not exist.
    async fn is_dir(&self, path: &str) -> Result<bool, RemoteError>;

    async fn exists(&self, path: &str) -> Result<bool, RemoteError>;

    /// Whole content of a small remote file.
    async fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError>;

    /// Stream a remote file to `local`, returning the number of bytes written.
    async fn download(&self, remote: &str, local: &Path) -> Result<u64, RemoteError>;

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError>;
}
