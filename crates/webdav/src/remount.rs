//! Recovery of the FUSE mount that exposes remote frame storage locally.
//!
//! The dataset builder and the cleanup coordinator read frames through the
//! mount, and the annotation service serves them from it. After each
//! harvest run the mount is checked and re-established when it went stale.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::RemoteError;

/// Pause after a lazy unmount before mounting again.
const UNMOUNT_SETTLE: Duration = Duration::from_secs(3);

/// Pause after starting rclone before checking the mount.
const MOUNT_SETTLE: Duration = Duration::from_secs(2);

#[async_trait]
pub trait Remount: Send + Sync {
    /// Make sure the mount is live, re-mounting if necessary.
    async fn remount(&self) -> Result<(), RemoteError>;
}

/// For deployments where frame storage is a plain local directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRemount;

#[async_trait]
impl Remount for NoRemount {
    async fn remount(&self) -> Result<(), RemoteError> {
        Ok(())
    }
}

/// Mounts an rclone remote with `rclone mount`.
#[derive(Debug, Clone)]
pub struct RcloneMount {
    remote: String,
    mount_point: PathBuf,
    /// Keep rclone in the foreground with VFS write caching instead of `--daemon`.
    from_systemd: bool,
}

impl RcloneMount {
    pub fn new(remote: impl Into<String>, mount_point: impl Into<PathBuf>, from_systemd: bool) -> Self {
        Self {
            remote: remote.into(),
            mount_point: mount_point.into(),
            from_systemd,
        }
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Arguments passed to `rclone`.
    pub fn mount_args(&self) -> Vec<String> {
        let mut args = vec![
            "mount".to_string(),
            self.remote.clone(),
            self.mount_point.to_string_lossy().into_owned(),
            "--no-modtime".to_string(),
        ];
        if self.from_systemd {
            args.extend(
                [
                    "--vfs-cache-mode",
                    "writes",
                    "--dir-cache-time",
                    "5s",
                    "--poll-interval",
                    "5s",
                ]
                .map(String::from),
            );
        } else {
            args.push("--daemon".to_string());
        }
        args
    }

    async fn unmount(&self) {
        let result = Command::new("fusermount")
            .arg("-uz")
            .arg(&self.mount_point)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;
        match result {
            Ok(output) if !output.status.success() => tracing::debug!(
                mount_point = %self.mount_point.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "fusermount reported an error",
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to run fusermount"),
        }
    }

    async fn mount(&self) -> Result<(), RemoteError> {
        tokio::fs::create_dir_all(&self.mount_point).await?;

        let mut cmd = Command::new("rclone");
        cmd.args(self.mount_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null());

        if self.from_systemd {
            // Foreground rclone keeps running for the life of the service.
            cmd.stderr(Stdio::null()).kill_on_drop(false);
            cmd.spawn()
                .map_err(|e| RemoteError::Mount(format!("failed to start rclone: {e}")))?;
        } else {
            let output = cmd
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|e| RemoteError::Mount(format!("failed to start rclone: {e}")))?;
            if !output.status.success() {
                return Err(RemoteError::Mount(format!(
                    "rclone mount exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Remount for RcloneMount {
    async fn remount(&self) -> Result<(), RemoteError> {
        if is_mounted(&self.mount_point) {
            return Ok(());
        }

        tracing::warn!(mount_point = %self.mount_point.display(), "Frame storage mount is down, remounting");
        self.unmount().await;
        tokio::time::sleep(UNMOUNT_SETTLE).await;

        self.mount().await?;
        tokio::time::sleep(MOUNT_SETTLE).await;

        if is_mounted(&self.mount_point) {
            tracing::info!(mount_point = %self.mount_point.display(), "Frame storage remounted");
            Ok(())
        } else {
            Err(RemoteError::Mount(format!(
                "{} is still not mounted after rclone mount",
                self.mount_point.display()
            )))
        }
    }
}

/// Whether `path` is a mount point whose contents can be listed.
///
/// A mount point lives on a different device than its parent. A dead FUSE
/// endpoint passes that check but fails to list.
pub fn is_mounted(path: &Path) -> bool {
    if !is_mount_point(path) {
        return false;
    }
    match std::fs::read_dir(path) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Mount point is not readable");
            false
        }
    }
}

#[cfg(unix)]
fn is_mount_point(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(own) = std::fs::metadata(path) else {
        return false;
    };
    let parent = path.parent().unwrap_or(Path::new("/"));
    match std::fs::metadata(parent) {
        Ok(parent_meta) => own.dev() != parent_meta.dev() || own.ino() == parent_meta.ino(),
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_mount_point(path: &Path) -> bool {
    path.is_dir()
}
