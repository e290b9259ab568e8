//! Depth-first discovery of downloadable videos in the remote archive.

use std::collections::VecDeque;

use lswb_core::error::CoreError;
use lswb_core::paths::normalize_remote_path;
use lswb_core::retry::RetryPolicy;
use lswb_core::video_name::{is_blacklisted, VideoCandidate, VideoName};
use lswb_webdav::{RemoteEntry, RemoteError, RemoteFileSystem};

use crate::error::PipelineError;
use crate::history::DownloadHistory;

/// Recorders write lowercase `.mp4`; the suffix is matched exactly.
const VIDEO_SUFFIX: &str = ".mp4";

fn is_video(name: &str) -> bool {
    name.ends_with(VIDEO_SUFFIX)
}

/// Lazy walk over the archive tree.
///
/// Directories are listed only when the walk reaches them, so a run that
/// stops after a few videos never lists the whole archive. A new walker
/// starts again from the root.
pub struct RemoteTreeWalker<'a> {
    remote: &'a dyn RemoteFileSystem,
    root: String,
    blacklist: &'a [String],
    retry: RetryPolicy,
    /// Unvisited entries of every directory on the current path.
    stack: Vec<VecDeque<RemoteEntry>>,
    started: bool,
}

impl<'a> RemoteTreeWalker<'a> {
    pub fn new(
        remote: &'a dyn RemoteFileSystem,
        root: &str,
        blacklist: &'a [String],
        retry: RetryPolicy,
    ) -> Self {
        Self {
            remote,
            root: normalize_remote_path(root),
            blacklist,
            retry,
            stack: Vec::new(),
            started: false,
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        self.retry
            .run("webdav.list", move || self.remote.list(path))
            .await
    }

    /// Next video not blacklisted and not in `history`.
    ///
    /// Failing to list the root is an error. A subdirectory that cannot be
    /// listed is logged and skipped.
    pub async fn next(&mut self, history: &DownloadHistory) -> Result<Option<VideoCandidate>, PipelineError> {
        if !self.started {
            self.started = true;
            let entries = self.list(&self.root).await?;
            self.stack.push(entries.into());
        }

        loop {
            let Some(pending) = self.stack.last_mut() else {
                return Ok(None);
            };
            let Some(entry) = pending.pop_front() else {
                self.stack.pop();
                continue;
            };

            if entry.is_dir {
                match self.list(&entry.path).await {
                    Ok(children) => self.stack.push(children.into()),
                    Err(e) => {
                        tracing::warn!(dir = %entry.path, error = %e, "Skipping unlistable directory")
                    }
                }
                continue;
            }

            if !is_video(&entry.name) {
                continue;
            }
            if is_blacklisted(&entry.name, self.blacklist) {
                tracing::debug!(video = %entry.path, "Skipping blacklisted registrator");
                continue;
            }
            let candidate = VideoCandidate::from_remote_path(&entry.path);
            if history.contains(&candidate.remote_path) {
                continue;
            }
            return Ok(Some(candidate));
        }
    }
}

/// Locate one recording by its file name without walking the archive.
///
/// The name is parsed into registrator and day, and only the recording's
/// own folder is listed.
pub async fn resolve_targeted(
    remote: &dyn RemoteFileSystem,
    base_dir: &str,
    video_name: &str,
    retry: RetryPolicy,
) -> Result<VideoCandidate, PipelineError> {
    let parsed = VideoName::parse(video_name)?;
    let folder = parsed.folder(base_dir);
    let not_found = || CoreError::NotFound {
        entity: "video",
        id: video_name.to_string(),
    };

    let listed = folder.as_str();
    let entries = match retry
        .run("webdav.list", move || remote.list(listed))
        .await
    {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(folder = %folder, error = %e, "Video folder cannot be listed");
            return Err(not_found().into());
        }
    };

    let video = entries
        .into_iter()
        .find(|e| !e.is_dir && is_video(&e.name))
        .ok_or_else(not_found)?;
    tracing::info!(video = %video.path, "Resolved targeted video");
    Ok(VideoCandidate::from_remote_path(&video.path))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use lswb_webdav::LocalDirectory;

    use super::*;

    fn touch(root: &std::path::Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    async fn collect(walker: &mut RemoteTreeWalker<'_>, history: &DownloadHistory) -> Vec<String> {
        let mut found = Vec::new();
        while let Some(candidate) = walker.next(history).await.unwrap() {
            found.push(candidate.remote_path);
        }
        found
    }

    #[tokio::test]
    async fn walks_depth_first_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "videos/A1/2024.5.1/x/A1_2024.5.1 1.0.0-1.5.0.mp4");
        touch(dir.path(), "videos/A1/2024.5.1/x/report.json");
        touch(dir.path(), "videos/B2/018270348452_2024.5.1 1.0.0-1.5.0.mp4");
        touch(dir.path(), "videos/B2/c.MP4");
        touch(dir.path(), "videos/B2/d.avi");
        touch(dir.path(), "videos/B2/e.mp4");

        let remote = LocalDirectory::new(dir.path());
        let blacklist = vec!["018270348452".to_string()];
        let mut history = DownloadHistory::empty(dir.path().join("h.json"));
        history.insert("/videos/B2/e.mp4");

        let mut walker = RemoteTreeWalker::new(&remote, "/videos", &blacklist, RetryPolicy::immediate(1));
        assert_eq!(
            collect(&mut walker, &history).await,
            vec!["/videos/A1/2024.5.1/x/A1_2024.5.1 1.0.0-1.5.0.mp4"]
        );
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let remote = LocalDirectory::new(dir.path());
        let history = DownloadHistory::empty(dir.path().join("h.json"));
        let mut walker = RemoteTreeWalker::new(&remote, "/nope", &[], RetryPolicy::immediate(1));
        assert_matches!(
            walker.next(&history).await,
            Err(PipelineError::Remote(RemoteError::NotFound(_)))
        );
    }

    #[tokio::test]
    async fn resolves_targeted_video_folder() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "videos/R7/2024.5.6/R7_2024.5.6 10.0.0-10.5.0/R7_2024.5.6 10.0.0-10.5.0.mp4");
        let remote = LocalDirectory::new(dir.path());

        let candidate = resolve_targeted(&remote, "/videos", "R7_2024.5.6 10.0.0-10.5.0.mp4", RetryPolicy::immediate(1))
            .await
            .unwrap();
        assert_eq!(candidate.registrator_id.as_deref(), Some("R7"));
        assert_eq!(candidate.remote_path, "/videos/R7/2024.5.6/R7_2024.5.6 10.0.0-10.5.0/R7_2024.5.6 10.0.0-10.5.0.mp4");

        assert_matches!(
            resolve_targeted(&remote, "/videos", "garbage.mp4", RetryPolicy::immediate(1)).await,
            Err(PipelineError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            resolve_targeted(&remote, "/videos", "R7_2024.5.7 10.0.0-10.5.0.mp4", RetryPolicy::immediate(1)).await,
            Err(PipelineError::Core(CoreError::NotFound { .. }))
        );
    }
}
