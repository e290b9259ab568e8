//! Occupancy of the remote frame directory.

use lswb_core::paths::has_extension;
use lswb_core::retry::RetryPolicy;
use lswb_webdav::{RemoteError, RemoteFileSystem};

/// Number of `.jpg` frames currently in `frame_dir`.
pub async fn count_stored_frames(
    remote: &dyn RemoteFileSystem,
    frame_dir: &str,
    retry: RetryPolicy,
) -> Result<u64, RemoteError> {
    let entries = retry
        .run("webdav.list_frames", move || remote.list(frame_dir))
        .await?;
    Ok(entries
        .iter()
        .filter(|e| !e.is_dir && has_extension(&e.name, "jpg"))
        .count() as u64)
}
