//! Exclusive lock files.
//!
//! Acquiring creates the lock file with `create_new`, which fails if the
//! file already exists. The lock is released when the guard is dropped.
//!
//! A lock left behind by a crashed holder is stale: its recorded pid no
//! longer runs, or it is older than [`STALE_AFTER`]. Stale locks count as
//! free and are replaced on the next acquire.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Age after which a lock is considered abandoned whatever its pid.
pub const STALE_AFTER: Duration = Duration::from_secs(6 * 3600);

/// A held lock file. Dropping it deletes the file.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Try to take the lock at `path`.
    ///
    /// Returns `Ok(None)` when another holder already owns it.
    pub fn try_acquire(path: impl AsRef<Path>) -> io::Result<Option<Self>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        match create(path)? {
            Some(lock) => Ok(Some(lock)),
            None if is_stale(path) => {
                tracing::warn!(path = %path.display(), "Replacing stale lock file");
                match std::fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
                create(path)
            }
            None => Ok(None),
        }
    }

    /// Whether a live holder currently owns the lock at `path`.
    pub fn is_held(path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        path.exists() && !is_stale(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn create(path: &Path) -> io::Result<Option<FileLock>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            // Constructed first so a failed write still removes the file.
            let lock = FileLock {
                path: path.to_path_buf(),
            };
            writeln!(file, "{}", std::process::id())?;
            Ok(Some(lock))
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(e),
    }
}

fn is_stale(path: &Path) -> bool {
    let owner = std::fs::read_to_string(path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok());
    if owner.is_some_and(|pid| !process_alive(pid)) {
        return true;
    }

    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_AFTER)
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

/// Without a process table to consult only the age rule applies.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release lock file");
        }
    }
}
