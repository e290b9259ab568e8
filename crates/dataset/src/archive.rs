//! Zip archive of the dataset tree for download.
//!
//! The archive is rebuilt only when a file under the dataset root changed
//! after the archive was written.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::DatasetError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub size: u64,
    /// Files packed; `None` when an up-to-date archive was reused.
    pub files: Option<usize>,
}

fn tmp_path(archive: &Path) -> PathBuf {
    let mut name = archive
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    archive.with_file_name(name)
}

fn modified(path: &Path) -> Result<SystemTime, DatasetError> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(DatasetError::io(path))
}

/// Whether `archive` is missing or older than any file under `root`.
pub fn is_stale(root: &Path, archive: &Path) -> Result<bool, DatasetError> {
    if !archive.is_file() {
        return Ok(true);
    }
    let packed_at = modified(archive)?;

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.path() == archive {
            continue;
        }
        let changed = entry
            .metadata()?
            .modified()
            .map_err(DatasetError::io(entry.path()))?;
        if changed > packed_at {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Pack every file under `root` into `archive`, paths relative to `root`.
///
/// The zip is written next to the target and renamed into place, so a
/// reader never sees a half-written archive.
pub fn build_archive(root: &Path, archive: &Path) -> Result<ArchiveInfo, DatasetError> {
    if !root.is_dir() {
        return Err(DatasetError::Validation(format!(
            "dataset not found at {}",
            root.display()
        )));
    }
    if let Some(parent) = archive.parent() {
        std::fs::create_dir_all(parent).map_err(DatasetError::io(parent))?;
    }

    let tmp = tmp_path(archive);
    let file = File::create(&tmp).map_err(DatasetError::io(&tmp))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0usize;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path == archive || path == tmp {
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        zip.start_file(name, options)?;
        let mut source = File::open(path).map_err(DatasetError::io(path))?;
        std::io::copy(&mut source, &mut zip).map_err(DatasetError::io(path))?;
        files += 1;
    }

    let mut writer = zip.finish()?;
    writer.flush().map_err(DatasetError::io(&tmp))?;
    drop(writer);
    std::fs::rename(&tmp, archive).map_err(DatasetError::io(archive))?;

    let size = std::fs::metadata(archive)
        .map_err(DatasetError::io(archive))?
        .len();
    tracing::info!(archive = %archive.display(), files, size, "Dataset archive written");

    Ok(ArchiveInfo {
        path: archive.to_path_buf(),
        size,
        files: Some(files),
    })
}

/// Reuse `archive` when it is current, otherwise rebuild it.
pub fn ensure_archive(root: &Path, archive: &Path) -> Result<ArchiveInfo, DatasetError> {
    if is_stale(root, archive)? {
        return build_archive(root, archive);
    }
    let size = std::fs::metadata(archive)
        .map_err(DatasetError::io(archive))?
        .len();
    tracing::debug!(archive = %archive.display(), "Dataset archive is up to date");
    Ok(ArchiveInfo {
        path: archive.to_path_buf(),
        size,
        files: None,
    })
}

/// Delete the archive if present.
pub fn remove_archive(archive: &Path) -> Result<bool, DatasetError> {
    match std::fs::remove_file(archive) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DatasetError::io(archive)(e)),
    }
}
