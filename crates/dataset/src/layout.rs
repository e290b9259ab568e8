//! Directory layout of a dataset and traversal of the images in it.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use lswb_core::types::DatasetLayout;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::DatasetError;

/// Extensions counted as dataset images (lowercase, no dot).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labelled image about to be placed into the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetEntry {
    pub task_id: i64,
    /// Bare file name; unique across the dataset.
    pub file_name: String,
    pub class_label: String,
    /// Where the image is read from.
    pub source: PathBuf,
}

/// Name of the class registry file for a layout.
pub fn registry_file_name(layout: DatasetLayout) -> &'static str {
    match layout {
        DatasetLayout::Classification => "labels.txt",
        DatasetLayout::Detection => "classes.txt",
    }
}

pub fn registry_path(root: &Path, layout: DatasetLayout) -> PathBuf {
    root.join(registry_file_name(layout))
}

/// Whether `class` can name a single directory inside the dataset root.
pub fn is_safe_class_name(class: &str) -> bool {
    !class.is_empty() && class != "." && class != ".." && !class.contains(['/', '\\', '\0'])
}

/// Directory receiving images of `class` in `split`.
pub fn image_dir(root: &Path, layout: DatasetLayout, split: Split, class: &str) -> PathBuf {
    match layout {
        DatasetLayout::Classification => root.join(split.as_str()).join(class),
        DatasetLayout::Detection => root.join("images").join(split.as_str()),
    }
}

/// Directory receiving detection label files of `split`.
pub fn label_dir(root: &Path, split: Split) -> PathBuf {
    root.join("labels").join(split.as_str())
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|i| ext.eq_ignore_ascii_case(i)))
}

/// Detection label file for an image: the image name with its last
/// extension replaced by `.txt`. Recorder names contain dots, so this never
/// goes through `Path::set_extension` on the stem.
pub fn label_file_name(image_file_name: &str) -> String {
    let stem = Path::new(image_file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| image_file_name.to_string());
    format!("{stem}.txt")
}

/// An image found in the dataset tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageItem {
    pub split: Split,
    /// Class directory (classification) or class name from the label file
    /// (detection). `None` when a detection image has no usable label.
    pub class: Option<String>,
    pub file_name: String,
    pub path: PathBuf,
}

/// Every image placed in a split, in a stable order.
///
/// `classes` maps detection class ids to names; it is unused for the
/// classification layout.
pub fn walk_images(
    root: &Path,
    layout: DatasetLayout,
    classes: &[String],
) -> Result<Vec<ImageItem>, DatasetError> {
    let mut items = Vec::new();

    for split in Split::ALL {
        let split_root = match layout {
            DatasetLayout::Classification => root.join(split.as_str()),
            DatasetLayout::Detection => root.join("images").join(split.as_str()),
        };
        if !split_root.is_dir() {
            continue;
        }

        let max_depth = match layout {
            DatasetLayout::Classification => 2,
            DatasetLayout::Detection => 1,
        };
        for entry in WalkDir::new(&split_root)
            .min_depth(max_depth)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_image(entry.path()) {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let class = match layout {
                DatasetLayout::Classification => entry
                    .path()
                    .parent()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned()),
                DatasetLayout::Detection => {
                    detection_class(root, split, entry.path(), classes)
                }
            };
            items.push(ImageItem {
                split,
                class,
                file_name,
                path: entry.path().to_path_buf(),
            });
        }
    }

    Ok(items)
}

/// Class of a detection image from the first token of its label file.
fn detection_class(root: &Path, split: Split, image: &Path, classes: &[String]) -> Option<String> {
    let label = label_dir(root, split).join(label_file_name(&image.file_name()?.to_string_lossy()));
    let content = std::fs::read_to_string(label).ok()?;
    let id: usize = content.split_whitespace().next()?.parse().ok()?;
    Some(classes.get(id).cloned().unwrap_or_else(|| id.to_string()))
}

/// File names of every image anywhere under `root`.
pub fn existing_image_names(root: &Path) -> Result<HashSet<String>, DatasetError> {
    let mut names = HashSet::new();
    if !root.is_dir() {
        return Ok(names);
    }
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() && is_image(entry.path()) {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}
