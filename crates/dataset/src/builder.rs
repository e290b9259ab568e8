//! Materializes annotated tasks into the dataset tree.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use lswb_core::task::{SkipReason, TaskBatch};
use lswb_core::types::{DatasetLayout, TaskId};
use serde::Serialize;

use crate::analyzer::percent;
use crate::error::DatasetError;
use crate::layout::{self, DatasetEntry, Split};
use crate::registry::ClassRegistry;
use crate::split::{self, SplitRatios, SPLIT_SEED};

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub layout: DatasetLayout,
    /// Local mount of the frame storage the task images point into.
    pub mounted_root: PathBuf,
    /// Symlink images instead of copying them.
    pub symlink: bool,
    pub ratios: SplitRatios,
    pub seed: u64,
}

impl BuildOptions {
    pub fn new(layout: DatasetLayout, mounted_root: impl Into<PathBuf>) -> Self {
        Self {
            layout,
            mounted_root: mounted_root.into(),
            symlink: false,
            ratios: SplitRatios::default(),
            seed: SPLIT_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Built,
    /// No task produced a usable entry; the dataset was left untouched.
    NothingToDo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTask {
    pub task_id: TaskId,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SplitCounts {
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

impl SplitCounts {
    fn add(&mut self, split: Split) {
        match split {
            Split::Train => self.train += 1,
            Split::Val => self.val += 1,
            Split::Test => self.test += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassShare {
    pub name: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub status: BuildStatus,
    pub layout: DatasetLayout,
    /// Images placed into the dataset by this build.
    pub added: usize,
    pub splits: SplitCounts,
    /// Classes appended to the registry by this build.
    pub new_classes: Vec<String>,
    /// Full registry after the build, in index order.
    pub classes: Vec<String>,
    /// Per-class share of the usable entries of this batch.
    pub distribution: Vec<ClassShare>,
    pub skipped: Vec<SkippedTask>,
    /// Raw records rejected when the batch was parsed.
    pub rejected: usize,
}

/// Add every usable task of `batch` to the dataset at `root`.
///
/// Images already present anywhere in the tree are skipped, so running the
/// same batch twice adds nothing the second time.
pub fn build(batch: &TaskBatch, root: &Path, options: &BuildOptions) -> Result<BuildReport, DatasetError> {
    options.ratios.validate()?;

    let existing = layout::existing_image_names(root)?;
    let mut seen = HashSet::new();
    let mut accepted = Vec::new();
    let mut skipped = Vec::new();

    for task in &batch.tasks {
        match entry_for(task, &existing, &mut seen, &options.mounted_root) {
            Ok(entry) => accepted.push(entry),
            Err(reason) => {
                tracing::debug!(task_id = task.id, %reason, "Skipping task");
                skipped.push(SkippedTask {
                    task_id: task.id,
                    reason,
                });
            }
        }
    }

    let registry_path = layout::registry_path(root, options.layout);
    let mut registry = ClassRegistry::load(&registry_path)?;

    if accepted.is_empty() {
        tracing::info!(skipped = skipped.len(), "No new annotated images to add");
        return Ok(BuildReport {
            status: BuildStatus::NothingToDo,
            layout: options.layout,
            added: 0,
            splits: SplitCounts::default(),
            new_classes: Vec::new(),
            classes: registry.names().to_vec(),
            distribution: Vec::new(),
            skipped,
            rejected: batch.rejected.len(),
        });
    }

    let new_classes = registry.merge(accepted.iter().map(|e| e.class_label.as_str()));
    if !new_classes.is_empty() {
        tracing::info!(classes = ?new_classes, "Registering new classes");
    }
    let distribution = distribution(&accepted);

    let mut added = 0;
    let mut splits = SplitCounts::default();
    for (split, entry) in split::assign(accepted, &options.ratios, options.seed) {
        match place(root, &entry, split, &registry, options) {
            Ok(()) => {
                added += 1;
                splits.add(split);
            }
            Err(reason) => {
                tracing::warn!(task_id = entry.task_id, file = %entry.file_name, %reason, "Image not placed");
                skipped.push(SkippedTask {
                    task_id: entry.task_id,
                    reason,
                });
            }
        }
    }

    registry.save(&registry_path)?;

    tracing::info!(
        root = %root.display(),
        added,
        train = splits.train,
        val = splits.val,
        test = splits.test,
        skipped = skipped.len(),
        "Dataset build finished",
    );

    Ok(BuildReport {
        status: BuildStatus::Built,
        layout: options.layout,
        added,
        splits,
        new_classes,
        classes: registry.names().to_vec(),
        distribution,
        skipped,
        rejected: batch.rejected.len(),
    })
}

fn entry_for(
    task: &lswb_core::task::AnnotationTask,
    existing: &HashSet<String>,
    seen: &mut HashSet<String>,
    mounted_root: &Path,
) -> Result<DatasetEntry, SkipReason> {
    let class_label = task.class_label()?;
    if !layout::is_safe_class_name(&class_label) {
        return Err(SkipReason::UnsafeClassLabel { label: class_label });
    }
    let image = task.image_ref()?;

    if existing.contains(&image.file_name) {
        return Err(SkipReason::AlreadyInDataset {
            file_name: image.file_name,
        });
    }
    if !seen.insert(image.file_name.clone()) {
        return Err(SkipReason::DuplicateInBatch {
            file_name: image.file_name,
        });
    }

    Ok(DatasetEntry {
        task_id: task.id,
        source: image.resolve(mounted_root),
        file_name: image.file_name,
        class_label,
    })
}

fn distribution(entries: &[DatasetEntry]) -> Vec<ClassShare> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.class_label.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(name, count)| ClassShare {
            name: name.to_string(),
            count,
            percent: percent(count, entries.len()),
        })
        .collect()
}

/// Copy or link one image into its split; detection labels follow the image.
fn place(
    root: &Path,
    entry: &DatasetEntry,
    split: Split,
    registry: &ClassRegistry,
    options: &BuildOptions,
) -> Result<(), SkipReason> {
    if !entry.source.is_file() {
        return Err(SkipReason::SourceMissing {
            path: entry.source.display().to_string(),
        });
    }
    let copy_failed = |e: std::io::Error| SkipReason::CopyFailed {
        message: e.to_string(),
    };

    let dir = layout::image_dir(root, options.layout, split, &entry.class_label);
    std::fs::create_dir_all(&dir).map_err(copy_failed)?;
    let target = dir.join(&entry.file_name);

    if options.symlink {
        link(&entry.source, &target).map_err(copy_failed)?;
    } else {
        std::fs::copy(&entry.source, &target).map_err(copy_failed)?;
    }

    if options.layout == DatasetLayout::Detection {
        let class_id = registry
            .index_of(&entry.class_label)
            .ok_or_else(|| SkipReason::CopyFailed {
                message: format!("class '{}' is not registered", entry.class_label),
            })?;
        let label_dir = layout::label_dir(root, split);
        std::fs::create_dir_all(&label_dir).map_err(copy_failed)?;
        let label = label_dir.join(layout::label_file_name(&entry.file_name));
        std::fs::write(label, format!("{class_id}\n")).map_err(copy_failed)?;
    }
    Ok(())
}

#[cfg(unix)]
fn link(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(not(unix))]
fn link(source: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::copy(source, target).map(|_| ())
}

/// Delete the whole dataset tree. Returns `false` when there was none.
pub fn remove_dataset(root: &Path) -> Result<bool, DatasetError> {
    if !root.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(root).map_err(DatasetError::io(root))?;
    tracing::info!(root = %root.display(), "Dataset removed");
    Ok(true)
}
