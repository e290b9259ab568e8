//! Integrity check: every image name must live in exactly one split and one
//! class. Violations are reported, never repaired.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use lswb_core::types::DatasetLayout;
use serde::Serialize;

use crate::error::DatasetError;
use crate::layout::{self, ImageItem, Split};
use crate::registry::ClassRegistry;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
    pub ok: bool,
    /// Image names filed under more than one class of the same split.
    pub conflicts_in_classes: Vec<ClassConflict>,
    /// Image names present in more than one split.
    pub conflicts_in_splits: Vec<NameConflict>,
    /// Image names occurring more than once in total.
    pub repeated_names: Vec<RepeatedName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassConflict {
    pub split: Split,
    pub file_name: String,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameConflict {
    pub file_name: String,
    pub places: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepeatedName {
    pub file_name: String,
    pub count: usize,
}

pub fn check_duplicates(root: &Path, layout: DatasetLayout) -> Result<DuplicateReport, DatasetError> {
    let registry = ClassRegistry::load(&layout::registry_path(root, layout))?;
    let items = layout::walk_images(root, layout, registry.names())?;
    Ok(find_duplicates(&items))
}

pub fn find_duplicates(items: &[ImageItem]) -> DuplicateReport {
    let mut classes: BTreeMap<(Split, &str), BTreeSet<&str>> = BTreeMap::new();
    let mut splits: BTreeMap<&str, BTreeSet<Split>> = BTreeMap::new();
    let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();

    for item in items {
        let name = item.file_name.as_str();
        if let Some(class) = item.class.as_deref() {
            classes.entry((item.split, name)).or_default().insert(class);
        }
        splits.entry(name).or_default().insert(item.split);
        *occurrences.entry(name).or_default() += 1;
    }

    let conflicts_in_classes: Vec<ClassConflict> = classes
        .into_iter()
        .filter(|(_, set)| set.len() > 1)
        .map(|((split, name), set)| ClassConflict {
            split,
            file_name: name.to_string(),
            classes: set.into_iter().map(str::to_string).collect(),
        })
        .collect();
    let conflicts_in_splits: Vec<NameConflict> = splits
        .into_iter()
        .filter(|(_, set)| set.len() > 1)
        .map(|(name, set)| NameConflict {
            file_name: name.to_string(),
            places: set.into_iter().map(|s| s.to_string()).collect(),
        })
        .collect();
    let repeated_names: Vec<RepeatedName> = occurrences
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, count)| RepeatedName {
            file_name: name.to_string(),
            count,
        })
        .collect();

    let ok = conflicts_in_classes.is_empty()
        && conflicts_in_splits.is_empty()
        && repeated_names.is_empty();
    if !ok {
        tracing::warn!(
            class_conflicts = conflicts_in_classes.len(),
            split_conflicts = conflicts_in_splits.len(),
            repeated = repeated_names.len(),
            "Dataset contains duplicate image names",
        );
    }

    DuplicateReport {
        ok,
        conflicts_in_classes,
        conflicts_in_splits,
        repeated_names,
    }
}
