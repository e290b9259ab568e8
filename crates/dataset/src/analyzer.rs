//! Per-class, per-split statistics of an existing dataset.

use std::collections::BTreeMap;
use std::path::Path;

use lswb_core::types::DatasetLayout;
use serde::Serialize;

use crate::duplicates::{find_duplicates, DuplicateReport};
use crate::error::DatasetError;
use crate::layout::{self, Split};
use crate::registry::ClassRegistry;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisResult {
    Analyzed(DatasetAnalysis),
    NotFound { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetAnalysis {
    pub layout: DatasetLayout,
    pub total: usize,
    pub classes: Vec<ClassStats>,
    pub duplicates: DuplicateReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassStats {
    /// Registry index; classes found on disk but not registered get ids
    /// after the registered ones.
    pub id: usize,
    pub name: String,
    pub train: usize,
    pub val: usize,
    pub test: usize,
    pub total: usize,
    pub percent: f64,
}

/// Share of `count` in `total` as a percentage with one decimal.
pub(crate) fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 * 1000.0 / total as f64).round() / 10.0
}

pub fn analyze(root: &Path, layout: DatasetLayout) -> Result<AnalysisResult, DatasetError> {
    if !root.is_dir() {
        return Ok(AnalysisResult::NotFound {
            message: format!("dataset not found at {}", root.display()),
        });
    }
    let registry_path = layout::registry_path(root, layout);
    if !registry_path.is_file() {
        return Ok(AnalysisResult::NotFound {
            message: format!("class registry not found at {}", registry_path.display()),
        });
    }

    let registry = ClassRegistry::load(&registry_path)?;
    let items = layout::walk_images(root, layout, registry.names())?;

    let mut counts: BTreeMap<&str, [usize; 3]> = BTreeMap::new();
    for item in &items {
        let Some(class) = item.class.as_deref() else {
            continue;
        };
        let slot = match item.split {
            Split::Train => 0,
            Split::Val => 1,
            Split::Test => 2,
        };
        counts.entry(class).or_default()[slot] += 1;
    }

    let total: usize = counts.values().flatten().sum();
    let unregistered: Vec<&str> = counts
        .keys()
        .copied()
        .filter(|name| !registry.contains(name))
        .collect();

    let classes = registry
        .names()
        .iter()
        .map(String::as_str)
        .chain(unregistered)
        .enumerate()
        .map(|(id, name)| {
            let [train, val, test] = counts.get(name).copied().unwrap_or_default();
            let class_total = train + val + test;
            ClassStats {
                id,
                name: name.to_string(),
                train,
                val,
                test,
                total: class_total,
                percent: percent(class_total, total),
            }
        })
        .collect();

    Ok(AnalysisResult::Analyzed(DatasetAnalysis {
        layout,
        total,
        classes,
        duplicates: find_duplicates(&items),
    }))
}
