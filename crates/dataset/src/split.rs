//! Deterministic train/val/test partitioning.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;
use crate::layout::{DatasetEntry, Split};

/// Seed of the shuffle preceding every split.
pub const SPLIT_SEED: u64 = 42;

/// Allowed deviation of the ratio sum from 1.
const RATIO_TOLERANCE: f64 = 0.01;

/// Below this many entries everything goes to train.
const MIN_ENTRIES_TO_SPLIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.8,
            val: 0.1,
            test: 0.1,
        }
    }
}

impl SplitRatios {
    pub fn new(train: f64, val: f64, test: f64) -> Result<Self, DatasetError> {
        let ratios = Self { train, val, test };
        ratios.validate()?;
        Ok(ratios)
    }

    pub fn validate(&self) -> Result<(), DatasetError> {
        let parts = [self.train, self.val, self.test];
        if parts.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(DatasetError::Validation(format!(
                "split ratios must be non-negative, got {}/{}/{}",
                self.train, self.val, self.test
            )));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > RATIO_TOLERANCE {
            return Err(DatasetError::Validation(format!(
                "split ratios must sum to 1, got {sum:.3}"
            )));
        }
        Ok(())
    }
}

/// Assign every entry to a split.
///
/// Entries are ordered by file name and shuffled with `seed`, so the same
/// input always yields the same partition. The split is stratified by class
/// when every class has at least two entries.
pub fn assign(
    mut entries: Vec<DatasetEntry>,
    ratios: &SplitRatios,
    seed: u64,
) -> Vec<(Split, DatasetEntry)> {
    let n = entries.len();
    if n < MIN_ENTRIES_TO_SPLIT {
        return entries.into_iter().map(|e| (Split::Train, e)).collect();
    }

    entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    let mut rng = StdRng::seed_from_u64(seed);
    entries.shuffle(&mut rng);

    let n_test = ((n as f64) * ratios.test).round().clamp(0.0, n as f64) as usize;
    let n_val = ((n as f64) * ratios.val)
        .round()
        .clamp(0.0, (n - n_test) as f64) as usize;

    let mut by_class: BTreeMap<String, Vec<DatasetEntry>> = BTreeMap::new();
    for entry in &entries {
        by_class
            .entry(entry.class_label.clone())
            .or_default()
            .push(entry.clone());
    }

    if by_class.values().all(|group| group.len() >= 2) {
        stratified(by_class, n_test, n_val)
    } else {
        tracing::debug!(entries = n, "A class has a single entry, splitting without stratification");
        entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let split = if i < n_test {
                    Split::Test
                } else if i < n_test + n_val {
                    Split::Val
                } else {
                    Split::Train
                };
                (split, entry)
            })
            .collect()
    }
}

fn stratified(
    by_class: BTreeMap<String, Vec<DatasetEntry>>,
    n_test: usize,
    n_val: usize,
) -> Vec<(Split, DatasetEntry)> {
    let sizes: Vec<(&str, usize)> = by_class
        .iter()
        .map(|(class, group)| (class.as_str(), group.len()))
        .collect();
    let test_quota = largest_remainder(&sizes, n_test);

    let remaining: Vec<(&str, usize)> = sizes
        .iter()
        .zip(&test_quota)
        .map(|((class, size), taken)| (*class, size - taken))
        .collect();
    let val_quota = largest_remainder(&remaining, n_val);

    let mut assigned = Vec::new();
    for ((_, group), (test, val)) in by_class.into_iter().zip(test_quota.into_iter().zip(val_quota)) {
        for (i, entry) in group.into_iter().enumerate() {
            let split = if i < test {
                Split::Test
            } else if i < test + val {
                Split::Val
            } else {
                Split::Train
            };
            assigned.push((split, entry));
        }
    }
    assigned
}

/// Distribute `target` slots proportionally to `sizes`.
///
/// Every class gets the floor of its exact share; leftover slots go to the
/// largest fractional parts, ties broken by class name.
fn largest_remainder(sizes: &[(&str, usize)], target: usize) -> Vec<usize> {
    let total: usize = sizes.iter().map(|(_, size)| size).sum();
    if total == 0 {
        return vec![0; sizes.len()];
    }
    let target = target.min(total);

    let exact: Vec<f64> = sizes
        .iter()
        .map(|(_, size)| (*size as f64) * (target as f64) / (total as f64))
        .collect();
    let mut quota: Vec<usize> = exact.iter().map(|share| share.floor() as usize).collect();

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let frac_a = exact[a] - exact[a].floor();
        let frac_b = exact[b] - exact[b].floor();
        frac_b.total_cmp(&frac_a).then_with(|| sizes[a].0.cmp(sizes[b].0))
    });

    let mut leftover = target.saturating_sub(quota.iter().sum());
    for i in order.into_iter().cycle().take(sizes.len() * 2) {
        if leftover == 0 {
            break;
        }
        if quota[i] < sizes[i].1 {
            quota[i] += 1;
            leftover -= 1;
        }
    }
    quota
}
