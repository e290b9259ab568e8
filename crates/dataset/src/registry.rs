//! Append-only class registry (`labels.txt` / `classes.txt`).
//!
//! Class indices are written into detection label files and define the
//! class order of classification training, so an existing class never
//! moves. New classes are appended in alphabetical order.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::DatasetError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassRegistry {
    names: Vec<String>,
}

impl ClassRegistry {
    pub fn from_names(names: impl IntoIterator<Item = String>) -> Self {
        let mut registry = Self::default();
        for name in names {
            if !registry.contains(&name) {
                registry.names.push(name);
            }
        }
        registry
    }

    /// Load a registry file, one class per line. A missing file is empty.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::from_names(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(DatasetError::io(path)(e)),
        }
    }

    /// Rewrite the registry file in full, in index order.
    pub fn save(&self, path: &Path) -> Result<(), DatasetError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DatasetError::io(parent))?;
        }
        let mut content = self.names.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        let tmp = path.with_extension("txt.tmp");
        std::fs::write(&tmp, content).map_err(DatasetError::io(&tmp))?;
        std::fs::rename(&tmp, path).map_err(DatasetError::io(path))?;
        Ok(())
    }

    /// Append labels not yet registered; returns the newly added ones.
    pub fn merge<'a>(&mut self, labels: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let fresh: BTreeSet<&str> = labels
            .into_iter()
            .filter(|label| !self.contains(label))
            .collect();
        let added: Vec<String> = fresh.into_iter().map(str::to_string).collect();
        self.names.extend(added.iter().cloned());
        added
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
