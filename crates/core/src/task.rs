//! Annotation tasks as exported by the annotation service.
//!
//! Raw JSON is converted into [`AnnotationTask`] once, at the boundary.
//! Records that do not fit the schema are collected as [`TaskParseError`]s
//! in a [`TaskBatch`] instead of failing the whole export.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::types::TaskId;

/// Query parameter carrying the storage-relative path in local-files URLs.
pub const IMAGE_PATH_PARAM: &str = "d";

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationTask {
    pub id: TaskId,
    #[serde(default)]
    pub data: TaskData,
    /// `None` when the export did not include annotation bodies.
    #[serde(default)]
    pub annotations: Option<Vec<Annotation>>,
    #[serde(default)]
    pub total_annotations: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskData {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub was_cancelled: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub result: Vec<AnnotationResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationResult {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub value: ResultValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultValue {
    #[serde(default)]
    pub choices: Vec<String>,
}

// ---------------------------------------------------------------------------
// Per-item outcomes
// ---------------------------------------------------------------------------

/// Why a task did not become a dataset entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("task has no completed, non-cancelled annotation")]
    NoValidAnnotation,

    #[error("latest annotation carries no choice")]
    NoChoice,

    #[error("class label '{label}' cannot be used as a directory name")]
    UnsafeClassLabel { label: String },

    #[error("task has no image reference")]
    MissingImage,

    #[error("image reference '{url}' does not name a file")]
    InvalidImageRef { url: String },

    #[error("image '{file_name}' is already in the dataset")]
    AlreadyInDataset { file_name: String },

    #[error("image '{file_name}' appears earlier in the same batch")]
    DuplicateInBatch { file_name: String },

    #[error("source image '{path}' does not exist")]
    SourceMissing { path: String },

    #[error("failed to copy image: {message}")]
    CopyFailed { message: String },
}

/// A raw task record that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskParseError {
    /// The record's `id` field as raw JSON text, when present.
    pub raw_id: Option<String>,
    pub message: String,
}

/// Parsed tasks plus the records that were rejected.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskBatch {
    pub tasks: Vec<AnnotationTask>,
    pub rejected: Vec<TaskParseError>,
}

impl TaskBatch {
    pub fn from_values(values: impl IntoIterator<Item = serde_json::Value>) -> Self {
        let mut batch = Self::default();
        batch.extend_values(values);
        batch
    }

    pub fn extend_values(&mut self, values: impl IntoIterator<Item = serde_json::Value>) {
        for value in values {
            match AnnotationTask::from_value(value) {
                Ok(task) => self.tasks.push(task),
                Err(e) => {
                    tracing::warn!(raw_id = ?e.raw_id, error = %e.message, "Rejected malformed task");
                    self.rejected.push(e);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.rejected.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Task logic
// ---------------------------------------------------------------------------

impl AnnotationTask {
    pub fn from_value(value: serde_json::Value) -> Result<Self, TaskParseError> {
        let raw_id = value.get("id").map(|id| id.to_string());
        serde_json::from_value(value).map_err(|e| TaskParseError {
            raw_id,
            message: e.to_string(),
        })
    }

    /// The newest annotation that was not cancelled.
    ///
    /// Annotations are ordered by `created_at`; on equal timestamps the one
    /// later in the list wins.
    pub fn latest_valid_annotation(&self) -> Option<&Annotation> {
        self.annotations
            .as_deref()?
            .iter()
            .filter(|a| !a.was_cancelled)
            .max_by(|a, b| compare_created(a, b))
    }

    /// Whether a human has finished labelling this task.
    ///
    /// With annotation bodies present, the latest valid annotation must have
    /// a non-empty result. Exports without bodies fall back to
    /// `total_annotations`.
    pub fn is_annotated(&self) -> bool {
        match &self.annotations {
            Some(_) => self
                .latest_valid_annotation()
                .is_some_and(|a| !a.result.is_empty()),
            None => self.total_annotations > 0,
        }
    }

    /// Class label from the latest valid annotation's first choice.
    pub fn class_label(&self) -> Result<String, SkipReason> {
        let annotation = self
            .latest_valid_annotation()
            .filter(|a| !a.result.is_empty())
            .ok_or(SkipReason::NoValidAnnotation)?;

        annotation
            .result
            .iter()
            .find_map(|r| r.value.choices.first())
            .map(|choice| choice.trim().to_string())
            .filter(|choice| !choice.is_empty())
            .ok_or(SkipReason::NoChoice)
    }

    pub fn image_ref(&self) -> Result<ImageRef, SkipReason> {
        let url = self
            .data
            .image
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(SkipReason::MissingImage)?;
        ImageRef::decode(url)
    }
}

fn parse_created(annotation: &Annotation) -> Option<DateTime<FixedOffset>> {
    annotation
        .created_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

fn compare_created(a: &Annotation, b: &Annotation) -> Ordering {
    match (parse_created(a), parse_created(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.created_at.cmp(&b.created_at),
    }
}

// ---------------------------------------------------------------------------
// Image references
// ---------------------------------------------------------------------------

/// A task image decoded to a storage-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    /// Path relative to the mounted frame storage, no leading separator.
    pub relative_path: String,
    /// Bare file name; the identity key inside the dataset.
    pub file_name: String,
}

impl ImageRef {
    /// Decode a task image URL such as
    /// `/data/local-files/?d=webdav_frames/cam%201_000001.jpg`.
    ///
    /// The `d` query parameter wins when present; otherwise the URL path
    /// itself is percent-decoded.
    pub fn decode(url: &str) -> Result<Self, SkipReason> {
        let invalid = || SkipReason::InvalidImageRef {
            url: url.to_string(),
        };

        let decoded = match query_param(url, IMAGE_PATH_PARAM) {
            Some(value) => value,
            None => {
                let path = url.split(['?', '#']).next().unwrap_or_default();
                percent_decode_str(path).decode_utf8_lossy().into_owned()
            }
        };

        let relative_path = decoded.trim().trim_start_matches('/').to_string();
        let file_name = relative_path
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(invalid)?
            .to_string();

        Ok(Self {
            relative_path,
            file_name,
        })
    }

    /// Location of the image under the mounted storage root.
    ///
    /// A leading component equal to the mount root's own directory name is
    /// dropped, so `webdav_frames/a.jpg` under `/mnt/webdav_frames` resolves
    /// to `/mnt/webdav_frames/a.jpg`.
    pub fn resolve(&self, mounted_root: &Path) -> PathBuf {
        let relative = Path::new(&self.relative_path);
        let mut components = relative
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .peekable();

        let repeats_root = match (components.peek(), mounted_root.file_name()) {
            (Some(Component::Normal(first)), Some(root_name)) => *first == root_name,
            _ => false,
        };
        if repeats_root {
            components.next();
        }

        let mut resolved = mounted_root.to_path_buf();
        resolved.extend(components);
        resolved
    }
}

fn query_param(url: &str, key: &str) -> Option<String> {
    let base = url::Url::parse("http://localhost/").ok()?;
    let parsed = url::Url::options().base_url(Some(&base)).parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn task(value: serde_json::Value) -> AnnotationTask {
        AnnotationTask::from_value(value).unwrap()
    }

    fn choice(label: &str) -> serde_json::Value {
        json!([{ "type": "choices", "value": { "choices": [label] } }])
    }

    // -- latest valid annotation ----------------------------------------

    #[test]
    fn latest_annotation_wins() {
        let t = task(json!({
            "id": 1,
            "annotations": [
                { "created_at": "2024-05-06T10:00:00Z", "result": choice("free") },
                { "created_at": "2024-05-07T10:00:00Z", "result": choice("occupied") },
            ],
        }));
        assert_eq!(t.class_label().unwrap(), "occupied");
    }

    #[test]
    fn cancelled_annotations_are_ignored() {
        let t = task(json!({
            "id": 2,
            "annotations": [
                { "created_at": "2024-05-06T10:00:00Z", "result": choice("free") },
                { "created_at": "2024-05-09T10:00:00Z", "was_cancelled": true, "result": choice("occupied") },
            ],
        }));
        assert_eq!(t.class_label().unwrap(), "free");
    }

    #[test]
    fn equal_timestamps_prefer_later_entry() {
        let t = task(json!({
            "id": 3,
            "annotations": [
                { "created_at": "2024-05-06T10:00:00Z", "result": choice("a") },
                { "created_at": "2024-05-06T10:00:00Z", "result": choice("b") },
            ],
        }));
        assert_eq!(t.class_label().unwrap(), "b");
    }

    #[test]
    fn empty_result_has_no_label() {
        let t = task(json!({
            "id": 4,
            "annotations": [{ "created_at": "2024-05-06T10:00:00Z", "result": [] }],
        }));
        assert_matches!(t.class_label(), Err(SkipReason::NoValidAnnotation));
        assert!(!t.is_annotated());
    }

    #[test]
    fn result_without_choices_is_skipped() {
        let t = task(json!({
            "id": 5,
            "annotations": [{ "result": [{ "type": "rectanglelabels", "value": {} }] }],
        }));
        assert_matches!(t.class_label(), Err(SkipReason::NoChoice));
        assert!(t.is_annotated());
    }

    // -- annotated rule --------------------------------------------------

    #[test]
    fn count_is_used_only_without_bodies() {
        let counted = task(json!({ "id": 6, "total_annotations": 2 }));
        assert!(counted.is_annotated());

        let empty_list = task(json!({ "id": 7, "annotations": [], "total_annotations": 2 }));
        assert!(!empty_list.is_annotated());

        let nothing = task(json!({ "id": 8 }));
        assert!(!nothing.is_annotated());
    }

    // -- image references ------------------------------------------------

    #[test]
    fn decodes_local_files_url() {
        let image = ImageRef::decode("/data/local-files/?d=webdav_frames/cam%201_000003.jpg").unwrap();
        assert_eq!(image.relative_path, "webdav_frames/cam 1_000003.jpg");
        assert_eq!(image.file_name, "cam 1_000003.jpg");
    }

    #[test]
    fn decodes_plain_path() {
        let image = ImageRef::decode("/frames/a%20b.jpg").unwrap();
        assert_eq!(image.relative_path, "frames/a b.jpg");
        assert_eq!(image.file_name, "a b.jpg");
    }

    #[test]
    fn directory_reference_is_invalid() {
        assert_matches!(
            ImageRef::decode("/data/local-files/?d=frames/"),
            Err(SkipReason::InvalidImageRef { .. })
        );
    }

    #[test]
    fn resolve_drops_mount_name() {
        let image = ImageRef::decode("/data/local-files/?d=webdav_frames/x.jpg").unwrap();
        assert_eq!(
            image.resolve(Path::new("/mnt/webdav_frames")),
            PathBuf::from("/mnt/webdav_frames/x.jpg")
        );

        let other = ImageRef::decode("/data/local-files/?d=other/x.jpg").unwrap();
        assert_eq!(
            other.resolve(Path::new("/mnt/webdav_frames")),
            PathBuf::from("/mnt/webdav_frames/other/x.jpg")
        );
    }

    #[test]
    fn missing_image_is_skip_reason() {
        let t = task(json!({ "id": 9, "data": {} }));
        assert_matches!(t.image_ref(), Err(SkipReason::MissingImage));
    }

    // -- batch parsing ---------------------------------------------------

    #[test]
    fn batch_collects_rejects() {
        let batch = TaskBatch::from_values(vec![
            json!({ "id": 1, "data": { "image": "/x.jpg" } }),
            json!({ "id": "abc" }),
            json!({ "data": {} }),
            json!({ "id": 2, "annotations": "broken" }),
        ]);
        assert_eq!(batch.tasks.len(), 1);
        assert_eq!(batch.rejected.len(), 3);
        assert_eq!(batch.rejected[0].raw_id.as_deref(), Some("\"abc\""));
        assert_eq!(batch.rejected[1].raw_id, None);
        assert_eq!(batch.rejected[2].raw_id.as_deref(), Some("2"));
    }
}
