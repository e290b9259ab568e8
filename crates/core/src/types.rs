/// Annotation-service task identifiers.
pub type TaskId = i64;

/// On-disk dataset layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetLayout {
    /// `{split}/{class}/*.jpg` with `labels.txt`.
    Classification,
    /// `images/{split}/*.jpg`, `labels/{split}/*.txt` with `classes.txt`.
    Detection,
}

impl std::str::FromStr for DatasetLayout {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" | "cls" => Ok(Self::Classification),
            "detection" | "yolo" => Ok(Self::Detection),
            other => Err(crate::error::CoreError::Validation(format!(
                "unknown dataset layout '{other}'"
            ))),
        }
    }
}
