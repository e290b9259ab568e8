//! Recorder file naming.
//!
//! Recordings are named `REGID_YYYY.M.D H.M.S-H.M.S.ext` and stored at
//! `{base}/{REGID}/{YYYY.M.D}/{name without extension}/`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::CoreError;
use crate::paths::{file_name, file_stem, join_remote, normalize_remote_path};

static VIDEO_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<reg_id>[A-Z0-9]+)_(?P<year>\d{4})\.(?P<month>\d{1,2})\.(?P<day>\d{1,2}) (?P<start>\d{1,2}\.\d{1,2}\.\d{1,2})-(?P<end>\d{1,2}\.\d{1,2}\.\d{1,2})\.(?P<ext>\w+)$",
    )
    .expect("video name regex is valid")
});

/// Components of a recorder video file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoName {
    pub registrator_id: String,
    /// Capture day as written in the name, e.g. `2024.5.6`.
    pub capture_date: String,
    pub start: String,
    pub end: String,
    pub extension: String,
    /// File name without its extension; also the name of the video folder.
    pub base_name: String,
}

impl VideoName {
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        let caps = VIDEO_NAME_RE.captures(name).ok_or_else(|| {
            CoreError::Validation(format!(
                "video name '{name}' does not match REGID_YYYY.M.D H.M.S-H.M.S.ext"
            ))
        })?;

        Ok(Self {
            registrator_id: caps["reg_id"].to_string(),
            capture_date: format!("{}.{}.{}", &caps["year"], &caps["month"], &caps["day"]),
            start: caps["start"].to_string(),
            end: caps["end"].to_string(),
            extension: caps["ext"].to_string(),
            base_name: file_stem(name).to_string(),
        })
    }

    /// Remote folder expected to hold this recording under `base_dir`.
    pub fn folder(&self, base_dir: &str) -> String {
        let dir = join_remote(base_dir, &self.registrator_id);
        let dir = join_remote(&dir, &self.capture_date);
        join_remote(&dir, &self.base_name)
    }
}

/// A remote video eligible for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoCandidate {
    /// Normalized remote path; the identity of the candidate.
    pub remote_path: String,
    pub file_name: String,
    pub registrator_id: Option<String>,
    pub capture_date: Option<String>,
    pub base_name: String,
}

impl VideoCandidate {
    /// Build a candidate from a remote path. Names that do not follow the
    /// recorder convention still produce a candidate without metadata.
    pub fn from_remote_path(path: &str) -> Self {
        let remote_path = normalize_remote_path(path);
        let name = file_name(&remote_path).to_string();
        let parsed = VideoName::parse(&name).ok();
        Self {
            base_name: file_stem(&name).to_string(),
            registrator_id: parsed.as_ref().map(|p| p.registrator_id.clone()),
            capture_date: parsed.map(|p| p.capture_date),
            file_name: name,
            remote_path,
        }
    }
}

/// Whether a file name mentions any blacklisted registrator.
pub fn is_blacklisted(name: &str, blacklist: &[String]) -> bool {
    blacklist
        .iter()
        .any(|id| !id.is_empty() && name.contains(id.as_str()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_recorder_name() {
        let name = VideoName::parse("A1B2_2024.5.6 10.11.12-10.21.12.mp4").unwrap();
        assert_eq!(name.registrator_id, "A1B2");
        assert_eq!(name.capture_date, "2024.5.6");
        assert_eq!(name.start, "10.11.12");
        assert_eq!(name.end, "10.21.12");
        assert_eq!(name.extension, "mp4");
        assert_eq!(name.base_name, "A1B2_2024.5.6 10.11.12-10.21.12");
    }

    #[test]
    fn builds_expected_folder() {
        let name = VideoName::parse("R7_2023.12.01 1.2.3-4.5.6.mp4").unwrap();
        assert_eq!(
            name.folder("/Tracker/videos/"),
            "/Tracker/videos/R7/2023.12.01/R7_2023.12.01 1.2.3-4.5.6"
        );
    }

    #[test]
    fn rejects_malformed_names() {
        assert_matches!(VideoName::parse("clip.mp4"), Err(CoreError::Validation(_)));
        assert_matches!(
            VideoName::parse("lower_2024.5.6 1.2.3-4.5.6.mp4"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn candidate_from_path() {
        let c = VideoCandidate::from_remote_path("/v//R7/2023.1.2/x/R7_2023.1.2 1.2.3-4.5.6.mp4");
        assert_eq!(c.remote_path, "/v/R7/2023.1.2/x/R7_2023.1.2 1.2.3-4.5.6.mp4");
        assert_eq!(c.registrator_id.as_deref(), Some("R7"));

        let plain = VideoCandidate::from_remote_path("/v/other.mp4");
        assert_eq!(plain.registrator_id, None);
        assert_eq!(plain.base_name, "other");
    }

    #[test]
    fn blacklist_is_substring_match() {
        let blacklist = vec!["104039".to_string()];
        assert!(is_blacklisted("104039_2024.1.1 1.1.1-1.1.2.mp4", &blacklist));
        assert!(!is_blacklisted("777_2024.1.1 1.1.1-1.1.2.mp4", &blacklist));
        assert!(!is_blacklisted("x.mp4", &[String::new()]));
    }
}
