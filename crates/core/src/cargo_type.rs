//! Cargo type derived from the `report.json` sidecar of a recording.
//!
//! The recorder writes the state of its cargo switch as the first
//! `switch_events` entry. Two codes are meaningful; everything else is
//! treated as unknown.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Switch code written for bunker loads.
pub const SWITCH_CODE_BUNKER: i64 = 22;

/// Switch code written for euro-pallet loads.
pub const SWITCH_CODE_EURO: i64 = 23;

/// Name of the sidecar metadata file stored next to each video.
pub const REPORT_FILE_NAME: &str = "report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CargoType {
    Bunker,
    Euro,
    Unknown,
}

/// Why a report could not be turned into a cargo type.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("report has no switch events")]
    NoSwitchEvents,

    #[error("first switch event has no numeric switch code")]
    MissingSwitchCode,
}

#[derive(Debug, Deserialize)]
struct Report {
    #[serde(default)]
    switch_events: Vec<SwitchEvent>,
}

#[derive(Debug, Deserialize)]
struct SwitchEvent {
    #[serde(default)]
    switch: Option<serde_json::Value>,
}

impl CargoType {
    pub fn from_switch_code(code: i64) -> Self {
        match code {
            SWITCH_CODE_BUNKER => Self::Bunker,
            SWITCH_CODE_EURO => Self::Euro,
            _ => Self::Unknown,
        }
    }

    /// Parse the raw bytes of a `report.json`.
    ///
    /// An unrecognised switch code is a valid report and yields
    /// [`CargoType::Unknown`]; structural problems are errors so the caller
    /// can log them.
    pub fn from_report(bytes: &[u8]) -> Result<Self, ReportError> {
        let report: Report = serde_json::from_slice(bytes)?;
        let first = report
            .switch_events
            .first()
            .ok_or(ReportError::NoSwitchEvents)?;

        let code = match &first.switch {
            Some(serde_json::Value::Number(n)) => n.as_i64(),
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or(ReportError::MissingSwitchCode)?;

        Ok(Self::from_switch_code(code))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bunker => "bunker",
            Self::Euro => "euro",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CargoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CargoType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bunker" => Ok(Self::Bunker),
            "euro" => Ok(Self::Euro),
            "unknown" => Ok(Self::Unknown),
            other => Err(CoreError::Validation(format!(
                "unknown cargo type '{other}', expected bunker, euro or unknown"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn known_codes() {
        let bunker = br#"{"switch_events":[{"switch":22},{"switch":23}]}"#;
        let euro = br#"{"switch_events":[{"switch":23}]}"#;
        assert_eq!(CargoType::from_report(bunker).unwrap(), CargoType::Bunker);
        assert_eq!(CargoType::from_report(euro).unwrap(), CargoType::Euro);
    }

    #[test]
    fn other_code_is_unknown() {
        let report = br#"{"switch_events":[{"switch":7}]}"#;
        assert_eq!(CargoType::from_report(report).unwrap(), CargoType::Unknown);
    }

    #[test]
    fn string_code_is_accepted() {
        let report = br#"{"switch_events":[{"switch":"23"}]}"#;
        assert_eq!(CargoType::from_report(report).unwrap(), CargoType::Euro);
    }

    #[test]
    fn structural_problems_are_errors() {
        assert_matches!(
            CargoType::from_report(br#"{"switch_events":[]}"#),
            Err(ReportError::NoSwitchEvents)
        );
        assert_matches!(
            CargoType::from_report(br#"{"switch_events":[{}]}"#),
            Err(ReportError::MissingSwitchCode)
        );
        assert_matches!(CargoType::from_report(b"not json"), Err(ReportError::Json(_)));
    }

    #[test]
    fn parses_filter_values() {
        assert_eq!("Euro".parse::<CargoType>().unwrap(), CargoType::Euro);
        assert_matches!("pallet".parse::<CargoType>(), Err(CoreError::Validation(_)));
    }
}
