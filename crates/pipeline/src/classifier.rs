//! Cargo type of a recording from the `report.json` beside it.

use lswb_core::cargo_type::{CargoType, REPORT_FILE_NAME};
use lswb_core::paths::{join_remote, parent};
use lswb_core::retry::RetryPolicy;
use lswb_webdav::RemoteFileSystem;

/// Never fails: a missing or unreadable report classifies as
/// [`CargoType::Unknown`].
pub async fn classify(remote: &dyn RemoteFileSystem, video_path: &str, retry: RetryPolicy) -> CargoType {
    let report_path = join_remote(&parent(video_path), REPORT_FILE_NAME);
    let report = report_path.as_str();

    let bytes = match retry.run("webdav.read_report", move || remote.read(report)).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(video = %video_path, report = %report_path, error = %e, "Cargo report unavailable");
            return CargoType::Unknown;
        }
    };

    match CargoType::from_report(&bytes) {
        Ok(cargo) => {
            tracing::info!(video = %video_path, cargo = %cargo, "Classified video");
            cargo
        }
        Err(e) => {
            tracing::warn!(video = %video_path, report = %report_path, error = %e, "Cargo report not understood");
            CargoType::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use lswb_webdav::LocalDirectory;

    use super::*;

    async fn classify_with(report: Option<&str>) -> CargoType {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("videos/R7");
        std::fs::create_dir_all(&folder).unwrap();
        if let Some(body) = report {
            std::fs::write(folder.join("report.json"), body).unwrap();
        }
        let remote = LocalDirectory::new(dir.path());
        classify(&remote, "/videos/R7/a.mp4", RetryPolicy::immediate(1)).await
    }

    #[tokio::test]
    async fn reads_switch_code() {
        assert_eq!(classify_with(Some(r#"{"switch_events":[{"switch":22}]}"#)).await, CargoType::Bunker);
        assert_eq!(classify_with(Some(r#"{"switch_events":[{"switch":23}]}"#)).await, CargoType::Euro);
    }

    #[tokio::test]
    async fn falls_back_to_unknown() {
        assert_eq!(classify_with(None).await, CargoType::Unknown);
        assert_eq!(classify_with(Some("not json")).await, CargoType::Unknown);
        assert_eq!(classify_with(Some(r#"{"switch_events":[]}"#)).await, CargoType::Unknown);
        assert_eq!(classify_with(Some(r#"{"switch_events":[{"switch":7}]}"#)).await, CargoType::Unknown);
    }
}
