//! Pipeline configuration loaded from environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::sampling::{FrameRates, DEFAULT_FPS_BUNKER, DEFAULT_FPS_EURO};
use crate::types::DatasetLayout;

/// Registrators whose recordings are never harvested.
pub const DEFAULT_BLACKLISTED_REGISTRATORS: &[&str] =
    &["018270348452", "104039", "2024050601", "118270348452"];

/// Hard ceiling on frames resident in remote frame storage.
pub const DEFAULT_FRAME_STORAGE_CEILING: u64 = 5000;

/// Frame budget used when a caller does not pass one.
pub const DEFAULT_MAX_FRAMES: u64 = 3000;

/// Seconds between two harvest cycles of the worker.
pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 3600;

/// Connection settings for the WebDAV archive.
#[derive(Debug, Clone)]
pub struct WebDavSettings {
    pub host: String,
    pub login: String,
    pub password: String,
}

/// Connection settings for the annotation service.
#[derive(Debug, Clone)]
pub struct LabelStudioSettings {
    /// Base URL without the `/api` suffix.
    pub url: String,
    pub token: String,
    pub project_id: i64,
    pub storage_id: i64,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub webdav: WebDavSettings,
    pub labelstudio: LabelStudioSettings,
    /// rclone remote specification mounted at `mounted_path`.
    pub webdav_remote: String,
    /// Local mount point of the remote frame directory.
    pub mounted_path: PathBuf,
    /// Run rclone in the foreground with VFS caching (systemd unit) instead of `--daemon`.
    pub mount_from_systemd: bool,
    /// Root of the remote video archive.
    pub base_remote_dir: String,
    /// Remote directory receiving extracted frames.
    pub remote_frame_dir: String,
    pub local_video_dir: PathBuf,
    pub frame_dir_temp: PathBuf,
    pub download_history_file: PathBuf,
    /// Persisted operator defaults for frame budget and dry runs.
    pub runtime_settings_file: PathBuf,
    pub blacklisted_registrators: Vec<String>,
    pub frame_rates: FrameRates,
    pub frame_storage_ceiling: u64,
    pub default_max_frames: u64,
    pub dataset_path: PathBuf,
    pub dataset_layout: DatasetLayout,
    /// Symlink dataset images to the mounted source instead of copying.
    pub dataset_symlink: bool,
    pub archive_path: PathBuf,
    pub archive_wait: Duration,
    pub cycle_interval: Duration,
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                               |
    /// |-----------------------------|---------------------------------------|
    /// | `WEBDAV_HOST`               | `http://localhost:8080`               |
    /// | `WEBDAV_LOGIN`              | empty                                 |
    /// | `WEBDAV_PASSWORD`           | empty                                 |
    /// | `WEBDAV_REMOTE`             | `webdav:/Tracker/annotation_frames`   |
    /// | `MOUNTED_PATH`              | `/mnt/webdav_frames`                  |
    /// | `MOUNT_FROM_SYSTEMD`        | `false`                               |
    /// | `BASE_REMOTE_DIR`           | `/Tracker/Видео выгрузок`             |
    /// | `REMOTE_FRAME_DIR`          | `/Tracker/annotation_frames`          |
    /// | `LOCAL_VIDEO_DIR`           | `misc/videos_temp`                    |
    /// | `FRAME_DIR_TEMP`            | `misc/frames_temp`                    |
    /// | `DOWNLOAD_HISTORY_FILE`     | `downloaded_videos.json`              |
    /// | `RUNTIME_SETTINGS_FILE`     | `config.json`                         |
    /// | `BLACKLISTED_REGISTRATORS`  | built-in list (comma-separated)       |
    /// | `FRAMES_PER_SECOND_EURO`    | `1.0`                                 |
    /// | `FRAMES_PER_SECOND_BUNKER`  | `0.2`                                 |
    /// | `FRAME_STORAGE_CEILING`     | `5000`                                |
    /// | `DEFAULT_MAX_FRAMES`        | `3000`                                |
    /// | `DATASET_PATH`              | `dataset`                             |
    /// | `DATASET_LAYOUT`            | `classification`                      |
    /// | `DATASET_SYMLINK`           | `false`                               |
    /// | `ARCHIVE_PATH`              | `dataset.zip`                         |
    /// | `ARCHIVE_WAIT_SECS`         | `60`                                  |
    /// | `LABELSTUDIO_URL`           | `http://localhost:8081`               |
    /// | `LABELSTUDIO_TOKEN`         | empty                                 |
    /// | `LABELSTUDIO_PROJECT_ID`    | `2`                                   |
    /// | `LABELSTUDIO_STORAGE_ID`    | `2`                                   |
    /// | `CYCLE_INTERVAL_SECS`       | `3600`                                |
    pub fn from_env() -> Self {
        let webdav = WebDavSettings {
            host: env_or("WEBDAV_HOST", "http://localhost:8080"),
            login: env_or("WEBDAV_LOGIN", ""),
            password: env_or("WEBDAV_PASSWORD", ""),
        };

        let labelstudio = LabelStudioSettings {
            url: env_or("LABELSTUDIO_URL", "http://localhost:8081")
                .trim_end_matches('/')
                .to_string(),
            token: env_or("LABELSTUDIO_TOKEN", ""),
            project_id: env_parse("LABELSTUDIO_PROJECT_ID", 2),
            storage_id: env_parse("LABELSTUDIO_STORAGE_ID", 2),
        };

        let blacklisted_registrators = env_list("BLACKLISTED_REGISTRATORS", DEFAULT_BLACKLISTED_REGISTRATORS);

        Self {
            webdav,
            labelstudio,
            webdav_remote: env_or("WEBDAV_REMOTE", "webdav:/Tracker/annotation_frames"),
            mounted_path: env_or("MOUNTED_PATH", "/mnt/webdav_frames").into(),
            mount_from_systemd: env_parse("MOUNT_FROM_SYSTEMD", false),
            base_remote_dir: env_or("BASE_REMOTE_DIR", "/Tracker/Видео выгрузок"),
            remote_frame_dir: env_or("REMOTE_FRAME_DIR", "/Tracker/annotation_frames"),
            local_video_dir: env_or("LOCAL_VIDEO_DIR", "misc/videos_temp").into(),
            frame_dir_temp: env_or("FRAME_DIR_TEMP", "misc/frames_temp").into(),
            download_history_file: env_or("DOWNLOAD_HISTORY_FILE", "downloaded_videos.json").into(),
            runtime_settings_file: env_or("RUNTIME_SETTINGS_FILE", "config.json").into(),
            blacklisted_registrators,
            frame_rates: FrameRates {
                euro: env_parse("FRAMES_PER_SECOND_EURO", DEFAULT_FPS_EURO),
                bunker: env_parse("FRAMES_PER_SECOND_BUNKER", DEFAULT_FPS_BUNKER),
            },
            frame_storage_ceiling: env_parse("FRAME_STORAGE_CEILING", DEFAULT_FRAME_STORAGE_CEILING),
            default_max_frames: env_parse("DEFAULT_MAX_FRAMES", DEFAULT_MAX_FRAMES),
            dataset_path: env_or("DATASET_PATH", "dataset").into(),
            dataset_layout: env_parse("DATASET_LAYOUT", DatasetLayout::Classification),
            dataset_symlink: env_parse("DATASET_SYMLINK", false),
            archive_path: env_or("ARCHIVE_PATH", "dataset.zip").into(),
            archive_wait: Duration::from_secs(env_parse("ARCHIVE_WAIT_SECS", 60)),
            cycle_interval: Duration::from_secs(env_parse(
                "CYCLE_INTERVAL_SECS",
                DEFAULT_CYCLE_INTERVAL_SECS,
            )),
        }
    }

    /// Configuration with every local path placed under `dir`.
    ///
    /// Remote endpoints point at localhost; used by tests and local runs.
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            webdav: WebDavSettings {
                host: "http://localhost:8080".into(),
                login: String::new(),
                password: String::new(),
            },
            labelstudio: LabelStudioSettings {
                url: "http://localhost:8081".into(),
                token: String::new(),
                project_id: 2,
                storage_id: 2,
            },
            webdav_remote: "webdav:/frames".into(),
            mounted_path: dir.join("webdav_frames"),
            mount_from_systemd: false,
            base_remote_dir: "/videos".into(),
            remote_frame_dir: "/frames".into(),
            local_video_dir: dir.join("videos_temp"),
            frame_dir_temp: dir.join("frames_temp"),
            download_history_file: dir.join("downloaded_videos.json"),
            runtime_settings_file: dir.join("config.json"),
            blacklisted_registrators: DEFAULT_BLACKLISTED_REGISTRATORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            frame_rates: FrameRates::default(),
            frame_storage_ceiling: DEFAULT_FRAME_STORAGE_CEILING,
            default_max_frames: DEFAULT_MAX_FRAMES,
            dataset_path: dir.join("dataset"),
            dataset_layout: DatasetLayout::Classification,
            dataset_symlink: false,
            archive_path: dir.join("dataset.zip"),
            archive_wait: Duration::from_secs(60),
            cycle_interval: Duration::from_secs(DEFAULT_CYCLE_INTERVAL_SECS),
        }
    }

    /// Lock file guarding archive packaging, next to the archive.
    pub fn archive_lock_path(&self) -> PathBuf {
        let mut name = self
            .archive_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "dataset.zip".into());
        name.push(".lock");
        self.archive_path.with_file_name(name)
    }
}

/// String setting with a default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Comma-separated setting; blank items are dropped.
pub fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(list) => split_list(&list),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parsed setting with a default. Startup configuration fails fast: an
/// unparseable value panics with the variable name.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}
