//! Everything a pipeline run needs, passed explicitly.

use std::sync::Arc;

use lswb_core::config::PipelineConfig;
use lswb_core::retry::RetryPolicy;
use lswb_labelstudio::{AnnotationService, LabelStudioApi};
use lswb_webdav::{RcloneMount, RemoteFileSystem, Remount, WebDavClient};
use tokio::sync::Mutex;

use crate::decoder::VideoDecoder;
use crate::error::PipelineError;
use crate::ffmpeg::FfmpegDecoder;
use crate::history::DownloadHistory;
use crate::runtime::{RuntimeSettings, RuntimeStore};

pub struct PipelineContext {
    pub config: PipelineConfig,
    pub remote: Arc<dyn RemoteFileSystem>,
    pub mount: Arc<dyn Remount>,
    pub annotations: Arc<dyn AnnotationService>,
    pub decoder: Arc<dyn VideoDecoder>,
    pub history: Mutex<DownloadHistory>,
    pub runtime: Mutex<RuntimeStore>,
    /// Listing, reading and downloading.
    pub remote_retry: RetryPolicy,
    pub upload_retry: RetryPolicy,
}

impl PipelineContext {
    pub fn new(
        config: PipelineConfig,
        remote: Arc<dyn RemoteFileSystem>,
        mount: Arc<dyn Remount>,
        annotations: Arc<dyn AnnotationService>,
        decoder: Arc<dyn VideoDecoder>,
        history: DownloadHistory,
    ) -> Self {
        let runtime = RuntimeStore::new(
            config.runtime_settings_file.clone(),
            RuntimeSettings::from_config(&config),
        );
        Self {
            runtime: Mutex::new(runtime),
            config,
            remote,
            mount,
            annotations,
            decoder,
            history: Mutex::new(history),
            remote_retry: RetryPolicy::remote_io(),
            upload_retry: RetryPolicy::frame_upload(),
        }
    }

    /// Wire the production collaborators: WebDAV over HTTP, rclone mount,
    /// Label Studio REST API and ffmpeg decoding.
    pub async fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::new();
        let remote = WebDavClient::with_client(client.clone(), &config.webdav)?;
        let annotations = LabelStudioApi::with_client(client, &config.labelstudio);
        let mount = RcloneMount::new(
            config.webdav_remote.clone(),
            config.mounted_path.clone(),
            config.mount_from_systemd,
        );
        let history = DownloadHistory::load(&config.download_history_file).await?;
        let runtime =
            RuntimeStore::load(&config.runtime_settings_file, RuntimeSettings::from_config(&config)).await?;

        Ok(Self::new(
            config,
            Arc::new(remote),
            Arc::new(mount),
            Arc::new(annotations),
            Arc::new(FfmpegDecoder),
            history,
        )
        .with_runtime(runtime))
    }

    pub fn with_runtime(mut self, runtime: RuntimeStore) -> Self {
        self.runtime = Mutex::new(runtime);
        self
    }

    pub fn with_retry(mut self, remote_retry: RetryPolicy, upload_retry: RetryPolicy) -> Self {
        self.remote_retry = remote_retry;
        self.upload_retry = upload_retry;
        self
    }
}
