#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use lswb_core::config::PipelineConfig;
use lswb_core::retry::RetryPolicy;
use lswb_core::task::TaskBatch;
use lswb_core::types::TaskId;
use lswb_core::video_name::VideoName;
use lswb_labelstudio::{AnnotationService, LabelStudioError};
use lswb_pipeline::{DecodeError, DownloadHistory, FrameSource, PipelineContext, VideoDecoder};
use lswb_webdav::{LocalDirectory, NoRemount, RemoteEntry, RemoteError, RemoteFileSystem};
use serde_json::json;

// ---------------------------------------------------------------------------
// Synthetic videos
// ---------------------------------------------------------------------------

/// Decodes fixture "videos" whose content is `"{fps} {frame_count}"`.
pub struct SyntheticDecoder;

#[async_trait]
impl VideoDecoder for SyntheticDecoder {
    async fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, DecodeError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| DecodeError::VideoNotFound(path.display().to_string()))?;
        let mut parts = text.split_whitespace();
        let fps = parts.next().and_then(|s| s.parse::<f64>().ok());
        let frames = parts.next().and_then(|s| s.parse::<u64>().ok());
        match (fps, frames) {
            (Some(fps), Some(frames)) => Ok(Box::new(SyntheticSource {
                fps,
                remaining: frames,
                current: None,
                index: 0,
            })),
            _ => Err(DecodeError::ParseError(format!("not a synthetic video: {text:?}"))),
        }
    }
}

struct SyntheticSource {
    fps: f64,
    remaining: u64,
    current: Option<u8>,
    index: u64,
}

#[async_trait]
impl FrameSource for SyntheticSource {
    fn native_fps(&self) -> f64 {
        self.fps
    }

    async fn grab(&mut self) -> Result<bool, DecodeError> {
        if self.remaining == 0 {
            self.current = None;
            return Ok(false);
        }
        self.remaining -= 1;
        self.current = Some((self.index % 256) as u8);
        self.index += 1;
        Ok(true)
    }

    fn retrieve(&mut self) -> Result<RgbImage, DecodeError> {
        let shade = self.current.ok_or(DecodeError::NoFrame)?;
        Ok(RgbImage::from_pixel(8, 8, Rgb([shade, shade, shade])))
    }
}

// ---------------------------------------------------------------------------
// Remote storage
// ---------------------------------------------------------------------------

/// Local remote store whose uploads start failing after `succeed` uploads.
pub struct FailingUploads {
    pub inner: LocalDirectory,
    pub succeed: usize,
    pub attempts: AtomicUsize,
}

impl FailingUploads {
    pub fn new(inner: LocalDirectory, succeed: usize) -> Self {
        Self {
            inner,
            succeed,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RemoteFileSystem for FailingUploads {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        self.inner.list(path).await
    }

    async fn is_dir(&self, path: &str) -> Result<bool, RemoteError> {
        self.inner.is_dir(path).await
    }

    async fn exists(&self, path: &str) -> Result<bool, RemoteError> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.inner.read(path).await
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<u64, RemoteError> {
        self.inner.download(remote, local).await
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.succeed {
            return Err(RemoteError::Status {
                status: 507,
                path: remote.to_string(),
                body: "Insufficient Storage".into(),
            });
        }
        self.inner.upload(local, remote).await
    }
}

// ---------------------------------------------------------------------------
// Annotation service
// ---------------------------------------------------------------------------

/// Serves a fixed task export and records what was deleted.
#[derive(Default)]
pub struct ScriptedAnnotations {
    tasks: Vec<serde_json::Value>,
    refuse: HashSet<TaskId>,
    pub deleted: Mutex<Vec<TaskId>>,
    pub syncs: AtomicUsize,
}

impl ScriptedAnnotations {
    pub fn new(tasks: Vec<serde_json::Value>) -> Self {
        Self {
            tasks,
            ..Default::default()
        }
    }

    /// Deletion of these ids answers with a refusal.
    pub fn refusing(mut self, ids: &[TaskId]) -> Self {
        self.refuse.extend(ids);
        self
    }

    pub fn deleted(&self) -> Vec<TaskId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn sync_count(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnnotationService for ScriptedAnnotations {
    async fn list_tasks(&self) -> Result<TaskBatch, LabelStudioError> {
        Ok(TaskBatch::from_values(self.tasks.clone()))
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool, LabelStudioError> {
        if self.refuse.contains(&id) {
            return Ok(false);
        }
        self.deleted.lock().unwrap().push(id);
        Ok(true)
    }

    async fn sync_storage(&self) -> Result<bool, LabelStudioError> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

pub fn annotated_task(id: i64, image: &str, choice: &str) -> serde_json::Value {
    json!({
        "id": id,
        "data": { "image": image },
        "annotations": [{
            "id": id * 10,
            "was_cancelled": false,
            "created_at": "2024-06-01T12:00:00Z",
            "result": [{ "type": "choices", "from_name": "cargo", "value": { "choices": [choice] } }]
        }],
        "total_annotations": 1
    })
}

pub fn unannotated_task(id: i64, image: &str) -> serde_json::Value {
    json!({
        "id": id,
        "data": { "image": image },
        "annotations": [],
        "total_annotations": 0
    })
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// A temporary directory holding the remote archive, frame storage and every
/// local path of a [`PipelineConfig`].
pub struct Fixture {
    _dir: tempfile::TempDir,
    pub root: PathBuf,
    /// Backing directory of the fake remote store.
    pub remote_root: PathBuf,
    pub config: PipelineConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let remote_root = root.join("remote");
        let config = PipelineConfig::rooted_at(&root);
        std::fs::create_dir_all(remote_root.join("frames")).unwrap();
        std::fs::create_dir_all(remote_root.join("videos")).unwrap();
        std::fs::create_dir_all(&config.mounted_path).unwrap();
        Self {
            _dir: dir,
            root,
            remote_root,
            config,
        }
    }

    pub fn remote(&self) -> LocalDirectory {
        LocalDirectory::new(&self.remote_root)
    }

    fn write_remote(&self, remote_path: &str, content: &[u8]) {
        let path = self.remote().local_path(remote_path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Place a synthetic recording in its archive folder; returns its remote path.
    pub fn video(&self, name: &str, fps: f64, frames: u64) -> String {
        let folder = VideoName::parse(name).unwrap().folder(&self.config.base_remote_dir);
        let path = format!("{folder}/{name}");
        self.write_remote(&path, format!("{fps} {frames}").as_bytes());
        path
    }

    /// Write the cargo report next to a recording.
    pub fn report(&self, video_path: &str, switch_code: i64) {
        let folder = video_path.rsplit_once('/').unwrap().0;
        let report = json!({ "switch_events": [{ "switch": switch_code }] });
        self.write_remote(&format!("{folder}/report.json"), report.to_string().as_bytes());
    }

    /// Fill frame storage with `count` placeholder frames.
    pub fn stored(&self, count: usize) {
        for i in 0..count {
            self.write_remote(&format!("/frames/old_{i:06}.jpg"), b"jpeg");
        }
    }

    /// Names of the frames in remote storage, sorted.
    pub fn frames(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.remote_root.join("frames"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Write a frame into the mounted storage and return the task image URL.
    pub fn mounted_frame(&self, name: &str) -> String {
        std::fs::write(self.config.mounted_path.join(name), b"jpeg").unwrap();
        format!("/data/local-files/?d=webdav_frames/{}", name.replace(' ', "%20"))
    }

    pub fn context(&self, remote: Arc<dyn RemoteFileSystem>, annotations: Arc<dyn AnnotationService>) -> PipelineContext {
        let history = DownloadHistory::empty(&self.config.download_history_file);
        PipelineContext::new(
            self.config.clone(),
            remote,
            Arc::new(NoRemount),
            annotations,
            Arc::new(SyntheticDecoder),
            history,
        )
        .with_retry(RetryPolicy::immediate(2), RetryPolicy::immediate(2))
    }

    pub fn default_context(&self) -> PipelineContext {
        self.context(Arc::new(self.remote()), Arc::new(ScriptedAnnotations::default()))
    }
}
