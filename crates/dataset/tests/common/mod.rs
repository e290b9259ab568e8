use std::path::PathBuf;

use lswb_core::task::TaskBatch;
use serde_json::json;

/// Frame storage and dataset root inside one temporary directory.
pub struct Workspace {
    _dir: tempfile::TempDir,
    pub frames: PathBuf,
    pub dataset: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("webdav_frames");
        std::fs::create_dir_all(&frames).unwrap();
        Self {
            dataset: dir.path().join("dataset"),
            frames,
            _dir: dir,
        }
    }

    /// Write a frame to storage and return the task image URL pointing at it.
    pub fn frame(&self, name: &str) -> String {
        std::fs::write(self.frames.join(name), name.as_bytes()).unwrap();
        format!("/data/local-files/?d=webdav_frames/{}", name.replace(' ', "%20"))
    }

    /// Every file under the dataset root, sorted.
    pub fn dataset_files(&self) -> Vec<PathBuf> {
        walkdir::WalkDir::new(&self.dataset)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    }
}

/// A task with one completed choice annotation.
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

/// Seven `free` and three `occupied` frames, annotated.
pub fn seven_three_batch(ws: &Workspace) -> TaskBatch {
    let tasks = (0..10).map(|i| {
        let class = if i < 7 { "free" } else { "occupied" };
        let image = ws.frame(&format!("R7_2024.5.1 10.0.0-10.5.0_{i:06}.jpg"));
        annotated_task(i + 1, &image, class)
    });
    TaskBatch::from_values(tasks)
}
