use async_trait::async_trait;
use lswb_core::task::TaskBatch;
use lswb_core::types::TaskId;

use crate::api::LabelStudioError;

/// Operations the pipeline needs from the annotation tool.
#[async_trait]
pub trait AnnotationService: Send + Sync {
    /// Every task of the configured project, parsed at the boundary.
    async fn list_tasks(&self) -> Result<TaskBatch, LabelStudioError>;

    /// Delete one task. `Ok(false)` when the service refused.
    async fn delete_task(&self, id: TaskId) -> Result<bool, LabelStudioError>;

    /// Re-scan the local-files storage backing the project.
    async fn sync_storage(&self) -> Result<bool, LabelStudioError>;
}
