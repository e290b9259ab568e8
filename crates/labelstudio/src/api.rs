//! REST API client for the Label Studio HTTP endpoints.
//!
//! Covers paginated task listing, task deletion and local-files storage
//! sync using [`reqwest`]. Requests authenticate with
//! `Authorization: Token <token>`.

use std::collections::HashSet;

use async_trait::async_trait;
use lswb_core::config::LabelStudioSettings;
use lswb_core::retry::{RetryPolicy, Transient};
use lswb_core::task::TaskBatch;
use lswb_core::types::TaskId;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::service::AnnotationService;

/// Tasks requested per page.
pub const PAGE_SIZE: usize = 100;

/// HTTP client for one Label Studio project.
pub struct LabelStudioApi {
    client: reqwest::Client,
    api_url: String,
    token: String,
    project_id: i64,
    storage_id: i64,
    retry: RetryPolicy,
}

/// Errors from the Label Studio REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum LabelStudioError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Label Studio returned a non-2xx status code.
    #[error("Label Studio API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl Transient for LabelStudioError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::ApiError { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

/// One page of `GET /api/tasks`.
///
/// Newer servers wrap the page as `{"tasks": [...], "total": N}`, older
/// ones return a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TaskPage {
    Wrapped {
        #[serde(default)]
        tasks: Vec<serde_json::Value>,
        #[serde(default)]
        total: Option<u64>,
    },
    Bare(Vec<serde_json::Value>),
}

impl TaskPage {
    fn into_parts(self) -> (Vec<serde_json::Value>, Option<u64>) {
        match self {
            Self::Wrapped { tasks, total } => (tasks, total),
            Self::Bare(tasks) => (tasks, None),
        }
    }
}

/// What to do after a page was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVerdict {
    /// Keep the page and request the next one.
    Continue,
    /// Keep the page; it was the last one.
    Last,
    /// Drop the page and stop.
    Stop,
}

/// Stop conditions of task pagination.
#[derive(Debug, Default)]
pub struct Pagination {
    seen: HashSet<String>,
    collected: u64,
}

impl Pagination {
    /// Judge a page of raw task records.
    ///
    /// An empty page ends the listing. A page repeating already-seen ids
    /// means the endpoint is cycling and is dropped. Otherwise the page is
    /// kept, and it is the last one once `total` is reached or the page is
    /// short.
    pub fn accept(&mut self, tasks: &[serde_json::Value], total: Option<u64>) -> PageVerdict {
        if tasks.is_empty() {
            return PageVerdict::Stop;
        }

        let ids: Vec<String> = tasks
            .iter()
            .filter_map(|t| t.get("id").map(|id| id.to_string()))
            .collect();
        let repeats = ids.iter().filter(|id| self.seen.contains(*id)).count();
        if repeats > 0 {
            tracing::warn!(repeats, "Task listing repeated already-seen ids, stopping");
            return PageVerdict::Stop;
        }

        self.seen.extend(ids);
        self.collected += tasks.len() as u64;

        match total {
            Some(total) if self.collected >= total => PageVerdict::Last,
            None if tasks.len() < PAGE_SIZE => PageVerdict::Last,
            _ => PageVerdict::Continue,
        }
    }
}

impl LabelStudioApi {
    /// * `settings.url` - Base URL, e.g. `http://host:8081` (no `/api`).
    pub fn new(settings: &LabelStudioSettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, settings: &LabelStudioSettings) -> Self {
        Self {
            client,
            api_url: format!("{}/api", settings.url.trim_end_matches('/')),
            token: settings.token.clone(),
            project_id: settings.project_id,
            storage_id: settings.storage_id,
            retry: RetryPolicy::remote_io(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    async fn fetch_page(&self, page: u32) -> Result<TaskPage, LabelStudioError> {
        let response = self
            .client
            .get(format!("{}/tasks", self.api_url))
            .query(&[
                ("project", self.project_id.to_string()),
                ("page", page.to_string()),
                ("page_size", PAGE_SIZE.to_string()),
            ])
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, LabelStudioError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LabelStudioError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, LabelStudioError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl AnnotationService for LabelStudioApi {
    async fn list_tasks(&self) -> Result<TaskBatch, LabelStudioError> {
        let mut batch = TaskBatch::default();
        let mut pagination = Pagination::default();
        let mut page = 1u32;

        loop {
            let (tasks, total) = self
                .retry
                .run("labelstudio.list_tasks", move || self.fetch_page(page))
                .await?
                .into_parts();
            tracing::debug!(page, received = tasks.len(), ?total, "Fetched task page");

            match pagination.accept(&tasks, total) {
                PageVerdict::Stop => break,
                PageVerdict::Last => {
                    batch.extend_values(tasks);
                    break;
                }
                PageVerdict::Continue => batch.extend_values(tasks),
            }
            page += 1;
        }

        tracing::info!(
            tasks = batch.tasks.len(),
            rejected = batch.rejected.len(),
            "Loaded annotation tasks",
        );
        Ok(batch)
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool, LabelStudioError> {
        let response = self
            .retry
            .run("labelstudio.delete_task", move || async move {
                self.client
                    .delete(format!("{}/tasks/{id}", self.api_url))
                    .header(reqwest::header::AUTHORIZATION, self.auth_header())
                    .send()
                    .await
                    .map_err(LabelStudioError::from)
            })
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(true);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(task_id = id, status = status.as_u16(), body = %body, "Task deletion refused");
        Ok(false)
    }

    async fn sync_storage(&self) -> Result<bool, LabelStudioError> {
        let response = self
            .retry
            .run("labelstudio.sync_storage", move || async move {
                self.client
                    .post(format!(
                        "{}/storages/localfiles/{}/sync",
                        self.api_url, self.storage_id
                    ))
                    .header(reqwest::header::AUTHORIZATION, self.auth_header())
                    .send()
                    .await
                    .map_err(LabelStudioError::from)
            })
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            tracing::info!(storage_id = self.storage_id, "Storage synced");
            return Ok(true);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(storage_id = self.storage_id, status = status.as_u16(), body = %body, "Storage sync failed");
        Ok(false)
    }
}
