//! Handlers for the dataset archive: preparation, status and a range-aware
//! download.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{self, HeaderMap};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use lswb_core::byte_range::{parse_range_header, resolve};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::background::archive::{ArchiveStatus, WaitError};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

const ARCHIVE_CONTENT_TYPE: &str = "application/zip";
const ARCHIVE_FILE_NAME: &str = "dataset.zip";

/// POST /api/v1/dataset/archive
///
/// Starts packaging in the background and answers immediately.
pub async fn prepare_archive(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<DataResponse<ArchiveStatus>>)> {
    let status = state.archive.start()?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: status })))
}

/// GET /api/v1/dataset/archive/status
pub async fn archive_status(State(state): State<AppState>) -> Json<DataResponse<ArchiveStatus>> {
    Json(DataResponse {
        data: state.archive.status(),
    })
}

/// GET /api/v1/dataset/archive
///
/// Refreshes the archive if the dataset changed, waits for it within the
/// configured bound and streams it with HTTP range request support.
pub async fn download_archive(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    state.archive.start()?;
    let wait = state.pipeline.context().config.archive_wait;
    let (path, file_size) = state.archive.wait_ready(wait).await.map_err(|e| match e {
        WaitError::TimedOut(_) => AppError::Unavailable(e.to_string()),
        WaitError::Failed(_) | WaitError::Missing => AppError::InternalError(e.to_string()),
    })?;

    let mut file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let disposition = format!("attachment; filename=\"{ARCHIVE_FILE_NAME}\"");

    // Unparseable header values are ignored and the full file is served.
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range_header);

    if let Some(spec) = range {
        let window = match resolve(spec, file_size) {
            Ok(window) => window,
            Err(unsatisfiable) => {
                return Response::builder()
                    .status(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(header::CONTENT_RANGE, unsatisfiable.content_range())
                    .body(Body::empty())
                    .map_err(|e| AppError::InternalError(e.to_string()));
            }
        };

        file.seek(std::io::SeekFrom::Start(window.start))
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        let stream = ReaderStream::new(file.take(window.len()));

        return Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_TYPE, ARCHIVE_CONTENT_TYPE)
            .header(header::CONTENT_LENGTH, window.len().to_string())
            .header(header::CONTENT_RANGE, window.content_range(file_size))
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CONTENT_DISPOSITION, disposition)
            .body(Body::from_stream(stream))
            .map_err(|e| AppError::InternalError(e.to_string()));
    }

    // No usable Range header: serve the full file.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, ARCHIVE_CONTENT_TYPE)
        .header(header::CONTENT_LENGTH, file_size.to_string())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::InternalError(e.to_string()))
}
