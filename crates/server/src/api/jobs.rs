//! Job API handlers.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use vidgrab_core::{CompressionQuality, Job, JobKind, JobParameters, Upload};

use super::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
}

/// Query parameters for fetching a result
#[derive(Debug, Deserialize)]
pub struct ResourceParams {
    /// Item of a multi-item result (default: 0)
    pub index: Option<usize>,
}

fn parse_kind(kind: &str) -> Result<JobKind, ApiError> {
    kind.parse::<JobKind>().map_err(|e| ApiError {
        status: StatusCode::NOT_FOUND,
        message: e,
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Current job of every kind
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<ListJobsResponse> {
    Json(ListJobsResponse {
        jobs: state.orchestrator().jobs().await,
    })
}

/// Current job of one kind
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.orchestrator().job(kind).await))
}

/// Submit a job; answers once the service has accepted it
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(params): Json<JobParameters>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let kind = parse_kind(&kind)?;
    let job = state.orchestrator().submit(kind, params).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// Submit a Conversion or Compression job from a multipart form.
///
/// Fields: `file` (required) and, for compression, `compression`
/// (high, medium or low).
pub async fn upload_job(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let kind = parse_kind(&kind)?;
    if !kind.takes_upload() {
        return Err(ApiError::bad_request(format!(
            "{} jobs take a URL, not a file",
            kind
        )));
    }

    let mut upload: Option<Upload> = None;
    let mut compression = CompressionQuality::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid upload: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or("upload.mp4")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;
                upload = Some(Upload::new(file_name, data));
            }
            "compression" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid upload: {}", e)))?;
                compression = text
                    .trim()
                    .parse::<CompressionQuality>()
                    .map_err(ApiError::bad_request)?;
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("Please select a video file"))?;
    debug!("Received {} bytes for {} ({})", upload.len(), kind, upload.file_name);

    let params = JobParameters::from_upload(upload).with_compression(compression);
    let job = state.orchestrator().submit(kind, params).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// Return a finished job to idle
pub async fn reset_job(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.orchestrator().reset(kind).await?))
}

/// Streams a completed job's output straight from the service
pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(params): Query<ResourceParams>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let stream = state
        .orchestrator()
        .fetch_resource(kind, params.index)
        .await?;
    debug!("Streaming item {} of {} output", params.index.unwrap_or(0), kind);

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(stream),
    ))
}

/// Stop the running livestream recording
pub async fn stop_recording(State(state): State<Arc<AppState>>) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.orchestrator().stop_recording().await?))
}
