//! Route handlers.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use reelmerge::store::OutputStore;
use reelmerge::{JobId, JobStatus};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::error::ApiError;
use crate::server::AppState;

/// Form body of `POST /create-job`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateJobForm {
    #[serde(default)]
    pub total_videos: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateJobResponse {
    pub job_id: String,
}

/// Body of a successful upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkResponse {
    pub message: String,
    pub received: u32,
    pub total: u32,
}

/// Body of `GET /status/{job_id}`. `error` is always present, `null`
/// unless the job failed.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: JobStatus,
    pub received: u32,
    pub total: u32,
    pub error: Option<String>,
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse().map_err(|_| ApiError::not_found())
}

/// Create a job expecting `total_videos` chunks
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    form: Result<Form<CreateJobForm>, FormRejection>,
) -> Result<Json<CreateJobResponse>, ApiError> {
    let total = form
        .ok()
        .and_then(|Form(form)| form.total_videos)
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| ApiError::bad_request("Invalid total_videos"))?;

    let job_id = state.registry.create_job(total)?;
    Ok(Json(CreateJobResponse {
        job_id: job_id.to_string(),
    }))
}

/// Accept one chunk for a job
pub async fn add_video(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ChunkResponse>, ApiError> {
    let job_id = parse_job_id(&job_id)?;

    // Reject closed jobs before reading the upload body.
    if state.registry.get_status(&job_id)?.status != JobStatus::Waiting {
        return Err(ApiError::bad_request("Job already processing or finished"));
    }

    let mut multipart = multipart.map_err(|_| ApiError::bad_request("No file part"))?;
    let mut data = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_owned);
        match file_name.as_deref() {
            None => continue,
            Some("") => return Err(ApiError::bad_request("No file selected")),
            Some(_) => {
                data = Some(field.bytes().await?);
                break;
            },
        }
    }
    let data = data.ok_or_else(|| ApiError::bad_request("No file part"))?;

    let receipt = state.registry.add_chunk(&job_id, data).await?;
    Ok(Json(ChunkResponse {
        message: "Video received".to_string(),
        received: receipt.received,
        total: receipt.total,
    }))
}

/// Poll a job
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let snapshot = state.registry.get_status(&parse_job_id(&job_id)?)?;
    Ok(Json(StatusResponse {
        status: snapshot.status,
        received: snapshot.received,
        total: snapshot.total,
        error: snapshot.error,
    }))
}

/// Stream the combined output of a completed job
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let output = state.registry.get_output(&job_id)?;
    let artifact = state.outputs.retrieve(&output).await?;

    let content_type = mime_guess::from_path(&artifact.file_name).first_or_octet_stream();
    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    let headers = [
        (header::CONTENT_TYPE, content_type.to_string()),
        (header::CONTENT_LENGTH, artifact.size.to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    let body = Body::from_stream(ReaderStream::new(artifact.reader));
    Ok((headers, body).into_response())
}

/// Liveness check
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
