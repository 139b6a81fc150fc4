//! Handlers for the `/generate` resource.
//!
//! Submission is asynchronous: `POST /generate` answers 202 with a job id,
//! and clients poll `/{id}/status` (lightweight) or `/{id}/result` (full
//! view) until the job reaches a terminal status.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use pictor_core::error::CoreError;
use pictor_core::job::{Job, JobError, JobStatus};
use pictor_core::request::GenerationRequest;
use pictor_core::types::JobId;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for `POST /api/v1/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Natural-language description of the desired image.
    pub prompt: String,
    /// Design model selector: `"pro"` (default) or `"flash"`.
    #[serde(default)]
    pub model: Option<String>,
    /// Sampling temperature, 0.1..=1.0. Defaults to 0.7.
    #[serde(default)]
    pub creativity: Option<f64>,
    /// Optional `WxH` render size hint, e.g. `"1280x720"`.
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    /// Optional base64-encoded overlay image (logo, QR code).
    #[serde(default)]
    pub reference_image_b64: Option<String>,
}

/// Response body for an accepted submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
}

/// Lightweight polling view, served by `/{id}/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: JobId,
    pub status: JobStatus,
    /// Name of the most recently completed stage, while running.
    pub stage: Option<&'static str>,
    pub progress: u8,
    pub message: String,
}

/// Full result view, served by `/{id}/result`.
///
/// Served for non-terminal jobs too, with empty `images` and no `error`,
/// so clients can poll a single endpoint if they prefer.
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl From<Job> for StatusResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            status: job.status,
            stage: job.stage.map(|s| s.name()),
            progress: job.progress,
            message: job.message,
        }
    }
}

impl From<Job> for ResultResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            status: job.status,
            progress: job.progress,
            message: job.message,
            images: job.images,
            error: job.error,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Convert the inbound DTO into a domain request.
///
/// Decoding failures (bad model selector, malformed base64) map to 400;
/// range and shape checks happen later in `validate_request`.
fn into_domain(input: GenerateRequest) -> AppResult<GenerationRequest> {
    let mut request = GenerationRequest::new(input.prompt);

    if let Some(model) = input.model.as_deref() {
        request.model = model.parse().map_err(AppError::Core)?;
    }
    if let Some(creativity) = input.creativity {
        request.creativity = creativity;
    }
    request.aspect_ratio = input.aspect_ratio;

    if let Some(encoded) = input.reference_image_b64.as_deref() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| AppError::BadRequest(format!("Invalid reference image base64: {e}")))?;
        request.reference_image = Some(bytes);
    }

    Ok(request)
}

/// Fetch a job or map its absence to 404.
async fn find_job(state: &AppState, job_id: JobId) -> AppResult<Job> {
    state
        .registry
        .get(job_id)
        .await
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/generate
///
/// Submit a new generation request. Returns 202 with the job id when the
/// request starts running or joins the queue. Unsafe prompts get 403 with
/// the id of the terminally-failed job; a full queue gets 429.
pub async fn submit_generation(
    State(state): State<AppState>,
    Json(input): Json<GenerateRequest>,
) -> AppResult<impl IntoResponse> {
    let request = into_domain(input)?;
    let ticket = state.gate.submit(request).await?;

    tracing::info!(
        job_id = %ticket.job_id,
        status = %ticket.status,
        "Generation request admitted",
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SubmitResponse {
                job_id: ticket.job_id,
                status: ticket.status,
                message: ticket.message,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/generate/{id}/status
///
/// Lightweight polling view: status, stage, progress, message.
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_job(&state, job_id).await?;
    Ok(Json(DataResponse {
        data: StatusResponse::from(job),
    }))
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// GET /api/v1/generate/{id}/result
///
/// Full view including image URLs on completion and error details on
/// failure.
pub async fn get_result(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_job(&state, job_id).await?;
    Ok(Json(DataResponse {
        data: ResultResponse::from(job),
    }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// DELETE /api/v1/generate/{id}
///
/// Cancel a request that is still waiting in the queue. Running and
/// terminal jobs cannot be cancelled and answer 409.
pub async fn cancel_generation(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    if state.gate.cancel_queued(job_id).await {
        let job = find_job(&state, job_id).await?;
        return Ok(Json(DataResponse {
            data: ResultResponse::from(job),
        }));
    }

    // Not in the wait list: distinguish unknown from uncancellable.
    let job = find_job(&state, job_id).await?;
    Err(AppError::Conflict(format!(
        "Job {} is {} and can no longer be cancelled",
        job.id, job.status
    )))
}
