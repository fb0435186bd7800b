use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::api::SubmitCodeRequest;
use crate::models::job::JobId;
use crate::routes::error::ApiError;
use crate::services::workflow::SessionView;

/// POST /api/v1/jobs/{id}/completion — open the completion view for a job.
pub async fn open_completion(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.completion.open(job_id).await?))
}

/// GET /api/v1/jobs/{id}/completion
pub async fn get_completion(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.completion.current(job_id).await?))
}

/// DELETE /api/v1/jobs/{id}/completion — technician navigated away.
pub async fn close_completion(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> StatusCode {
    if state.completion.close(job_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// POST /api/v1/jobs/{id}/completion/otp — send a one-time code to the customer.
pub async fn request_code(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.completion.request_code(job_id).await?))
}

/// POST /api/v1/jobs/{id}/completion/verify — submit the customer's code.
pub async fn submit_code(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(body): Json<SubmitCodeRequest>,
) -> Result<Json<SessionView>, ApiError> {
    body.validate()?;
    Ok(Json(state.completion.submit_code(job_id, &body.otp).await?))
}
