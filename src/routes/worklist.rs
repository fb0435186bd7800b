use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::models::api::WorklistResponse;
use crate::models::job::Job;
use crate::routes::error::ApiError;
use crate::services::booking::BookingService;

/// GET /api/v1/worklist — refresh assignments and rank them by distance.
///
/// A failed refresh still answers 200 with the previous list and `stale: true`.
pub async fn get_worklist(State(state): State<AppState>) -> Json<WorklistResponse> {
    if state.worklist.refresh().await.is_err() {
        tracing::debug!("Serving stale worklist");
    }

    let location = state.locator.tracker().snapshot().await;
    let ranked = state.worklist.ranked(location.coordinate).await;

    Json(WorklistResponse {
        technician_location: location.coordinate,
        location_error: location.error,
        stale: ranked.stale,
        refresh_error: ranked.refresh_error,
        fetched_at: ranked.fetched_at,
        jobs: ranked.jobs,
    })
}

/// GET /api/v1/history — jobs this technician has completed.
pub async fn get_history(State(state): State<AppState>) -> Result<Json<Vec<Job>>, ApiError> {
    Ok(Json(state.booking.service_history().await?))
}
