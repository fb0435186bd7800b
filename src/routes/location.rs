use axum::extract::State;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::api::{LocationReport, LocationResponse};
use crate::routes::error::ApiError;

/// POST /api/v1/location — position pushed by the technician's device.
pub async fn report_location(
    State(state): State<AppState>,
    Json(report): Json<LocationReport>,
) -> Result<Json<LocationResponse>, ApiError> {
    report.validate()?;
    let applied = state.locator.report(report.coordinate).await;
    Ok(Json(snapshot(&state, applied).await))
}

/// POST /api/v1/location/refresh — resolve the configured position source once.
pub async fn refresh_location(State(state): State<AppState>) -> Json<LocationResponse> {
    let applied = state.locator.refresh().await;
    Json(snapshot(&state, applied).await)
}

async fn snapshot(state: &AppState, applied: bool) -> LocationResponse {
    let location = state.locator.tracker().snapshot().await;
    LocationResponse {
        applied,
        technician_location: location.coordinate,
        location_error: location.error,
    }
}
