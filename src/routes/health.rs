use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::booking::BookingService;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub booking_service: ComponentHealth,
    pub location: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
    pub detail: Option<String>,
}

/// GET /health — booking service reachability and location status.
///
/// A missing location fix degrades ranking but is not unhealthy.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();

    let booking_check = match state.booking.assigned_jobs().await {
        Ok(_) => ComponentHealth {
            status: "ok".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            detail: None,
        },
        Err(e) => ComponentHealth {
            status: "error".to_string(),
            latency_ms: None,
            detail: Some(e.to_string()),
        },
    };

    let location = state.locator.tracker().snapshot().await;
    let location_check = ComponentHealth {
        status: if location.coordinate.is_some() {
            "ok".to_string()
        } else {
            "unavailable".to_string()
        },
        latency_ms: None,
        detail: location.error,
    };

    let healthy = booking_check.status == "ok";
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            booking_service: booking_check,
            location: location_check,
        },
    };

    (status_code, Json(response))
}
