use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod completion;
pub mod error;
pub mod health;
pub mod location;
pub mod metrics;
pub mod worklist;

/// Technician-facing API routes.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/worklist", get(worklist::get_worklist))
        .route("/api/v1/history", get(worklist::get_history))
        .route("/api/v1/location", post(location::report_location))
        .route("/api/v1/location/refresh", post(location::refresh_location))
        .route(
            "/api/v1/jobs/{id}/completion",
            post(completion::open_completion)
                .get(completion::get_completion)
                .delete(completion::close_completion),
        )
        .route("/api/v1/jobs/{id}/completion/otp", post(completion::request_code))
        .route("/api/v1/jobs/{id}/completion/verify", post(completion::submit_code))
        .with_state(state)
}
