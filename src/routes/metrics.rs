use axum::extract::State;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

/// Register descriptions for every metric the service emits.
pub fn describe() {
    metrics::describe_counter!(
        "otp_requests_total",
        "One-time code issuance attempts, by outcome"
    );
    metrics::describe_counter!(
        "otp_verifications_total",
        "One-time code verification attempts, by outcome"
    );
    metrics::describe_counter!(
        "worklist_refresh_total",
        "Assigned-job list fetches, by outcome"
    );
    metrics::describe_counter!(
        "location_resolutions_total",
        "Technician location resolutions, by outcome"
    );
    metrics::describe_histogram!(
        "booking_request_seconds",
        "Latency of booking service requests"
    );
    metrics::describe_gauge!("worklist_jobs", "Jobs on the technician's worklist");
}

/// Prometheus scrape endpoint in text exposition format.
async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render))
        .with_state(handle)
}
