use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tech_dispatch::app_state::AppState;
use tech_dispatch::config::AppConfig;
use tech_dispatch::routes;
use tech_dispatch::services::{
    booking::HttpBookingClient,
    location::{self, FixedLocation, HttpLocationProvider, LocationSource, Locator},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing tech-dispatch server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    routes::metrics::describe();

    tracing::info!(url = %config.booking_api_url, "Initializing booking service client");
    let booking = HttpBookingClient::new(
        &config.booking_api_url,
        &config.booking_api_token,
        Duration::from_secs(config.request_timeout_secs),
    )
    .expect("Failed to initialize booking service client");

    let source = match &config.location_url {
        Some(url) => {
            tracing::info!(url = %url, "Using HTTP position source");
            LocationSource::Http(
                HttpLocationProvider::new(url).expect("Failed to initialize position source"),
            )
        }
        None => {
            let fixed = config
                .fixed_location()
                .expect("TECHNICIAN_LAT/TECHNICIAN_LNG out of range");
            if fixed.is_none() {
                tracing::warn!("No position source configured; worklist will not be distance-ranked");
            }
            LocationSource::Fixed(FixedLocation::new(fixed))
        }
    };
    let locator = Locator::new(source, Duration::from_millis(config.location_timeout_ms));

    let state = AppState::new(booking, locator);

    // Keep the technician position fresh in the background
    location::spawn_refresh_loop(
        Arc::clone(&state.locator),
        Duration::from_secs(config.location_refresh_secs.max(1)),
    );

    let app = routes::api_router(state)
        .merge(routes::metrics::metrics_router(prometheus_handle))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024));

    tracing::info!("Starting tech-dispatch on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
