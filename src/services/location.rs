//! Technician position: one-shot providers and a last-successful-fix tracker.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::models::coordinate::Coordinate;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location request timed out after {0:?}")]
    Timeout(Duration),

    #[error("No location source configured")]
    Unsupported,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// A single-shot "where am I now" capability.
pub trait LocationProvider: Send + Sync {
    fn current_coordinate(&self) -> impl Future<Output = Result<Coordinate, LocationError>> + Send;
}

/// Resolve one position, giving up after `limit`.
pub async fn resolve_with_timeout<P: LocationProvider>(
    provider: &P,
    limit: Duration,
) -> Result<Coordinate, LocationError> {
    match tokio::time::timeout(limit, provider.current_coordinate()).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout(limit)),
    }
}

/// Position pinned in configuration.
pub struct FixedLocation {
    coordinate: Option<Coordinate>,
}

impl FixedLocation {
    pub fn new(coordinate: Option<Coordinate>) -> Self {
        Self { coordinate }
    }
}

impl LocationProvider for FixedLocation {
    async fn current_coordinate(&self) -> Result<Coordinate, LocationError> {
        self.coordinate.ok_or(LocationError::Unsupported)
    }
}

/// Position read from an HTTP source returning `{"lat": .., "lng": ..}`.
pub struct HttpLocationProvider {
    http: Client,
    url: String,
}

impl HttpLocationProvider {
    pub fn new(url: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

impl LocationProvider for HttpLocationProvider {
    async fn current_coordinate(&self) -> Result<Coordinate, LocationError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(LocationError::PermissionDenied)
            }
            StatusCode::NOT_FOUND | StatusCode::NOT_IMPLEMENTED => {
                return Err(LocationError::Unsupported)
            }
            s => return Err(LocationError::Unavailable(format!("position source returned {s}"))),
        }

        let raw: Coordinate = response
            .json()
            .await
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;
        Coordinate::new(raw.lat, raw.lng).map_err(|e| LocationError::Unavailable(e.to_string()))
    }
}

/// The configured position source.
pub enum LocationSource {
    Fixed(FixedLocation),
    Http(HttpLocationProvider),
}

impl LocationProvider for LocationSource {
    async fn current_coordinate(&self) -> Result<Coordinate, LocationError> {
        match self {
            LocationSource::Fixed(p) => p.current_coordinate().await,
            LocationSource::Http(p) => p.current_coordinate().await,
        }
    }
}

/// Sequence number handed out when a resolution starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocationTicket(u64);

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocationSnapshot {
    pub coordinate: Option<Coordinate>,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct TrackerState {
    next_seq: u64,
    applied_seq: u64,
    coordinate: Option<Coordinate>,
    last_error: Option<LocationError>,
    updated_at: Option<DateTime<Utc>>,
}

/// Holds the technician's latest known position.
///
/// Every resolution takes a ticket before it starts. A result is applied
/// only if no newer ticket has already been applied, so a slow response
/// can never overwrite a fresher fix. Failures are recorded but keep the
/// last good coordinate.
#[derive(Default)]
pub struct LocationTracker {
    state: RwLock<TrackerState>,
}

impl LocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin(&self) -> LocationTicket {
        let mut state = self.state.write().await;
        state.next_seq += 1;
        LocationTicket(state.next_seq)
    }

    /// Apply a finished resolution. Returns true if the coordinate changed.
    pub async fn settle(
        &self,
        ticket: LocationTicket,
        result: Result<Coordinate, LocationError>,
    ) -> bool {
        let mut state = self.state.write().await;
        if ticket.0 <= state.applied_seq {
            tracing::debug!(ticket = ticket.0, applied = state.applied_seq, "Discarding stale location result");
            return false;
        }

        match result {
            Ok(coordinate) => {
                state.applied_seq = ticket.0;
                state.coordinate = Some(coordinate);
                state.last_error = None;
                state.updated_at = Some(Utc::now());
                true
            }
            Err(e) => {
                tracing::info!(ticket = ticket.0, error = %e, "Technician location unavailable");
                state.last_error = Some(e);
                false
            }
        }
    }

    pub async fn current(&self) -> Option<Coordinate> {
        self.state.read().await.coordinate
    }

    pub async fn snapshot(&self) -> LocationSnapshot {
        let state = self.state.read().await;
        LocationSnapshot {
            coordinate: state.coordinate,
            error: state.last_error.as_ref().map(|e| e.to_string()),
            updated_at: state.updated_at,
        }
    }
}

/// A location source plus the tracker its results settle into.
pub struct Locator<P> {
    provider: P,
    tracker: LocationTracker,
    timeout: Duration,
}

impl<P: LocationProvider> Locator<P> {
    pub fn new(provider: P, timeout: Duration) -> Self {
        Self {
            provider,
            tracker: LocationTracker::new(),
            timeout,
        }
    }

    pub fn tracker(&self) -> &LocationTracker {
        &self.tracker
    }

    /// Run one bounded resolution against the provider.
    pub async fn refresh(&self) -> bool {
        let ticket = self.tracker.begin().await;
        let result = resolve_with_timeout(&self.provider, self.timeout).await;
        let outcome = if result.is_ok() { "ok" } else { "unavailable" };
        metrics::counter!("location_resolutions_total", "outcome" => outcome).increment(1);
        self.tracker.settle(ticket, result).await
    }

    /// Accept a position pushed by the technician's device.
    pub async fn report(&self, coordinate: Coordinate) -> bool {
        let ticket = self.tracker.begin().await;
        metrics::counter!("location_resolutions_total", "outcome" => "reported").increment(1);
        self.tracker.settle(ticket, Ok(coordinate)).await
    }
}

/// Re-resolve the technician's position on a fixed period.
pub fn spawn_refresh_loop<P>(locator: Arc<Locator<P>>, period: Duration) -> tokio::task::JoinHandle<()>
where
    P: LocationProvider + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if locator.refresh().await {
                tracing::debug!("Technician location updated");
            }
        }
    })
}
