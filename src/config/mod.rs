use serde::Deserialize;

use crate::models::coordinate::{Coordinate, CoordinateError};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Booking service base URL, including any route prefix (e.g. "http://host/technician").
    pub booking_api_url: String,

    /// Bearer token identifying the technician to the booking service
    pub booking_api_token: String,

    /// Per-request timeout for booking service calls, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound on a single location resolution, in milliseconds
    #[serde(default = "default_location_timeout_ms")]
    pub location_timeout_ms: u64,

    /// Period of the background location refresh, in seconds
    #[serde(default = "default_location_refresh_secs")]
    pub location_refresh_secs: u64,

    /// HTTP position source returning `{"lat": .., "lng": ..}`
    pub location_url: Option<String>,

    /// Fixed technician latitude, used when no position source is configured
    pub technician_lat: Option<f64>,

    /// Fixed technician longitude
    pub technician_lng: Option<f64>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_location_timeout_ms() -> u64 {
    5_000
}

fn default_location_refresh_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// The configured fixed position, if both halves are set.
    pub fn fixed_location(&self) -> Result<Option<Coordinate>, CoordinateError> {
        match (self.technician_lat, self.technician_lng) {
            (Some(lat), Some(lng)) => Coordinate::new(lat, lng).map(Some),
            _ => Ok(None),
        }
    }
}
