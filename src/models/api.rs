use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::coordinate::Coordinate;
use crate::models::job::RankedJob;

/// Body of `POST /api/v1/jobs/{id}/completion/verify`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitCodeRequest {
    #[garde(length(max = 32))]
    pub otp: String,
}

/// Device-reported position for `POST /api/v1/location`.
#[derive(Debug, Deserialize, Validate)]
pub struct LocationReport {
    #[garde(dive)]
    #[serde(flatten)]
    pub coordinate: Coordinate,
}

/// Response for `GET /api/v1/worklist`.
#[derive(Debug, Serialize)]
pub struct WorklistResponse {
    pub technician_location: Option<Coordinate>,
    pub location_error: Option<String>,
    /// True when the last refresh failed and `jobs` is the previous list.
    pub stale: bool,
    pub refresh_error: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub jobs: Vec<RankedJob>,
}

/// Response for location updates.
#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub applied: bool,
    pub technician_location: Option<Coordinate>,
    pub location_error: Option<String>,
}

/// Error body returned by every technician API failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
