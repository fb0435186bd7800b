use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

use crate::models::coordinate::Coordinate;

/// Booking identifier as issued by the booking service.
pub type JobId = i64;

/// Lifecycle status of a booking. Only moves forward; `Completed` is final.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Confirmed,
    Completed,
}

impl JobStatus {
    pub fn is_completed(self) -> bool {
        self == JobStatus::Completed
    }
}

/// Customer contact details attached to a booking.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// A service assignment for the technician.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub service_name: Option<String>,
    pub technician_id: Option<i64>,
    pub customer: Customer,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    /// Service location; `None` when the booking has no usable position.
    pub location: Option<Coordinate>,
    pub requirements: Option<String>,
}

/// A job paired with its distance from the technician.
///
/// `distance_km` is `None` when either end has no coordinate; such jobs
/// sort after every job with a known distance.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedJob {
    #[serde(flatten)]
    pub job: Job,
    pub distance_km: Option<f64>,
}

/// Booking row as the booking service serialises it.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRecord {
    #[serde(alias = "id")]
    pub booking_id: JobId,
    #[serde(default, alias = "service_type")]
    pub service_name: Option<String>,
    #[serde(default)]
    pub technician_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub booking_date: Option<DateTime<Utc>>,
    pub status: JobStatus,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub location_lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub location_lng: Option<f64>,
    #[serde(default)]
    pub user_name: Option<String>,
    /// Login name; list rows carry this instead of `user_name`.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user_phone: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
}

impl From<JobRecord> for Job {
    fn from(record: JobRecord) -> Self {
        let location = match (record.location_lat, record.location_lng) {
            (Some(lat), Some(lng)) => match Coordinate::new(lat, lng) {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!(job_id = record.booking_id, error = %e, "Discarding invalid job coordinate");
                    None
                }
            },
            _ => None,
        };

        Job {
            id: record.booking_id,
            service_name: record.service_name,
            technician_id: record.technician_id,
            customer: Customer {
                name: record.user_name.or(record.username),
                phone: record.user_phone,
                email: record.user_email,
            },
            scheduled_at: record.booking_date,
            status: record.status,
            location,
            requirements: record.requirements,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Decimal columns arrive either as JSON numbers or as numeric strings.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(n)) => Some(n),
        Some(NumberOrText::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Parse the timestamp shapes the booking backend emits.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
