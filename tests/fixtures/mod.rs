//! Booking rows as the booking backend serialises them.

use serde_json::{json, Value};

/// Build a full booking row. The stub serves list and detail projections of it.
/// Decimal coordinates are sent as strings, like the backend does.
pub fn booking_row(id: i64, status: &str, location: Option<(f64, f64)>) -> Value {
    let (lat, lng) = match location {
        Some((lat, lng)) => (json!(format!("{lat:.6}")), json!(format!("{lng:.6}"))),
        None => (Value::Null, Value::Null),
    };

    json!({
        "booking_id": id,
        "service_name": format!("Service #{id}"),
        "booking_date": "Tue, 14 Jan 2025 10:30:00 GMT",
        "status": status,
        "location_lat": lat,
        "location_lng": lng,
        "username": "asha",
        "user_name": "Asha Rao",
        "user_phone": "9876543210",
        "user_email": "asha@example.com"
    })
}

/// Technician at the origin; job 1 is 2 degrees east, job 2 has no location,
/// job 3 is 1 degree east.
pub fn equator_jobs() -> Vec<Value> {
    vec![
        booking_row(1, "confirmed", Some((0.0, 2.0))),
        booking_row(2, "pending", None),
        booking_row(3, "confirmed", Some((0.0, 1.0))),
    ]
}
