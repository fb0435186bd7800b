use garde::Validate;
use serde::{Deserialize, Serialize};

/// A WGS-84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Coordinate {
    #[garde(range(min = -90.0, max = 90.0))]
    #[serde(alias = "latitude")]
    pub lat: f64,

    #[garde(range(min = -180.0, max = 180.0))]
    #[serde(alias = "longitude", alias = "lon")]
    pub lng: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        let coordinate = Self { lat, lng };
        if !lat.is_finite() || !lng.is_finite() {
            return Err(CoordinateError::NotFinite);
        }
        coordinate
            .validate()
            .map_err(|e| CoordinateError::OutOfRange(e.to_string()))?;
        Ok(coordinate)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinateError {
    #[error("Coordinate is not a finite number")]
    NotFinite,

    #[error("Coordinate out of range: {0}")]
    OutOfRange(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_bounds() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(Coordinate::new(90.5, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.1).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_deserialize_aliases() {
        let c: Coordinate = serde_json::from_str(r#"{"latitude": 12.5, "longitude": 77.25}"#).unwrap();
        assert_eq!(c, Coordinate { lat: 12.5, lng: 77.25 });
    }
}
