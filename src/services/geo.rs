//! Great-circle distance between two coordinates.

use crate::models::coordinate::Coordinate;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres. Always `>= 0`, symmetric in its arguments.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair outside [0, 1] for antipodal points.
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[test]
    fn test_zero_distance_to_self() {
        for p in [c(0.0, 0.0), c(12.9716, 77.5946), c(-89.9, 179.9)] {
            assert_eq!(distance_km(p, p), 0.0);
        }
    }

    #[test]
    fn test_symmetric() {
        let points = [
            c(0.0, 0.0),
            c(51.5074, -0.1278),
            c(40.7128, -74.0060),
            c(-33.8688, 151.2093),
            c(89.0, 179.0),
            c(-89.0, -179.0),
        ];
        for a in points {
            for b in points {
                assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_one_degree_on_equator() {
        // 2πR / 360
        let expected = 2.0 * std::f64::consts::PI * EARTH_RADIUS_KM / 360.0;
        assert!((distance_km(c(0.0, 0.0), c(0.0, 1.0)) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_known_city_pair() {
        // London to Paris is roughly 344 km on the haversine sphere.
        let d = distance_km(c(51.5074, -0.1278), c(48.8566, 2.3522));
        assert!((d - 343.5).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_antipodal_is_half_circumference() {
        let d = distance_km(c(0.0, 0.0), c(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_triangle_inequality_sample() {
        let (a, b, m) = (c(10.0, 10.0), c(-20.0, 40.0), c(5.0, 25.0));
        assert!(distance_km(a, b) <= distance_km(a, m) + distance_km(m, b) + 1e-9);
    }
}
