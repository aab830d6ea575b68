//! Geographic utilities: distance, bearing, and bounds calculations.
//!
//! Thin wrappers over the `geo` crate so the rest of the library works in
//! plain `(lat, lon)` pairs without carrying `geo` types around.

use geo::{Bearing, Distance, Haversine, Point};

/// Great-circle distance between two coordinates in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Haversine::distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Bearing from one coordinate to another in degrees (north = 0, east = 90).
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Haversine::bearing(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Absolute bearing change between two headings, folded into [0, 180].
pub fn bearing_change(b1: f64, b2: f64) -> f64 {
    let diff = (b2 - b1).rem_euclid(360.0);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Check that a coordinate pair is finite and within valid GPS ranges.
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_distance_known_pair() {
        // London to Paris is roughly 344 km
        let d = haversine_distance(51.5074, -0.1278, 48.8566, 2.3522);
        assert!(d > 330_000.0 && d < 360_000.0);
    }

    #[test]
    fn test_haversine_distance_zero() {
        let d = haversine_distance(51.5074, -0.1278, 51.5074, -0.1278);
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn test_bearing_cardinal() {
        // Due north
        let b = bearing(50.0, 8.0, 51.0, 8.0);
        assert!(b.rem_euclid(360.0) < 1.0 || b.rem_euclid(360.0) > 359.0);
    }

    #[test]
    fn test_bearing_change_folds() {
        assert!((bearing_change(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((bearing_change(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((bearing_change(0.0, 180.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_is_valid_coordinate() {
        assert!(is_valid_coordinate(51.5, -0.12));
        assert!(!is_valid_coordinate(91.0, 0.0));
        assert!(!is_valid_coordinate(0.0, 181.0));
        assert!(!is_valid_coordinate(f64::NAN, 0.0));
    }
}
