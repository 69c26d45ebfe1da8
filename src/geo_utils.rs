//! Geographic distance helpers.
//!
//! Incremental track computations only ever compare near points, so they use
//! a flat-earth approximation on a sphere of 6371 km.

const TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Average earth radius, in meters
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Approximate horizontal distance in meters between two **near** points,
/// ignoring elevation.
///
/// # Example
/// ```
/// use track_elevation::geo_utils::delta_two_points;
/// let d = delta_two_points(45.0, 6.0, 45.001, 6.0);
/// assert!((d - 111.19).abs() < 0.1);
/// ```
pub fn delta_two_points(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let x = EARTH_RADIUS * (lat1 * TO_RAD).cos() * (lon2 - lon1).abs() * TO_RAD;
    let y = EARTH_RADIUS * (lat2 - lat1).abs() * TO_RAD;
    x.hypot(y)
}

/// Same as [`delta_two_points`], with the elevation difference folded in as
/// the other side of a right triangle.
pub fn delta_two_points_with_elevation(
    lat1: f64,
    lon1: f64,
    ele1: f64,
    lat2: f64,
    lon2: f64,
    ele2: f64,
) -> f64 {
    let horizontal = delta_two_points(lat1, lon1, lat2, lon2);
    horizontal.hypot(ele2 - ele1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_same_point_is_zero() {
        assert_eq!(delta_two_points(45.0, 6.0, 45.0, 6.0), 0.0);
    }

    #[test]
    fn test_delta_matches_great_circle_for_near_points() {
        use geo::{Distance, Haversine, Point};

        let flat = delta_two_points(45.1883, 5.7245, 45.1901, 5.7270);
        let sphere = Haversine::distance(Point::new(5.7245, 45.1883), Point::new(5.7270, 45.1901));
        assert!((flat - sphere).abs() < 0.5, "flat {} vs great circle {}", flat, sphere);
    }

    #[test]
    fn test_delta_with_elevation() {
        let horizontal = delta_two_points(45.0, 6.0, 45.001, 6.0);
        let with_ele = delta_two_points_with_elevation(45.0, 6.0, 1000.0, 45.001, 6.0, 1050.0);
        let expected = (horizontal.powi(2) + 50.0_f64.powi(2)).sqrt();
        assert!((with_ele - expected).abs() < 1e-9);
    }
}
