use geo::{Distance, Geodesic, Point};

/// Ellipsoidal (WGS84) surface distance in meters.
pub fn geodesic_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Geodesic::distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}
