//! Great-circle helpers and the circular buffer used in place of network contours.

use geo::{ChamberlainDuquetteArea, Coord, LineString, MultiPolygon, Point, Polygon};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Vertices on a buffer circle.
const BUFFER_SEGMENTS: usize = 64;

/// Haversine distance between two lon/lat points, in metres.
pub fn haversine_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    let (phi1, phi2) = (a.y().to_radians(), b.y().to_radians());
    let d_phi = phi2 - phi1;
    let d_lambda = (b.x() - a.x()).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// The point reached from `origin` after `distance_m` metres on initial bearing
/// `bearing_deg` (clockwise from north).
pub fn destination(origin: Point<f64>, bearing_deg: f64, distance_m: f64) -> Point<f64> {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = origin.y().to_radians();
    let lambda1 = origin.x().to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1 + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    // Normalise longitude to [-180, 180).
    let lon = (lambda2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;
    Point::new(lon, phi2.to_degrees())
}

/// Straight-line walking radius for a threshold, in metres.
#[inline]
pub fn walking_radius_m(minutes: f64, speed_ms: f64) -> f64 {
    minutes * 60.0 * speed_ms
}

/// A geodesic circle of `radius_m` metres around `center`.
pub fn buffer_polygon(center: Point<f64>, radius_m: f64) -> Polygon<f64> {
    let mut ring: Vec<Coord<f64>> = (0..BUFFER_SEGMENTS)
        .map(|i| destination(center, 360.0 * i as f64 / BUFFER_SEGMENTS as f64, radius_m).0)
        .collect();
    ring.push(ring[0]);
    Polygon::new(LineString::new(ring), vec![])
}

/// Area on the sphere in square kilometres, rounded to three decimals.
pub fn area_km2(polygon: &MultiPolygon<f64>) -> f64 {
    let km2 = polygon.chamberlain_duquette_unsigned_area() / 1e6;
    (km2 * 1000.0).round() / 1000.0
}
