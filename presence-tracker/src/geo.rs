//! Distance between coordinates and its human-readable form.

use presence_common::Coordinate;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in meters (haversine).
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Arithmetic midpoint of two coordinates (not the geodesic midpoint).
pub fn midpoint(a: Coordinate, b: Coordinate) -> Coordinate {
    Coordinate::new(
        (a.latitude + b.latitude) / 2.0,
        (a.longitude + b.longitude) / 2.0,
    )
}

/// Format a distance for display.
///
/// The unit is picked on the raw value, then rounded: anything under 1000 m
/// is shown in whole meters (so 999.6 reads "1000 metros"), anything else in
/// kilometers with two decimals.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{:.0} metros", meters)
    } else {
        format!("{:.2} km", meters / 1000.0)
    }
}
