//! Viewport planning: where to center the map and how far to zoom.

use presence_common::Coordinate;
use serde::{Deserialize, Serialize};

use crate::geo::{distance_meters, midpoint};

/// Zoom used when a single point is shown.
pub const DETAIL_ZOOM: u8 = 15;

/// Zoom used for the fallback view when the target has no position yet.
pub const FALLBACK_ZOOM: u8 = 10;

/// Center shown when the target has no position yet (Madrid).
pub const DEFAULT_FALLBACK_CENTER: Coordinate = Coordinate {
    latitude: 40.4168,
    longitude: -3.7038,
};

/// Distance thresholds in meters, checked top-down; first match wins.
const ZOOM_TIERS: [(f64, u8); 5] = [
    (20_000.0, 9),
    (10_000.0, 10),
    (5_000.0, 11),
    (2_000.0, 12),
    (1_000.0, 13),
];

/// A map center and discrete zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: Coordinate,
    pub zoom: u8,
}

/// Zoom level that keeps two points `meters` apart on screen.
pub fn zoom_for_distance(meters: f64) -> u8 {
    ZOOM_TIERS
        .iter()
        .find(|(threshold, _)| meters > *threshold)
        .map(|(_, zoom)| *zoom)
        .unwrap_or(DETAIL_ZOOM)
}

/// Viewport showing both points.
pub fn plan(a: Coordinate, b: Coordinate) -> Viewport {
    Viewport {
        center: midpoint(a, b),
        zoom: zoom_for_distance(distance_meters(a, b)),
    }
}

/// Viewport for a single known point.
pub fn plan_single(point: Coordinate) -> Viewport {
    Viewport {
        center: point,
        zoom: DETAIL_ZOOM,
    }
}

/// Wide viewport used while nothing is known about the target's position.
pub fn fallback(center: Coordinate) -> Viewport {
    Viewport {
        center,
        zoom: FALLBACK_ZOOM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_tiers_are_exclusive_on_the_threshold() {
        assert_eq!(zoom_for_distance(25_000.0), 9);
        assert_eq!(zoom_for_distance(20_000.0), 10);
        assert_eq!(zoom_for_distance(10_000.1), 10);
        assert_eq!(zoom_for_distance(10_000.0), 11);
        assert_eq!(zoom_for_distance(5_000.0), 12);
        assert_eq!(zoom_for_distance(2_000.0), 13);
        assert_eq!(zoom_for_distance(1_000.0), 15);
        assert_eq!(zoom_for_distance(0.0), 15);
    }

    #[test]
    fn test_plan_is_symmetric() {
        let a = Coordinate::new(4.65, -74.08);
        let b = Coordinate::new(4.66, -74.09);
        assert_eq!(plan(a, b), plan(b, a));
    }

    #[test]
    fn test_plan_same_point() {
        let a = Coordinate::new(4.65, -74.08);
        let viewport = plan(a, a);
        assert_eq!(viewport.center, a);
        assert_eq!(viewport.zoom, 15);
        assert_eq!(viewport, plan_single(a));
    }

    #[test]
    fn test_plan_two_blocks_apart() {
        let viewport = plan(Coordinate::new(4.65, -74.08), Coordinate::new(4.66, -74.09));
        assert_eq!(viewport.zoom, 13);
        assert!((viewport.center.latitude - 4.655).abs() < 1e-9);
        assert!((viewport.center.longitude + 74.085).abs() < 1e-9);
    }

    #[test]
    fn test_fallback() {
        let viewport = fallback(DEFAULT_FALLBACK_CENTER);
        assert_eq!(viewport.zoom, 10);
        assert_eq!(viewport.center, DEFAULT_FALLBACK_CENTER);
    }
}
