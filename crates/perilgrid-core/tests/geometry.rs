// perilgrid-core/tests/geometry.rs
// ============================================================================
// Module: Geometry Tests
// Description: Multipolygon containment and bounding-box prefilter.
// ============================================================================
//! ## Overview
//! Validates even-odd containment including holes and edge points, and
//! that the bounding box never rejects a contained point.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use perilgrid_core::GeoPoint;
use perilgrid_core::MultiPolygon;
use perilgrid_core::Polygon;
use proptest::prelude::*;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn square(center_lon: f64, center_lat: f64, half: f64) -> Polygon {
    Polygon {
        exterior: vec![
            GeoPoint::new(center_lon - half, center_lat - half),
            GeoPoint::new(center_lon + half, center_lat - half),
            GeoPoint::new(center_lon + half, center_lat + half),
            GeoPoint::new(center_lon - half, center_lat + half),
        ],
        holes: Vec::new(),
    }
}

// ============================================================================
// SECTION: Containment
// ============================================================================

/// Tests interior, exterior, and edge points against a square.
#[test]
fn test_square_containment() {
    let polygon = square(-75.0, 40.0, 1.0);
    assert!(polygon.contains(GeoPoint::new(-75.0, 40.0)));
    assert!(!polygon.contains(GeoPoint::new(-70.0, 40.0)));
    // Edge points count as contained.
    assert!(polygon.contains(GeoPoint::new(-76.0, 40.0)));
}

/// Tests points inside a hole are not contained.
#[test]
fn test_hole_excludes_points() {
    let mut polygon = square(0.0, 0.0, 10.0);
    polygon.holes.push(vec![
        GeoPoint::new(-1.0, -1.0),
        GeoPoint::new(1.0, -1.0),
        GeoPoint::new(1.0, 1.0),
        GeoPoint::new(-1.0, 1.0),
    ]);
    assert!(!polygon.contains(GeoPoint::new(0.0, 0.0)));
    assert!(polygon.contains(GeoPoint::new(5.0, 5.0)));
}

/// Tests a multipolygon contains points of any member.
#[test]
fn test_multipolygon_union() {
    let multi = MultiPolygon {
        polygons: vec![square(0.0, 0.0, 1.0), square(10.0, 10.0, 1.0)],
    };
    assert!(multi.contains(GeoPoint::new(0.0, 0.0)));
    assert!(multi.contains(GeoPoint::new(10.0, 10.0)));
    assert!(!multi.contains(GeoPoint::new(5.0, 5.0)));
}

/// Tests degenerate rings contain nothing.
#[test]
fn test_degenerate_ring() {
    let polygon = Polygon {
        exterior: vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)],
        holes: Vec::new(),
    };
    assert!(!polygon.contains(GeoPoint::new(0.5, 0.5)));
}

// ============================================================================
// SECTION: Prefilter Property
// ============================================================================

proptest! {
    /// The bounding box never rejects a point the geometry contains.
    #[test]
    fn prop_bbox_is_sound_prefilter(
        center_lon in -170.0_f64..170.0,
        center_lat in -80.0_f64..80.0,
        half in 0.01_f64..5.0,
        probe_lon in -180.0_f64..180.0,
        probe_lat in -90.0_f64..90.0,
    ) {
        let multi = MultiPolygon { polygons: vec![square(center_lon, center_lat, half)] };
        let bbox = multi.bounding_box().unwrap();
        let point = GeoPoint::new(probe_lon, probe_lat);
        if multi.contains(point) {
            prop_assert!(bbox.contains(point));
        }
    }
}
