// perilgrid-core/src/core/geometry.rs
// ============================================================================
// Module: Perilgrid Spatial Geometry
// Description: WGS84 points, multipolygons, and containment tests.
// Purpose: Provide deterministic point-in-polygon semantics for overlays.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Hazard features carry MULTIPOLYGON geometry. The overlay engine needs one
//! operation from it: does a feature contain a WGS84 point. Containment uses
//! an even-odd ray cast per ring (inside the exterior, outside every hole),
//! with a bounding-box prefilter so stores can index candidates cheaply.
//! Points exactly on an edge count as contained.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Point
// ============================================================================

/// WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
}

impl GeoPoint {
    /// Creates a point from longitude and latitude.
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }
}

// ============================================================================
// SECTION: Bounding Box
// ============================================================================

/// Axis-aligned bounding box used as the spatial prefilter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum longitude.
    pub min_lon: f64,
    /// Minimum latitude.
    pub min_lat: f64,
    /// Maximum longitude.
    pub max_lon: f64,
    /// Maximum latitude.
    pub max_lat: f64,
}

impl BoundingBox {
    /// Returns true when the point lies inside or on the box.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.longitude >= self.min_lon
            && point.longitude <= self.max_lon
            && point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
    }

    /// Computes the box covering the given points, if any.
    #[must_use]
    pub fn covering(points: &[GeoPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self {
            min_lon: first.longitude,
            min_lat: first.latitude,
            max_lon: first.longitude,
            max_lat: first.latitude,
        };
        for point in &points[1..] {
            bbox.min_lon = bbox.min_lon.min(point.longitude);
            bbox.min_lat = bbox.min_lat.min(point.latitude);
            bbox.max_lon = bbox.max_lon.max(point.longitude);
            bbox.max_lat = bbox.max_lat.max(point.latitude);
        }
        Some(bbox)
    }
}

// ============================================================================
// SECTION: Polygons
// ============================================================================

/// Single polygon with an exterior ring and optional holes.
///
/// # Invariants
/// - Rings are closed implicitly; the last vertex need not repeat the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    /// Exterior ring vertices.
    pub exterior: Vec<GeoPoint>,
    /// Interior hole rings.
    #[serde(default)]
    pub holes: Vec<Vec<GeoPoint>>,
}

impl Polygon {
    /// Returns true when the point is inside the exterior and outside holes.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        if !ring_contains(&self.exterior, point) {
            return false;
        }
        !self.holes.iter().any(|hole| ring_contains(hole, point))
    }
}

/// Multipolygon geometry attached to hazard features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPolygon {
    /// Member polygons.
    pub polygons: Vec<Polygon>,
}

impl MultiPolygon {
    /// Returns true when any member polygon contains the point.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        self.polygons.iter().any(|polygon| polygon.contains(point))
    }

    /// Computes the bounding box over all exterior rings.
    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut boxes = self
            .polygons
            .iter()
            .filter_map(|polygon| BoundingBox::covering(&polygon.exterior));
        let first = boxes.next()?;
        Some(boxes.fold(first, |acc, bbox| BoundingBox {
            min_lon: acc.min_lon.min(bbox.min_lon),
            min_lat: acc.min_lat.min(bbox.min_lat),
            max_lon: acc.max_lon.max(bbox.max_lon),
            max_lat: acc.max_lat.max(bbox.max_lat),
        }))
    }
}

// ============================================================================
// SECTION: Ring Containment
// ============================================================================

/// Even-odd ray cast over one ring; edge points count as inside.
fn ring_contains(ring: &[GeoPoint], point: GeoPoint) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];
        if on_segment(a, b, point) {
            return true;
        }
        let crosses = (a.latitude > point.latitude) != (b.latitude > point.latitude);
        if crosses {
            let slope_lon = (b.longitude - a.longitude) * (point.latitude - a.latitude)
                / (b.latitude - a.latitude)
                + a.longitude;
            if point.longitude < slope_lon {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Returns true when the point lies on the segment `a..b`.
fn on_segment(a: GeoPoint, b: GeoPoint, point: GeoPoint) -> bool {
    let cross = (b.longitude - a.longitude) * (point.latitude - a.latitude)
        - (b.latitude - a.latitude) * (point.longitude - a.longitude);
    if cross.abs() > f64::EPSILON {
        return false;
    }
    point.longitude >= a.longitude.min(b.longitude)
        && point.longitude <= a.longitude.max(b.longitude)
        && point.latitude >= a.latitude.min(b.latitude)
        && point.latitude <= a.latitude.max(b.latitude)
}
