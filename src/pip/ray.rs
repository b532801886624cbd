//! Ray-casting containment test with inclusive boundaries.
//!
//! Arithmetic is planar: longitude and latitude are treated as Cartesian
//! x/y, which is fine at city scale but wrong near the poles or across the
//! antimeridian.

use geo::BoundingRect;
use geo_types::{Coord, LineString};
use thiserror::Error;

use crate::models::{AreaPolygon, LonLat, Shape};

/// Collinearity tolerance, scaled by edge length
const EPSILON: f64 = 1e-12;

/// The shape (or point) cannot be evaluated
#[derive(Debug, Clone, PartialEq, Error)]
#[error("containment check failed: {message}")]
pub struct ContainmentError {
    pub message: String,
}

impl ContainmentError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RingPosition {
    Inside,
    Outside,
    OnBoundary,
}

/// Decide whether `point` lies inside `shape`.
///
/// A point on any ring edge (outer ring or hole) counts as inside. For a
/// MultiPolygon the first member containing the point ends the search.
pub fn contains(point: LonLat, shape: &Shape) -> Result<bool, ContainmentError> {
    if !point.is_finite() {
        return Err(ContainmentError::new(format!(
            "point {} is not finite",
            point
        )));
    }

    let polygons = shape.polygons();
    if polygons.is_empty() {
        return Err(ContainmentError::new("shape has no polygons"));
    }

    let p = Coord::from(point);
    for (index, polygon) in polygons.iter().enumerate() {
        if polygon_contains(p, polygon)
            .map_err(|e| ContainmentError::new(format!("polygon {}: {}", index, e.message)))?
        {
            return Ok(true);
        }
    }

    Ok(false)
}

fn polygon_contains(p: Coord<f64>, polygon: &AreaPolygon) -> Result<bool, ContainmentError> {
    for (index, ring) in polygon.rings().enumerate() {
        check_ring(ring).map_err(|e| ContainmentError::new(format!("ring {}: {}", index, e.message)))?;
    }

    if let Some(rect) = polygon.exterior.bounding_rect() {
        if p.x < rect.min().x || p.x > rect.max().x || p.y < rect.min().y || p.y > rect.max().y {
            return Ok(false);
        }
    }

    match ring_position(p, &polygon.exterior) {
        RingPosition::Outside => return Ok(false),
        RingPosition::OnBoundary => return Ok(true),
        RingPosition::Inside => {}
    }

    for hole in &polygon.interiors {
        match ring_position(p, hole) {
            RingPosition::Inside => return Ok(false),
            RingPosition::OnBoundary => return Ok(true),
            RingPosition::Outside => {}
        }
    }

    Ok(true)
}

/// A ring needs at least 3 vertices, not counting a closing repeat.
fn check_ring(ring: &LineString<f64>) -> Result<(), ContainmentError> {
    let coords = &ring.0;
    let mut vertices = coords.len();
    if vertices > 1 && coords.first() == coords.last() {
        vertices -= 1;
    }
    if vertices < 3 {
        return Err(ContainmentError::new(format!(
            "ring has {} coordinate(s), at least 3 are required",
            coords.len()
        )));
    }
    Ok(())
}

/// Even-odd ray cast along +x, with an exact on-edge check first.
///
/// Open rings get their closing edge implicitly.
fn ring_position(p: Coord<f64>, ring: &LineString<f64>) -> RingPosition {
    let coords = &ring.0;
    let n = coords.len();
    let mut inside = false;

    for i in 0..n {
        let a = coords[i];
        let b = coords[(i + 1) % n];

        if on_segment(p, a, b) {
            return RingPosition::OnBoundary;
        }

        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }

    if inside {
        RingPosition::Inside
    } else {
        RingPosition::Outside
    }
}

fn on_segment(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let cross = dx * (p.y - a.y) - dy * (p.x - a.x);
    let length = dx.hypot(dy);

    if cross.abs() > EPSILON * length {
        return false;
    }

    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}
