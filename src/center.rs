//! Map centering hints for reference areas and geocoded points.
//!
//! Nothing here takes part in containment decisions.

use serde::Serialize;

use crate::models::{LatLon, LonLat, Shape};

/// Zoom after an area is loaded
pub const AREA_ZOOM: u8 = 12;
/// Zoom after an address is geocoded
pub const POINT_ZOOM: u8 = 14;

/// Where a map should look, in display order
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayHint {
    pub center: LatLon,
    pub zoom: u8,
}

impl DisplayHint {
    /// Initial view over San Francisco, matching the built-in area
    pub const DEFAULT: DisplayHint = DisplayHint {
        center: LatLon {
            lat: 37.7749,
            lon: -122.4194,
        },
        zoom: 10,
    };

    pub fn for_shape(shape: &Shape) -> Self {
        Self {
            center: representative_point(shape).to_display(),
            zoom: AREA_ZOOM,
        }
    }

    pub fn for_point(point: LonLat) -> Self {
        Self {
            center: point.to_display(),
            zoom: POINT_ZOOM,
        }
    }
}

/// First coordinate of the first ring of the first polygon, or `(0, 0)`.
pub fn representative_point(shape: &Shape) -> LonLat {
    shape
        .polygons()
        .first()
        .and_then(|p| p.exterior.0.first())
        .map(|c| LonLat::from(*c))
        .unwrap_or(LonLat::ORIGIN)
}
