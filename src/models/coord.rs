//! Coordinate types in storage and display order.
//!
//! Everything inside the crate works in (longitude, latitude) order, which is
//! also the GeoJSON order. Map widgets want (latitude, longitude). The two
//! orders get distinct types so they can never be swapped by accident, and
//! `LonLat::to_display` is the only place that crosses between them.

use geo_types::Coord;
use serde::{Deserialize, Serialize};

/// A position in storage order: `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

/// A position in display order: `[latitude, longitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LonLat {
    pub const ORIGIN: LonLat = LonLat { lon: 0.0, lat: 0.0 };

    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Both components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }

    /// Longitude in [-180, 180] and latitude in [-90, 90]
    pub fn in_range(&self) -> bool {
        self.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }

    /// Convert to display order for map consumers.
    pub fn to_display(self) -> LatLon {
        LatLon {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

impl From<[f64; 2]> for LonLat {
    fn from(c: [f64; 2]) -> Self {
        Self { lon: c[0], lat: c[1] }
    }
}

impl From<LonLat> for [f64; 2] {
    fn from(c: LonLat) -> Self {
        [c.lon, c.lat]
    }
}

impl From<Coord<f64>> for LonLat {
    fn from(c: Coord<f64>) -> Self {
        Self { lon: c.x, lat: c.y }
    }
}

impl From<LonLat> for Coord<f64> {
    fn from(c: LonLat) -> Self {
        Coord { x: c.lon, y: c.lat }
    }
}

impl From<[f64; 2]> for LatLon {
    fn from(c: [f64; 2]) -> Self {
        Self { lat: c[0], lon: c[1] }
    }
}

impl From<LatLon> for [f64; 2] {
    fn from(c: LatLon) -> Self {
        [c.lat, c.lon]
    }
}

impl std::fmt::Display for LonLat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lon, self.lat)
    }
}
