//! Core data models for reference areas.

pub mod coord;
pub mod feature;

pub use coord::{LatLon, LonLat};
pub use feature::{AreaFeature, AreaPolygon, Shape};
