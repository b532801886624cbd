//! GeoProtec - check whether a street address falls inside a reference area
//!
//! This library provides the GeoJSON validation, point-in-polygon and
//! geocoding modules shared by the `server` and `areacheck` binaries.

pub mod center;
pub mod config;
pub mod geocode;
pub mod models;
pub mod pip;
pub mod validate;

pub use models::{AreaFeature, AreaPolygon, LatLon, LonLat, Shape};
pub use pip::{contains, ContainmentError, ReferenceArea, Verification, VerificationStatus};
pub use validate::{validate, validate_with, ValidationError, ValidationOptions};
