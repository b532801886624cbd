//! Point-in-polygon (PIP) containment and the active reference area.
//!
//! `contains` is a pure ray-casting test; `ReferenceArea` holds the one
//! area users are checked against and runs geocode-then-contain lookups.

mod area;
mod ray;

pub use area::{LoadedArea, ReferenceArea, Verification, VerificationStatus, DEFAULT_AREA};
pub use ray::{contains, ContainmentError};
