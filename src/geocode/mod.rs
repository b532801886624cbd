//! Address-to-coordinate resolution.
//!
//! The rest of the crate only sees the [`GeocodingGateway`] trait and the
//! closed [`GeocodeFailure`] set; provider response shapes stay inside the
//! implementations.

mod fixed;
mod gemini;

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use crate::models::LonLat;

pub use fixed::FixedGeocoder;
pub use gemini::{GeminiConfig, GeminiGeocoder, DEFAULT_MODEL, DEFAULT_REGION_HINT};

/// A resolved address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodedPoint {
    pub point: LonLat,
    /// Normalized address as reported by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_address: Option<String>,
}

/// Why an address could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeFailure {
    #[error("address not found or too ambiguous: {0}")]
    NotFound(String),

    #[error("unexpected response from the geocoding service: {0}")]
    AmbiguousOrInvalidResponse(String),

    #[error("geocoding service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("network error contacting the geocoding service: {0}")]
    Network(String),

    /// Raised at construction time, never from `geocode`
    #[error("geocoding service is not configured: {0}")]
    NotConfigured(String),
}

impl GeocodeFailure {
    /// True when the address itself is the problem rather than the service
    pub fn is_address_problem(&self) -> bool {
        matches!(
            self,
            GeocodeFailure::NotFound(_) | GeocodeFailure::AmbiguousOrInvalidResponse(_)
        )
    }
}

/// Resolves free-text addresses to storage-order points.
///
/// Implementations are constructed with everything they need (credentials,
/// endpoints) and report configuration problems from their constructor.
pub trait GeocodingGateway: Send + Sync {
    /// Resolve one address. No retries are attempted.
    fn geocode(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<GeocodedPoint, GeocodeFailure>> + Send;

    /// Provider name for logging
    fn name(&self) -> &str;
}
