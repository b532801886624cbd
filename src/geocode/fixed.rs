//! In-memory geocoder with a fixed address table.

use std::collections::HashMap;

use super::{GeocodeFailure, GeocodedPoint, GeocodingGateway};
use crate::models::LonLat;

/// Answers from a preloaded table; unknown addresses are `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct FixedGeocoder {
    entries: HashMap<String, Result<GeocodedPoint, GeocodeFailure>>,
}

impl FixedGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_point(mut self, address: &str, point: LonLat) -> Self {
        self.entries.insert(
            normalize(address),
            Ok(GeocodedPoint {
                point,
                full_address: Some(address.trim().to_string()),
            }),
        );
        self
    }

    pub fn with_failure(mut self, address: &str, failure: GeocodeFailure) -> Self {
        self.entries.insert(normalize(address), Err(failure));
        self
    }

    fn lookup(&self, address: &str) -> Result<GeocodedPoint, GeocodeFailure> {
        self.entries
            .get(&normalize(address))
            .cloned()
            .unwrap_or_else(|| Err(GeocodeFailure::NotFound(address.trim().to_string())))
    }
}

fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}

impl GeocodingGateway for FixedGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeocodedPoint, GeocodeFailure> {
        self.lookup(address)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_is_case_and_space_insensitive() {
        let geocoder = FixedGeocoder::new().with_point("Av. Corrientes 1234", LonLat::new(-58.38, -34.60));
        let hit = geocoder.geocode("  av. corrientes 1234 ").await.unwrap();
        assert_eq!(hit.point, LonLat::new(-58.38, -34.60));
    }

    #[tokio::test]
    async fn test_unknown_address_is_not_found() {
        let geocoder = FixedGeocoder::new();
        assert!(matches!(
            geocoder.geocode("nowhere 1").await,
            Err(GeocodeFailure::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_configured_failure_is_returned() {
        let geocoder = FixedGeocoder::new()
            .with_failure("x", GeocodeFailure::Network("reset".to_string()));
        assert_eq!(
            geocoder.geocode("x").await,
            Err(GeocodeFailure::Network("reset".to_string()))
        );
        assert_eq!(
            geocoder.geocode(" X ").await,
            Err(GeocodeFailure::Network("reset".to_string()))
        );
    }
}
