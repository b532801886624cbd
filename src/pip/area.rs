//! The single active reference area and address verification against it.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{contains, ContainmentError};
use crate::center::{representative_point, DisplayHint};
use crate::geocode::{GeocodeFailure, GeocodingGateway};
use crate::models::{AreaFeature, LonLat};
use crate::validate::{validate_with, ValidationError, ValidationOptions};

/// Built-in area over San Francisco, active until an operator uploads one
pub const DEFAULT_AREA: &str = r#"{
  "type": "Feature",
  "properties": {},
  "geometry": {
    "type": "Polygon",
    "coordinates": [[
      [-122.51821015840398, 37.77864696973343],
      [-122.38500092988835, 37.81093199859016],
      [-122.36836884981023, 37.71618731302061],
      [-122.48425935273992, 37.70660609049008],
      [-122.51821015840398, 37.77864696973343]
    ]]
  }
}"#;

/// An accepted area with load metadata
#[derive(Debug, Clone)]
pub struct LoadedArea {
    pub feature: AreaFeature,
    pub loaded_at: DateTime<Utc>,
    pub hint: DisplayHint,
}

impl LoadedArea {
    pub fn new(feature: AreaFeature) -> Self {
        let hint = DisplayHint::for_shape(&feature.shape());
        Self {
            feature,
            loaded_at: Utc::now(),
            hint,
        }
    }
}

/// Outcome class of an address check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Inside,
    Outside,
    AddressNotFound,
    NoPolygon,
    Error,
}

/// Result of checking one address against the active area
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub status: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<LonLat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Verification {
    fn failed(status: VerificationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            point: None,
            display: None,
            full_address: None,
            message: Some(message.into()),
        }
    }

    pub fn no_polygon() -> Self {
        Self::failed(
            VerificationStatus::NoPolygon,
            "no reference area is loaded",
        )
    }

    /// Map a geocoder failure to a user-facing state
    pub fn from_failure(failure: &GeocodeFailure) -> Self {
        let status = if failure.is_address_problem() {
            VerificationStatus::AddressNotFound
        } else {
            VerificationStatus::Error
        };
        Self::failed(status, failure.to_string())
    }
}

/// Holder of the active area.
///
/// The area is only ever swapped as a whole; readers keep the `Arc` they
/// got even if a replacement lands meanwhile.
#[derive(Debug, Default)]
pub struct ReferenceArea {
    slot: RwLock<Option<Arc<LoadedArea>>>,
}

impl ReferenceArea {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_area(feature: AreaFeature) -> Self {
        let area = Self::empty();
        area.replace(feature);
        area
    }

    /// Current area, if one is loaded
    pub fn current(&self) -> Option<Arc<LoadedArea>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Install a new area, discarding the previous one
    pub fn replace(&self, feature: AreaFeature) -> Arc<LoadedArea> {
        let loaded = Arc::new(LoadedArea::new(feature));
        info!(
            "Reference area replaced: {} with {} part(s), anchored at {}",
            loaded.feature.shape().kind(),
            loaded.feature.shape().polygons().len(),
            representative_point(&loaded.feature.shape())
        );
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&loaded));
        loaded
    }

    /// Validate operator text and install it. A rejected upload leaves the
    /// previous area in place.
    pub fn load_text(
        &self,
        text: &str,
        options: ValidationOptions,
    ) -> Result<Arc<LoadedArea>, ValidationError> {
        match validate_with(text, options) {
            Ok(feature) => Ok(self.replace(feature)),
            Err(e) => {
                warn!("Rejected reference area ({}): {}", e.kind(), e);
                Err(e)
            }
        }
    }

    /// Test a raw point; `None` when no area is loaded.
    pub fn contains(&self, point: LonLat) -> Option<Result<bool, ContainmentError>> {
        self.current()
            .map(|area| contains(point, &area.feature.shape()))
    }

    /// Geocode an address and check it against the active area.
    pub async fn verify<G: GeocodingGateway>(&self, gateway: &G, address: &str) -> Verification {
        let Some(area) = self.current() else {
            return Verification::no_polygon();
        };

        let address = address.trim();
        if address.is_empty() {
            return Verification::failed(VerificationStatus::Error, "empty address");
        }

        let hit = match gateway.geocode(address).await {
            Ok(hit) => hit,
            Err(e) => {
                debug!("Geocoder {} failed for '{}': {}", gateway.name(), address, e);
                return Verification::from_failure(&e);
            }
        };

        let status = match contains(hit.point, &area.feature.shape()) {
            Ok(true) => VerificationStatus::Inside,
            Ok(false) => VerificationStatus::Outside,
            Err(e) => {
                warn!("Containment failed for '{}': {}", address, e);
                return Verification::failed(VerificationStatus::Error, e.to_string());
            }
        };

        debug!("'{}' at {} is {:?}", address, hit.point, status);

        Verification {
            status,
            point: Some(hit.point),
            display: Some(DisplayHint::for_point(hit.point)),
            full_address: hit.full_address,
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::FixedGeocoder;
    use crate::validate::validate;

    const SQUARE: &str = r#"{"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[0,10],[10,10],[10,0],[0,0]]]}}"#;

    fn geocoder() -> FixedGeocoder {
        FixedGeocoder::new()
            .with_point("inside 1", LonLat::new(5.0, 5.0))
            .with_point("edge 1", LonLat::new(0.0, 5.0))
            .with_point("outside 1", LonLat::new(15.0, 5.0))
            .with_failure(
                "ambiguous 1",
                GeocodeFailure::AmbiguousOrInvalidResponse("two matches".to_string()),
            )
            .with_failure(
                "down 1",
                GeocodeFailure::ServiceUnavailable("503".to_string()),
            )
    }

    fn square_area() -> ReferenceArea {
        ReferenceArea::with_area(validate(SQUARE).unwrap())
    }

    #[test]
    fn test_default_area_is_valid() {
        let area = ReferenceArea::empty();
        area.load_text(DEFAULT_AREA, ValidationOptions::strict())
            .unwrap();
        // Golden Gate Park
        assert_eq!(
            area.contains(LonLat::new(-122.4862, 37.7694)),
            Some(Ok(true))
        );
        // Oakland
        assert_eq!(area.contains(LonLat::new(-122.2711, 37.8044)), Some(Ok(false)));
    }

    #[test]
    fn test_rejected_upload_keeps_previous_area() {
        let area = square_area();
        let before = area.current().unwrap();
        assert!(area.load_text("{not json", ValidationOptions::default()).is_err());
        assert!(Arc::ptr_eq(&before, &area.current().unwrap()));
    }

    #[test]
    fn test_replace_swaps_whole_area() {
        let area = square_area();
        let held = area.current().unwrap();
        area.load_text(DEFAULT_AREA, ValidationOptions::default())
            .unwrap();
        // the old handle still sees the old shape
        assert_eq!(contains(LonLat::new(5.0, 5.0), &held.feature.shape()), Ok(true));
        assert_eq!(area.contains(LonLat::new(5.0, 5.0)), Some(Ok(false)));
    }

    #[test]
    fn test_contains_without_area() {
        assert_eq!(ReferenceArea::empty().contains(LonLat::new(0.0, 0.0)), None);
    }

    #[tokio::test]
    async fn test_verify_statuses() {
        let area = square_area();
        let geocoder = geocoder();

        let inside = area.verify(&geocoder, "inside 1").await;
        assert_eq!(inside.status, VerificationStatus::Inside);
        let display = inside.display.unwrap();
        assert_eq!(display.center, crate::models::LatLon { lat: 5.0, lon: 5.0 });
        assert_eq!(display.zoom, crate::center::POINT_ZOOM);

        assert_eq!(
            area.verify(&geocoder, "edge 1").await.status,
            VerificationStatus::Inside
        );
        assert_eq!(
            area.verify(&geocoder, "outside 1").await.status,
            VerificationStatus::Outside
        );
        assert_eq!(
            area.verify(&geocoder, "unknown").await.status,
            VerificationStatus::AddressNotFound
        );
        assert_eq!(
            area.verify(&geocoder, "ambiguous 1").await.status,
            VerificationStatus::AddressNotFound
        );

        let down = area.verify(&geocoder, "down 1").await;
        assert_eq!(down.status, VerificationStatus::Error);
        assert!(down.point.is_none());
    }

    #[tokio::test]
    async fn test_verify_blank_address() {
        let result = square_area().verify(&geocoder(), "   ").await;
        assert_eq!(result.status, VerificationStatus::Error);
        assert_eq!(result.message.as_deref(), Some("empty address"));
    }

    #[tokio::test]
    async fn test_verify_without_area() {
        let result = ReferenceArea::empty().verify(&geocoder(), "inside 1").await;
        assert_eq!(result.status, VerificationStatus::NoPolygon);
    }

    #[tokio::test]
    async fn test_verify_degenerate_area_is_error() {
        let text = r#"{"type":"Feature","geometry":{"type":"Polygon","coordinates":[[[0,0],[10,10]]]}}"#;
        let area = ReferenceArea::with_area(validate(text).unwrap());
        let result = area.verify(&geocoder(), "inside 1").await;
        assert_eq!(result.status, VerificationStatus::Error);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(Verification::no_polygon()).unwrap();
        assert_eq!(json["status"], "NO_POLYGON");
    }
}
