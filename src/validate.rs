//! GeoJSON validation for operator-supplied reference areas.
//!
//! `validate` turns untrusted text into an [`AreaFeature`] holding a Polygon
//! or MultiPolygon. The checks are shallow and fail fast: one error kind per
//! failure mode so the caller can tell the operator exactly what to fix.
//! Ring closure, minimum ring length and coordinate ranges are only checked
//! when asked for through [`ValidationOptions`]; self-intersection is never
//! checked.

use geo_types::{Coord, LineString};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::{AreaFeature, AreaPolygon, LonLat, Shape};

/// Reasons an uploaded area is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("the file is not valid JSON: {0}")]
    MalformedJson(String),

    #[error(
        "GeoJSON root must be a 'Feature' or a 'FeatureCollection', found {}",
        .0.as_deref().unwrap_or("no type")
    )]
    UnsupportedRootType(Option<String>),

    #[error("a 'FeatureCollection' must have a non-empty 'features' array")]
    EmptyCollection,

    #[error("the 'FeatureCollection' has no Feature with Polygon or MultiPolygon geometry")]
    NoPolygonFeature,

    #[error("the selected Feature has no 'geometry'")]
    MissingGeometry,

    #[error(
        "geometry must be 'Polygon' or 'MultiPolygon', found {}",
        .0.as_deref().unwrap_or("no type")
    )]
    UnsupportedGeometryType(Option<String>),

    #[error("the geometry has no coordinates")]
    MissingCoordinates,

    #[error("Polygon coordinates are malformed")]
    MalformedPolygonCoordinates,

    #[error("MultiPolygon coordinates are malformed")]
    MalformedMultiPolygonCoordinates,

    #[error("ring {ring} of polygon {polygon} has {len} coordinates, at least 4 are required")]
    DegenerateRing {
        polygon: usize,
        ring: usize,
        len: usize,
    },

    #[error("ring {ring} of polygon {polygon} is not closed (first and last coordinates differ)")]
    UnclosedRing { polygon: usize, ring: usize },

    #[error("coordinate {0} is outside longitude [-180, 180] / latitude [-90, 90]")]
    CoordinateOutOfRange(LonLat),
}

impl ValidationError {
    /// Stable machine-readable name of the failure
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MalformedJson(_) => "MalformedJson",
            ValidationError::UnsupportedRootType(_) => "UnsupportedRootType",
            ValidationError::EmptyCollection => "EmptyCollection",
            ValidationError::NoPolygonFeature => "NoPolygonFeature",
            ValidationError::MissingGeometry => "MissingGeometry",
            ValidationError::UnsupportedGeometryType(_) => "UnsupportedGeometryType",
            ValidationError::MissingCoordinates => "MissingCoordinates",
            ValidationError::MalformedPolygonCoordinates => "MalformedPolygonCoordinates",
            ValidationError::MalformedMultiPolygonCoordinates => {
                "MalformedMultiPolygonCoordinates"
            }
            ValidationError::DegenerateRing { .. } => "DegenerateRing",
            ValidationError::UnclosedRing { .. } => "UnclosedRing",
            ValidationError::CoordinateOutOfRange(_) => "CoordinateOutOfRange",
        }
    }
}

/// Extra semantic checks layered on top of the structural ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Require closed rings of at least 4 coordinates
    pub strict_rings: bool,
    /// Require longitude/latitude inside their valid ranges
    pub check_ranges: bool,
}

impl ValidationOptions {
    pub fn strict() -> Self {
        Self {
            strict_rings: true,
            check_ranges: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeometryKind {
    Polygon,
    MultiPolygon,
}

impl GeometryKind {
    fn from_geometry(geometry: &Value) -> Option<Self> {
        match geometry.get("type").and_then(Value::as_str) {
            Some("Polygon") => Some(GeometryKind::Polygon),
            Some("MultiPolygon") => Some(GeometryKind::MultiPolygon),
            _ => None,
        }
    }

    fn malformed(self) -> ValidationError {
        match self {
            GeometryKind::Polygon => ValidationError::MalformedPolygonCoordinates,
            GeometryKind::MultiPolygon => ValidationError::MalformedMultiPolygonCoordinates,
        }
    }
}

/// Validate GeoJSON text with structural checks only.
pub fn validate(text: &str) -> Result<AreaFeature, ValidationError> {
    validate_with(text, ValidationOptions::default())
}

/// Validate GeoJSON text, optionally adding ring and range checks.
pub fn validate_with(
    text: &str,
    options: ValidationOptions,
) -> Result<AreaFeature, ValidationError> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| ValidationError::MalformedJson(e.to_string()))?;

    let candidate = select_candidate(&root)?;

    let geometry = candidate
        .get("geometry")
        .filter(|g| !g.is_null())
        .ok_or(ValidationError::MissingGeometry)?;

    let kind = GeometryKind::from_geometry(geometry).ok_or_else(|| {
        ValidationError::UnsupportedGeometryType(
            geometry
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string),
        )
    })?;

    let coordinates = match geometry.get("coordinates") {
        None | Some(Value::Null) => return Err(ValidationError::MissingCoordinates),
        Some(Value::Array(items)) if items.is_empty() => {
            return Err(ValidationError::MissingCoordinates)
        }
        Some(Value::Array(items)) => items,
        Some(_) => return Err(kind.malformed()),
    };

    check_depth(kind, coordinates)?;

    let shape = match kind {
        GeometryKind::Polygon => Shape::Polygon(parse_polygon(coordinates).ok_or(kind.malformed())?),
        GeometryKind::MultiPolygon => Shape::MultiPolygon(
            coordinates
                .iter()
                .map(|p| p.as_array().and_then(|rings| parse_polygon(rings)))
                .collect::<Option<Vec<_>>>()
                .ok_or(kind.malformed())?,
        ),
    };

    if options.strict_rings {
        check_rings(&shape)?;
    }
    if options.check_ranges {
        check_ranges(&shape)?;
    }

    debug!(
        "Validated {} with {} part(s)",
        shape.kind(),
        shape.polygons().len()
    );

    let source = candidate.as_object().cloned().unwrap_or_default();
    Ok(AreaFeature::from_source(source, shape))
}

/// Pick the feature to validate from the document root.
///
/// A `FeatureCollection` is scanned in order and the first Feature carrying
/// a Polygon or MultiPolygon geometry wins.
fn select_candidate(root: &Value) -> Result<&Value, ValidationError> {
    match root.get("type").and_then(Value::as_str) {
        Some("Feature") => Ok(root),
        Some("FeatureCollection") => {
            let features = root
                .get("features")
                .and_then(Value::as_array)
                .filter(|f| !f.is_empty())
                .ok_or(ValidationError::EmptyCollection)?;

            let index = features
                .iter()
                .position(is_polygon_feature)
                .ok_or(ValidationError::NoPolygonFeature)?;

            debug!(
                "Selected feature {} of {} in collection",
                index,
                features.len()
            );
            Ok(&features[index])
        }
        other => Err(ValidationError::UnsupportedRootType(
            other.map(str::to_string),
        )),
    }
}

fn is_polygon_feature(feature: &Value) -> bool {
    feature.get("type").and_then(Value::as_str) == Some("Feature")
        && feature
            .get("geometry")
            .and_then(GeometryKind::from_geometry)
            .is_some()
}

/// Checks that the first position sits at the nesting depth the type implies.
fn check_depth(kind: GeometryKind, coordinates: &[Value]) -> Result<(), ValidationError> {
    let first_ring = match kind {
        GeometryKind::Polygon => coordinates.first(),
        GeometryKind::MultiPolygon => coordinates
            .first()
            .and_then(Value::as_array)
            .and_then(|rings| rings.first()),
    };

    let first_position = first_ring
        .and_then(Value::as_array)
        .and_then(|ring| ring.first())
        .and_then(Value::as_array);

    match first_position {
        Some(position) if position.len() >= 2 => Ok(()),
        _ => Err(kind.malformed()),
    }
}

fn parse_polygon(rings: &[Value]) -> Option<AreaPolygon> {
    let mut rings = rings.iter().map(parse_ring);
    let exterior = rings.next()??;
    let interiors = rings.collect::<Option<Vec<_>>>()?;
    Some(AreaPolygon::new(exterior, interiors))
}

fn parse_ring(ring: &Value) -> Option<LineString<f64>> {
    ring.as_array()?
        .iter()
        .map(parse_position)
        .collect::<Option<Vec<_>>>()
        .map(LineString::new)
}

/// `[lon, lat, ...]`; anything past the first two members is ignored.
fn parse_position(position: &Value) -> Option<Coord<f64>> {
    match position.as_array()?.as_slice() {
        [lon, lat, ..] => {
            let x = lon.as_f64().filter(|v| v.is_finite())?;
            let y = lat.as_f64().filter(|v| v.is_finite())?;
            Some(Coord { x, y })
        }
        _ => None,
    }
}

fn check_rings(shape: &Shape) -> Result<(), ValidationError> {
    for (polygon, part) in shape.polygons().iter().enumerate() {
        for (ring, coords) in part.rings().enumerate() {
            let len = coords.0.len();
            if len < 4 {
                return Err(ValidationError::DegenerateRing { polygon, ring, len });
            }
            if coords.0.first() != coords.0.last() {
                return Err(ValidationError::UnclosedRing { polygon, ring });
            }
        }
    }
    Ok(())
}

fn check_ranges(shape: &Shape) -> Result<(), ValidationError> {
    shape
        .polygons()
        .iter()
        .flat_map(|p| p.rings())
        .flat_map(|ring| ring.coords())
        .map(|c| LonLat::from(*c))
        .find(|c| !c.in_range())
        .map_or(Ok(()), |c| Err(ValidationError::CoordinateOutOfRange(c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SQUARE: &str = r#"{
        "type": "Feature",
        "properties": {"name": "square"},
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[0,0],[0,10],[10,10],[10,0],[0,0]]]
        }
    }"#;

    fn kind_of(text: &str) -> &'static str {
        validate(text).unwrap_err().kind()
    }

    #[test]
    fn test_valid_polygon_feature() {
        let feature = validate(SQUARE).unwrap();
        assert_eq!(feature.shape().kind(), "Polygon");
        assert_eq!(feature.shape().polygons()[0].exterior.0.len(), 5);
        assert_eq!(feature.properties()["name"], json!("square"));
    }

    #[test]
    fn test_malformed_json() {
        assert_eq!(kind_of("{not json"), "MalformedJson");
    }

    #[test]
    fn test_unsupported_root_type() {
        for text in [
            "42",
            "\"Feature\"",
            "[]",
            "null",
            "{}",
            r#"{"type":"Polygon","coordinates":[[[0,0],[1,1],[1,0],[0,0]]]}"#,
            r#"{"type":7}"#,
        ] {
            assert_eq!(kind_of(text), "UnsupportedRootType", "input: {}", text);
        }
    }

    #[test]
    fn test_empty_collection() {
        assert_eq!(
            kind_of(r#"{"type":"FeatureCollection","features":[]}"#),
            "EmptyCollection"
        );
        assert_eq!(
            kind_of(r#"{"type":"FeatureCollection"}"#),
            "EmptyCollection"
        );
    }

    #[test]
    fn test_collection_without_polygon() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]}},
            {"type":"Feature","geometry":null},
            {"type":"Polygon","coordinates":[[[0,0],[1,1],[1,0],[0,0]]]}
        ]}"#;
        assert_eq!(kind_of(text), "NoPolygonFeature");
    }

    #[test]
    fn test_collection_picks_first_polygon_feature() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"n":0},"geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]}},
            {"type":"Feature","properties":{"n":1},"geometry":{"type":"MultiPolygon","coordinates":[[[[0,0],[0,1],[1,1],[0,0]]]]}},
            {"type":"Feature","properties":{"n":2},"geometry":{"type":"Polygon","coordinates":[[[0,0],[0,2],[2,2],[0,0]]]}}
        ]}"#;
        let feature = validate(text).unwrap();
        assert_eq!(feature.properties()["n"], json!(1));
        assert_eq!(feature.shape().kind(), "MultiPolygon");
    }

    #[test]
    fn test_missing_geometry() {
        assert_eq!(kind_of(r#"{"type":"Feature"}"#), "MissingGeometry");
        assert_eq!(
            kind_of(r#"{"type":"Feature","geometry":null}"#),
            "MissingGeometry"
        );
    }

    #[test]
    fn test_unsupported_geometry_type() {
        let text =
            r#"{"type":"Feature","geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]}}"#;
        assert_eq!(kind_of(text), "UnsupportedGeometryType");
    }

    #[test]
    fn test_missing_coordinates() {
        assert_eq!(
            kind_of(r#"{"type":"Feature","geometry":{"type":"Polygon"}}"#),
            "MissingCoordinates"
        );
        assert_eq!(
            kind_of(r#"{"type":"Feature","geometry":{"type":"MultiPolygon","coordinates":[]}}"#),
            "MissingCoordinates"
        );
    }

    #[test]
    fn test_malformed_polygon_depth() {
        for coords in ["[[0,0],[1,1]]", "[[[0]]]", "[[]]", "[5]", "\"abc\""] {
            let text = format!(
                r#"{{"type":"Feature","geometry":{{"type":"Polygon","coordinates":{}}}}}"#,
                coords
            );
            assert_eq!(kind_of(&text), "MalformedPolygonCoordinates", "coords: {}", coords);
        }
    }

    #[test]
    fn test_malformed_multipolygon_depth() {
        // Polygon-depth coordinates under a MultiPolygon type
        let text = r#"{"type":"Feature","geometry":{"type":"MultiPolygon","coordinates":[[[0,0],[0,1],[1,1],[0,0]]]}}"#;
        assert_eq!(kind_of(text), "MalformedMultiPolygonCoordinates");
    }

    #[test]
    fn test_non_numeric_position_is_malformed() {
        let text = r#"{"type":"Feature","geometry":{"type":"Polygon","coordinates":[[[0,0],["a",1],[1,1],[0,0]]]}}"#;
        assert_eq!(kind_of(text), "MalformedPolygonCoordinates");
    }

    #[test]
    fn test_shallow_by_default() {
        // open, short ring and out-of-range values pass the structural checks
        let text = r#"{"type":"Feature","geometry":{"type":"Polygon","coordinates":[[[0,0],[200,1],[1,95]]]}}"#;
        let feature = validate(text).unwrap();
        assert_eq!(feature.shape().polygons()[0].exterior.0.len(), 3);
    }

    #[test]
    fn test_strict_rings() {
        let short = r#"{"type":"Feature","geometry":{"type":"Polygon","coordinates":[[[0,0],[0,1],[0,0]]]}}"#;
        assert_eq!(
            validate_with(short, ValidationOptions::strict()).unwrap_err(),
            ValidationError::DegenerateRing {
                polygon: 0,
                ring: 0,
                len: 3
            }
        );

        let open = r#"{"type":"Feature","geometry":{"type":"MultiPolygon","coordinates":[
            [[[0,0],[0,1],[1,1],[0,0]]],
            [[[5,5],[5,6],[6,6],[6,5]]]
        ]}}"#;
        assert_eq!(
            validate_with(open, ValidationOptions::strict()).unwrap_err(),
            ValidationError::UnclosedRing {
                polygon: 1,
                ring: 0
            }
        );
    }

    #[test]
    fn test_range_check() {
        let text = r#"{"type":"Feature","geometry":{"type":"Polygon","coordinates":[[[0,0],[0,1],[181,1],[0,0]]]}}"#;
        let options = ValidationOptions {
            strict_rings: false,
            check_ranges: true,
        };
        assert_eq!(
            validate_with(text, options).unwrap_err().kind(),
            "CoordinateOutOfRange"
        );
    }

    #[test]
    fn test_round_trip_is_stable() {
        let text = r#"{"type":"Feature","id":"area-1","properties":{"address":"Av. Corrientes 1234","tags":[1,2]},
            "geometry":{"type":"Polygon","coordinates":[
                [[0,0],[0,10],[10,10],[10,0],[0,0]],
                [[4,4],[6,4],[6,6],[4,6],[4,4]]
            ]}}"#;
        let first = validate(text).unwrap();
        let second = validate(&first.to_geojson().unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_accepted_feature_is_echoed_unchanged() {
        let text = r#"{"type":"Feature","bbox":[0,0,10,10],"properties":null,"title":"zone 3",
            "geometry":{"type":"Polygon","coordinates":[[[0,0,5],[0,10,5],[10,10,5],[10,0,5],[0,0,5]]]}}"#;
        let feature = validate(text).unwrap();
        let input: Value = serde_json::from_str(text).unwrap();
        assert_eq!(serde_json::to_value(&feature).unwrap(), input);
        assert!(feature.properties().is_empty());
        assert_eq!(
            feature.shape().polygons()[0].exterior.0[1],
            geo_types::Coord { x: 0.0, y: 10.0 }
        );
    }

    #[test]
    fn test_selected_collection_member_is_echoed_unchanged() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"n":0},"geometry":{"type":"Point","coordinates":[0,0]}},
            {"type":"Feature","id":7,"bbox":[0,0,2,2],"properties":{"n":1},
             "geometry":{"type":"MultiPolygon","coordinates":[[[[0,0],[0,2],[2,2],[0,0]]]]}}
        ]}"#;
        let feature = validate(text).unwrap();
        let input: Value = serde_json::from_str(text).unwrap();
        assert_eq!(serde_json::to_value(&feature).unwrap(), input["features"][1]);
        assert_eq!(feature.id(), Some(&json!(7)));
    }

    #[test]
    fn test_error_messages_are_specific() {
        let err = validate(r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[0,0]}}"#)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "geometry must be 'Polygon' or 'MultiPolygon', found Point"
        );
    }
}
