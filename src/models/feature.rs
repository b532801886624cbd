//! Reference area data model: polygons, multipolygons and the wrapping feature.

use geo::BoundingRect;
use geo_types::{LineString, MultiPolygon, Polygon, Rect};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// A polygon whose rings are kept exactly as supplied.
///
/// `geo_types::Polygon::new` closes open rings on construction, which would
/// hide what the operator actually uploaded, so rings are held as plain
/// line strings here and only converted on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaPolygon {
    pub exterior: LineString<f64>,
    pub interiors: Vec<LineString<f64>>,
}

impl AreaPolygon {
    pub fn new(exterior: LineString<f64>, interiors: Vec<LineString<f64>>) -> Self {
        Self {
            exterior,
            interiors,
        }
    }

    /// Exterior ring first, then holes in input order
    pub fn rings(&self) -> impl Iterator<Item = &LineString<f64>> {
        std::iter::once(&self.exterior).chain(self.interiors.iter())
    }

    /// Convert into a `geo` polygon (rings get closed).
    pub fn to_geo(&self) -> Polygon<f64> {
        Polygon::new(self.exterior.clone(), self.interiors.clone())
    }

    fn positions(&self) -> Vec<Vec<[f64; 2]>> {
        self.rings()
            .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
            .collect()
    }
}

/// Geometry of a reference area.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Polygon(AreaPolygon),
    MultiPolygon(Vec<AreaPolygon>),
}

impl Shape {
    /// GeoJSON geometry type name
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Polygon(_) => "Polygon",
            Shape::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Member polygons; a plain polygon is a single-member slice.
    pub fn polygons(&self) -> &[AreaPolygon] {
        match self {
            Shape::Polygon(p) => std::slice::from_ref(p),
            Shape::MultiPolygon(parts) => parts,
        }
    }

    /// Bounding box over all parts
    pub fn bbox(&self) -> Option<Rect<f64>> {
        self.to_geo().bounding_rect()
    }

    pub fn to_geo(&self) -> MultiPolygon<f64> {
        MultiPolygon::new(self.polygons().iter().map(AreaPolygon::to_geo).collect())
    }
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum GeometryOut {
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
}

impl Serialize for Shape {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let out = match self {
            Shape::Polygon(p) => GeometryOut::Polygon {
                coordinates: p.positions(),
            },
            Shape::MultiPolygon(parts) => GeometryOut::MultiPolygon {
                coordinates: parts.iter().map(AreaPolygon::positions).collect(),
            },
        };
        out.serialize(serializer)
    }
}

/// A validated reference area: geometry plus free-form properties.
///
/// A feature produced by validation keeps the object it was read from and
/// serializes back to it verbatim, including members this type does not
/// model (`bbox`, foreign members, altitudes, `"properties": null`).
#[derive(Debug, Clone, PartialEq)]
pub struct AreaFeature {
    id: Option<Value>,
    shape: Shape,
    properties: Map<String, Value>,
    source: Option<Map<String, Value>>,
}

#[derive(Serialize)]
struct FeatureOut<'a> {
    #[serde(rename = "type")]
    feature_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a Value>,
    geometry: &'a Shape,
    properties: &'a Map<String, Value>,
}

impl Serialize for AreaFeature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.source {
            Some(source) => source.serialize(serializer),
            None => FeatureOut {
                feature_type: "Feature",
                id: self.id.as_ref(),
                geometry: &self.shape,
                properties: &self.properties,
            }
            .serialize(serializer),
        }
    }
}

impl AreaFeature {
    pub fn new(shape: Shape) -> Self {
        Self {
            id: None,
            shape,
            properties: Map::new(),
            source: None,
        }
    }

    /// Wrap a validated feature object; `shape` must have been read from it.
    pub(crate) fn from_source(source: Map<String, Value>, shape: Shape) -> Self {
        let properties = match source.get("properties") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        Self {
            id: source.get("id").cloned(),
            shape,
            properties,
            source: Some(source),
        }
    }

    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Properties; `null` or missing properties read as empty
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Serialize back to GeoJSON text
    pub fn to_geojson(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Coord;
    use serde_json::json;

    fn ring(coords: &[[f64; 2]]) -> LineString<f64> {
        LineString::from(coords.to_vec())
    }

    #[test]
    fn test_open_ring_is_not_closed_on_storage() {
        let poly = AreaPolygon::new(ring(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]), vec![]);
        assert_eq!(poly.exterior.0.len(), 3);
        // conversion to geo closes it
        assert_eq!(poly.to_geo().exterior().0.len(), 4);
    }

    #[test]
    fn test_serialize_polygon_feature() {
        let feature = AreaFeature::new(Shape::Polygon(AreaPolygon::new(
            ring(&[[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [0.0, 0.0]]),
            vec![],
        )));

        let value = serde_json::to_value(&feature).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [0.0, 0.0]]]
                },
                "properties": {}
            })
        );
    }

    #[test]
    fn test_bbox_spans_all_parts() {
        let a = AreaPolygon::new(
            ring(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]),
            vec![],
        );
        let b = AreaPolygon::new(
            ring(&[[5.0, -2.0], [6.0, -2.0], [6.0, 3.0], [5.0, -2.0]]),
            vec![],
        );
        let rect = Shape::MultiPolygon(vec![a, b]).bbox().unwrap();
        assert_eq!(rect.min(), Coord { x: 0.0, y: -2.0 });
        assert_eq!(rect.max(), Coord { x: 6.0, y: 3.0 });
    }

    #[test]
    fn test_polygon_is_single_member() {
        let shape = Shape::Polygon(AreaPolygon::new(ring(&[[0.0, 0.0]]), vec![]));
        assert_eq!(shape.polygons().len(), 1);
        assert_eq!(shape.kind(), "Polygon");
    }
}
