//! GeoJSON feature model for feed payloads.
//!
//! Deserialization is structural: it enforces the `type` tags and the nesting
//! depth of coordinate arrays, but accepts positions of any length. Semantic
//! checks (enough positions, closed rings, finite numbers) live in
//! [`Geometry::validate`] so a single bad entity can be rejected without
//! discarding the whole feed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Property that carries a point entity's icon URL.
pub const ICON_URL_PROPERTY: &str = "iconUrl";

/// A GeoJSON position: `[longitude, latitude, (altitude)]`.
pub type Position = Vec<f64>;

/// Errors found when validating a geometry's coordinates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// A position has fewer than two coordinates.
    #[error("position has {len} coordinates, expected at least 2")]
    PositionTooShort {
        /// Number of coordinates found.
        len: usize,
    },

    /// A coordinate is NaN or infinite.
    #[error("position contains a non-finite coordinate")]
    NonFinite,

    /// A line string has fewer than two positions.
    #[error("line string has {len} positions, expected at least 2")]
    LineTooShort {
        /// Number of positions found.
        len: usize,
    },

    /// A polygon ring has fewer than four positions.
    #[error("polygon ring has {len} positions, expected at least 4")]
    RingTooShort {
        /// Number of positions found.
        len: usize,
    },

    /// A polygon ring's first and last positions differ.
    #[error("polygon ring is not closed")]
    RingNotClosed,

    /// A multi-geometry or polygon has no members.
    #[error("{kind} has no members")]
    Empty {
        /// The geometry kind that was empty.
        kind: &'static str,
    },

    /// The feature has no geometry at all.
    #[error("feature has no geometry")]
    Missing,
}

/// How a geometry is drawn on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryClass {
    /// Point-like geometry drawn as an icon symbol.
    Marker,
    /// Line or area geometry drawn as an outline.
    Outline,
}

/// GeoJSON geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    /// A single position.
    Point {
        /// The point's position.
        coordinates: Position,
    },
    /// Several unconnected positions.
    MultiPoint {
        /// The positions.
        coordinates: Vec<Position>,
    },
    /// A connected line.
    LineString {
        /// The line's positions.
        coordinates: Vec<Position>,
    },
    /// Several lines.
    MultiLineString {
        /// One position list per line.
        coordinates: Vec<Vec<Position>>,
    },
    /// An area bounded by an exterior ring and optional holes.
    Polygon {
        /// Linear rings, exterior first.
        coordinates: Vec<Vec<Position>>,
    },
    /// Several areas.
    MultiPolygon {
        /// One ring list per polygon.
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    /// A heterogeneous set of geometries.
    GeometryCollection {
        /// The member geometries.
        geometries: Vec<Geometry>,
    },
}

impl Geometry {
    /// GeoJSON type name of this geometry.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Point { .. } => "Point",
            Self::MultiPoint { .. } => "MultiPoint",
            Self::LineString { .. } => "LineString",
            Self::MultiLineString { .. } => "MultiLineString",
            Self::Polygon { .. } => "Polygon",
            Self::MultiPolygon { .. } => "MultiPolygon",
            Self::GeometryCollection { .. } => "GeometryCollection",
        }
    }

    /// Whether this geometry is drawn as a marker or an outline.
    ///
    /// A geometry collection is a marker only if every member is.
    pub fn class(&self) -> GeometryClass {
        match self {
            Self::Point { .. } | Self::MultiPoint { .. } => GeometryClass::Marker,
            Self::GeometryCollection { geometries } => {
                if geometries.iter().all(|g| g.class() == GeometryClass::Marker) {
                    GeometryClass::Marker
                } else {
                    GeometryClass::Outline
                }
            }
            Self::LineString { .. }
            | Self::MultiLineString { .. }
            | Self::Polygon { .. }
            | Self::MultiPolygon { .. } => GeometryClass::Outline,
        }
    }

    /// Check that the coordinates describe a renderable geometry.
    pub fn validate(&self) -> Result<(), GeometryError> {
        match self {
            Self::Point { coordinates } => validate_position(coordinates),
            Self::MultiPoint { coordinates } => {
                non_empty(coordinates, "MultiPoint")?;
                coordinates.iter().try_for_each(|p| validate_position(p))
            }
            Self::LineString { coordinates } => validate_line(coordinates),
            Self::MultiLineString { coordinates } => {
                non_empty(coordinates, "MultiLineString")?;
                coordinates.iter().try_for_each(|l| validate_line(l))
            }
            Self::Polygon { coordinates } => validate_polygon(coordinates),
            Self::MultiPolygon { coordinates } => {
                non_empty(coordinates, "MultiPolygon")?;
                coordinates.iter().try_for_each(|p| validate_polygon(p))
            }
            Self::GeometryCollection { geometries } => {
                non_empty(geometries, "GeometryCollection")?;
                geometries.iter().try_for_each(Self::validate)
            }
        }
    }
}

const fn non_empty<T>(items: &[T], kind: &'static str) -> Result<(), GeometryError> {
    if items.is_empty() {
        Err(GeometryError::Empty { kind })
    } else {
        Ok(())
    }
}

fn validate_position(position: &[f64]) -> Result<(), GeometryError> {
    if position.len() < 2 {
        return Err(GeometryError::PositionTooShort {
            len: position.len(),
        });
    }
    if position.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(GeometryError::NonFinite)
    }
}

fn validate_line(line: &[Position]) -> Result<(), GeometryError> {
    if line.len() < 2 {
        return Err(GeometryError::LineTooShort { len: line.len() });
    }
    line.iter().try_for_each(|p| validate_position(p))
}

fn validate_polygon(rings: &[Vec<Position>]) -> Result<(), GeometryError> {
    non_empty(rings, "Polygon")?;
    for ring in rings {
        if ring.len() < 4 {
            return Err(GeometryError::RingTooShort { len: ring.len() });
        }
        ring.iter().try_for_each(|p| validate_position(p))?;
        let closed = match (ring.first(), ring.last()) {
            (Some(first), Some(last)) => same_position(first, last),
            _ => false,
        };
        if !closed {
            return Err(GeometryError::RingNotClosed);
        }
    }
    Ok(())
}

fn same_position(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= f64::EPSILON)
}

/// The `type` tag of a feature object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureTag {
    /// `"Feature"`.
    #[default]
    Feature,
}

/// The `type` tag of a feature collection object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionTag {
    /// `"FeatureCollection"`.
    #[default]
    FeatureCollection,
}

/// A feature's optional `id` member (string or number).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    /// String identifier.
    Text(String),
    /// Numeric identifier.
    Number(serde_json::Number),
}

impl core::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

/// A GeoJSON feature: one vehicle or parking zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Always `"Feature"`.
    #[serde(rename = "type")]
    pub tag: FeatureTag,
    /// Feed-provided identifier, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    /// The feature's geometry (`null` is allowed by GeoJSON).
    pub geometry: Option<Geometry>,
    /// Attribute map.
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl Feature {
    /// Build a feature from a geometry and properties.
    pub const fn new(geometry: Geometry, properties: Map<String, Value>) -> Self {
        Self {
            tag: FeatureTag::Feature,
            id: None,
            geometry: Some(geometry),
            properties: Some(properties),
        }
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|p| p.get(name))
    }

    /// Look up a string property by name.
    pub fn string_property(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(Value::as_str)
    }

    /// The icon URL, when present and non-blank.
    pub fn icon_url(&self) -> Option<&str> {
        self.string_property(ICON_URL_PROPERTY)
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Summary of what a parsed collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionContents {
    /// `features` was missing or `null`.
    Absent,
    /// `features` was an empty array.
    Empty,
    /// `features` held this many entries.
    Populated(usize),
}

/// A GeoJSON feature collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// Always `"FeatureCollection"`.
    #[serde(rename = "type")]
    pub tag: CollectionTag,
    /// The features; `None` when the member was missing or `null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<Feature>>,
}

impl FeatureCollection {
    /// Collection holding the given features.
    pub const fn from_features(features: Vec<Feature>) -> Self {
        Self {
            tag: CollectionTag::FeatureCollection,
            features: Some(features),
        }
    }

    /// Collection wrapping a single feature, as registered per entity.
    pub fn single(feature: Feature) -> Self {
        Self::from_features(vec![feature])
    }

    /// Collection with no `features` member.
    pub const fn absent() -> Self {
        Self {
            tag: CollectionTag::FeatureCollection,
            features: None,
        }
    }

    /// The features, or an empty slice when absent.
    pub fn features(&self) -> &[Feature] {
        self.features.as_deref().unwrap_or_default()
    }

    /// Classify the collection for orchestration.
    pub fn contents(&self) -> CollectionContents {
        match &self.features {
            None => CollectionContents::Absent,
            Some(features) if features.is_empty() => CollectionContents::Empty,
            Some(features) => CollectionContents::Populated(features.len()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn point(lon: f64, lat: f64) -> Geometry {
        Geometry::Point {
            coordinates: vec![lon, lat],
        }
    }

    fn square() -> Vec<Position> {
        vec![
            vec![174.0, -41.0],
            vec![174.1, -41.0],
            vec![174.1, -41.1],
            vec![174.0, -41.0],
        ]
    }

    #[test]
    fn deserializes_point_feature_with_icon() {
        let json = r#"{
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [174.78, -41.29]},
            "properties": {"iconUrl": "https://x/icon.png", "battery": 80}
        }"#;
        let feature: Feature = serde_json::from_str(json).unwrap();
        assert_eq!(feature.geometry, Some(point(174.78, -41.29)));
        assert_eq!(feature.icon_url(), Some("https://x/icon.png"));
        assert_eq!(feature.property("battery"), Some(&Value::from(80)));
    }

    #[test]
    fn rejects_wrong_feature_tag() {
        let json = r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#;
        assert!(serde_json::from_str::<Feature>(json).is_err());
    }

    #[test]
    fn rejects_unknown_geometry_type() {
        let json = r#"{"type": "Circle", "coordinates": [1.0, 2.0]}"#;
        assert!(serde_json::from_str::<Geometry>(json).is_err());
    }

    #[test]
    fn missing_and_null_features_are_absent() {
        let missing: FeatureCollection =
            serde_json::from_str(r#"{"type": "FeatureCollection"}"#).unwrap();
        let null: FeatureCollection =
            serde_json::from_str(r#"{"type": "FeatureCollection", "features": null}"#).unwrap();
        let empty: FeatureCollection =
            serde_json::from_str(r#"{"type": "FeatureCollection", "features": []}"#).unwrap();
        assert_eq!(missing.contents(), CollectionContents::Absent);
        assert_eq!(null.contents(), CollectionContents::Absent);
        assert_eq!(empty.contents(), CollectionContents::Empty);
        assert!(missing.features().is_empty());
    }

    #[test]
    fn single_feature_collection_serializes_as_geojson() {
        let feature = Feature::new(point(1.0, 2.0), Map::new());
        let value = serde_json::to_value(FeatureCollection::single(feature)).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["type"], "Feature");
        assert_eq!(value["features"][0]["geometry"]["type"], "Point");
        assert_eq!(value["features"][0]["geometry"]["coordinates"][1], 2.0);
    }

    #[test]
    fn blank_icon_url_is_ignored() {
        let mut props = Map::new();
        props.insert(ICON_URL_PROPERTY.to_owned(), Value::from("  "));
        let feature = Feature::new(point(0.0, 0.0), props);
        assert!(feature.icon_url().is_none());
    }

    #[test]
    fn validates_points() {
        assert!(point(174.7, -41.2).validate().is_ok());
        let short = Geometry::Point {
            coordinates: vec![174.7],
        };
        assert_eq!(
            short.validate(),
            Err(GeometryError::PositionTooShort { len: 1 })
        );
        let nan = Geometry::Point {
            coordinates: vec![f64::NAN, 1.0],
        };
        assert_eq!(nan.validate(), Err(GeometryError::NonFinite));
    }

    #[test]
    fn validates_polygon_rings() {
        let ok = Geometry::Polygon {
            coordinates: vec![square()],
        };
        assert!(ok.validate().is_ok());

        let mut open = square();
        open.pop();
        open.push(vec![174.2, -41.2]);
        let unclosed = Geometry::Polygon {
            coordinates: vec![open],
        };
        assert_eq!(unclosed.validate(), Err(GeometryError::RingNotClosed));

        let short = Geometry::Polygon {
            coordinates: vec![vec![vec![0.0, 0.0], vec![0.0, 0.0]]],
        };
        assert_eq!(short.validate(), Err(GeometryError::RingTooShort { len: 2 }));
    }

    #[test]
    fn classes_follow_geometry_kind() {
        assert_eq!(point(0.0, 0.0).class(), GeometryClass::Marker);
        let line = Geometry::LineString {
            coordinates: vec![vec![0.0, 0.0], vec![1.0, 1.0]],
        };
        assert_eq!(line.class(), GeometryClass::Outline);
        let mixed = Geometry::GeometryCollection {
            geometries: vec![point(0.0, 0.0), line],
        };
        assert_eq!(mixed.class(), GeometryClass::Outline);
        let markers = Geometry::GeometryCollection {
            geometries: vec![point(0.0, 0.0)],
        };
        assert_eq!(markers.class(), GeometryClass::Marker);
    }

    #[test]
    fn numeric_feature_ids_display_plainly() {
        let feature: Feature = serde_json::from_str(
            r#"{"type": "Feature", "id": 42, "geometry": null, "properties": null}"#,
        )
        .unwrap();
        assert_eq!(feature.id.map(|id| id.to_string()), Some("42".to_owned()));
        assert!(feature.geometry.is_none());
    }
}
