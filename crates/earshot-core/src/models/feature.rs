use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::EarshotError;
use crate::models::{Coordinate, FeatureGeometry};

/// A single property value attached to a feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
}

/// Property name to value mapping
pub type Properties = HashMap<String, PropertyValue>;

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value, if it is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(v) => Some(*v as f64),
            PropertyValue::UInt(v) => Some(*v as f64),
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this is a NaN or infinite double, which JSON numbers cannot hold
    pub fn is_non_finite(&self) -> bool {
        matches!(self, PropertyValue::Double(v) if !v.is_finite())
    }

    /// JSON form of the value. Non-finite doubles become the strings `NaN`,
    /// `inf` and `-inf`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::Bool(b) => serde_json::Value::Bool(*b),
            PropertyValue::Int(v) => serde_json::Value::from(*v),
            PropertyValue::UInt(v) => serde_json::Value::from(*v),
            PropertyValue::Double(v) => match serde_json::Number::from_f64(*v) {
                Some(n) => serde_json::Value::Number(n),
                None => serde_json::Value::String(v.to_string()),
            },
            PropertyValue::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Convert a JSON scalar. Arrays, objects and null have no property
    /// representation and yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(PropertyValue::Bool(*b)),
            serde_json::Value::String(s) => Some(PropertyValue::String(s.clone())),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Some(PropertyValue::Int(v))
                } else if let Some(v) = n.as_u64() {
                    Some(PropertyValue::UInt(v))
                } else {
                    n.as_f64().map(PropertyValue::Double)
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::UInt(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// What a feature represents, used for filtering queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Road,
    Path,
    Intersection,
    Poi,
    TransitStop,
    Building,
    Water,
    #[default]
    Other,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 8] = [
        FeatureKind::Road,
        FeatureKind::Path,
        FeatureKind::Intersection,
        FeatureKind::Poi,
        FeatureKind::TransitStop,
        FeatureKind::Building,
        FeatureKind::Water,
        FeatureKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Road => "road",
            FeatureKind::Path => "path",
            FeatureKind::Intersection => "intersection",
            FeatureKind::Poi => "poi",
            FeatureKind::TransitStop => "transit_stop",
            FeatureKind::Building => "building",
            FeatureKind::Water => "water",
            FeatureKind::Other => "other",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureKind {
    type Err = EarshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        FeatureKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| EarshotError::ConfigInvalid {
                key: "kind".to_string(),
                reason: format!(
                    "unknown feature kind '{}', expected one of: road, path, intersection, poi, transit_stop, building, water, other",
                    s
                ),
            })
    }
}

/// A decoded map feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialFeature {
    /// Geometry in world coordinates
    pub geometry: FeatureGeometry,

    /// Source properties
    #[serde(default)]
    pub properties: Properties,

    /// Stable source identifier (e.g. an OSM node or way id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<u64>,

    /// Kind used for query filtering
    #[serde(default)]
    pub kind: FeatureKind,

    /// Name of the tile layer the feature came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
}

impl SpatialFeature {
    pub fn new(geometry: FeatureGeometry, kind: FeatureKind) -> Self {
        Self { geometry, properties: Properties::new(), external_id: None, kind, layer: None }
    }

    pub fn with_external_id(mut self, id: u64) -> Self {
        self.external_id = Some(id);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// The `name` property, if it is a string
    pub fn name(&self) -> Option<&str> {
        self.property("name").and_then(PropertyValue::as_str)
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn center(&self) -> Option<Coordinate> {
        self.geometry.center()
    }
}
