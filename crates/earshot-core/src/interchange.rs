//! GeoJSON conversion for feature lists
//!
//! A `FeatureList` maps to a `FeatureCollection`. The external id becomes the
//! numeric feature `id`; kind and source layer ride along as foreign members
//! so a list survives the round trip unchanged. NaN and infinite doubles are
//! written as strings and their keys listed under `non_finite`.

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use std::sync::Arc;

use crate::error::{EarshotError, Result};
use crate::models::{
    Coordinate, FeatureGeometry, FeatureKind, FeatureList, PolygonRings, Properties,
    PropertyValue, SpatialFeature,
};

const KIND_MEMBER: &str = "kind";
const LAYER_MEMBER: &str = "layer";
const NON_FINITE_MEMBER: &str = "non_finite";

pub fn to_feature_collection(list: &FeatureList) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: list.iter().map(|f| to_geojson_feature(f)).collect(),
        foreign_members: None,
    }
}

pub fn from_feature_collection(collection: &FeatureCollection) -> Result<FeatureList> {
    collection
        .features
        .iter()
        .enumerate()
        .map(|(idx, feature)| from_geojson_feature(feature, idx).map(Arc::new))
        .collect()
}

/// Serialize a feature list as a GeoJSON FeatureCollection document
pub fn to_geojson_string(list: &FeatureList) -> Result<String> {
    serde_json::to_string_pretty(&to_feature_collection(list))
        .map_err(|e| EarshotError::Serialization(format!("Failed to serialize GeoJSON: {}", e)))
}

/// Parse a GeoJSON document. A bare Feature or Geometry yields a one-entry list.
pub fn from_geojson_str(content: &str) -> Result<FeatureList> {
    let geojson: GeoJson = content
        .parse()
        .map_err(|e| EarshotError::Serialization(format!("Failed to parse GeoJSON: {}", e)))?;

    match geojson {
        GeoJson::FeatureCollection(fc) => from_feature_collection(&fc),
        GeoJson::Feature(feature) => {
            let mut list = FeatureList::new();
            list.append(from_geojson_feature(&feature, 0)?);
            Ok(list)
        }
        GeoJson::Geometry(geometry) => {
            let mut list = FeatureList::new();
            list.append(SpatialFeature::new(from_geojson_geometry(&geometry)?, FeatureKind::Other));
            Ok(list)
        }
    }
}

pub fn to_geojson_feature(feature: &SpatialFeature) -> Feature {
    let properties: JsonObject =
        feature.properties.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();

    let mut foreign = JsonObject::new();
    foreign.insert(KIND_MEMBER.to_string(), serde_json::Value::from(feature.kind.as_str()));
    if let Some(layer) = &feature.layer {
        foreign.insert(LAYER_MEMBER.to_string(), serde_json::Value::from(layer.as_str()));
    }

    let mut non_finite: Vec<&str> = feature
        .properties
        .iter()
        .filter(|(_, v)| v.is_non_finite())
        .map(|(k, _)| k.as_str())
        .collect();
    if !non_finite.is_empty() {
        non_finite.sort_unstable();
        foreign.insert(NON_FINITE_MEMBER.to_string(), serde_json::Value::from(non_finite));
    }

    Feature {
        bbox: None,
        geometry: Some(to_geojson_geometry(&feature.geometry)),
        id: feature
            .external_id
            .map(|id| geojson::feature::Id::Number(serde_json::Number::from(id))),
        properties: Some(properties),
        foreign_members: Some(foreign),
    }
}

pub fn from_geojson_feature(feature: &Feature, idx: usize) -> Result<SpatialFeature> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| EarshotError::invalid_geometry(format!("feature {} has no geometry", idx)))?;

    let foreign = feature.foreign_members.as_ref();
    let non_finite: Vec<&str> = foreign
        .and_then(|fm| fm.get(NON_FINITE_MEMBER))
        .and_then(|v| v.as_array())
        .map(|keys| keys.iter().filter_map(|k| k.as_str()).collect())
        .unwrap_or_default();

    let mut properties = Properties::new();
    for (key, value) in feature.properties.iter().flatten() {
        let parsed = if non_finite.contains(&key.as_str()) {
            non_finite_double(value)
        } else {
            PropertyValue::from_json(value)
        };
        match parsed {
            Some(v) => {
                properties.insert(key.clone(), v);
            }
            None => tracing::warn!(feature = idx, key = %key, "Skipping non-scalar property"),
        }
    }

    let external_id = feature.id.as_ref().and_then(|id| match id {
        geojson::feature::Id::Number(n) => n.as_u64(),
        geojson::feature::Id::String(s) => s.parse().ok(),
    });

    let kind = foreign
        .and_then(|fm| fm.get(KIND_MEMBER))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();
    let layer = foreign
        .and_then(|fm| fm.get(LAYER_MEMBER))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(SpatialFeature {
        geometry: from_geojson_geometry(geometry)?,
        properties,
        external_id,
        kind,
        layer,
    })
}

pub fn to_geojson_geometry(geometry: &FeatureGeometry) -> Geometry {
    let positions = |coords: &[Coordinate]| -> Vec<Vec<f64>> {
        coords.iter().map(Coordinate::to_position).collect()
    };
    let rings = |polygon: &PolygonRings| -> Vec<Vec<Vec<f64>>> {
        std::iter::once(&polygon.exterior)
            .chain(polygon.interiors.iter())
            .map(|ring| positions(ring))
            .collect()
    };

    let value = match geometry {
        FeatureGeometry::Point { coordinate } => Value::Point(coordinate.to_position()),
        FeatureGeometry::MultiPoint { points } => Value::MultiPoint(positions(points)),
        FeatureGeometry::LineString { coordinates } => Value::LineString(positions(coordinates)),
        FeatureGeometry::MultiLineString { lines } => {
            Value::MultiLineString(lines.iter().map(|line| positions(line)).collect())
        }
        FeatureGeometry::Polygon { polygon } => Value::Polygon(rings(polygon)),
        FeatureGeometry::MultiPolygon { polygons } => {
            Value::MultiPolygon(polygons.iter().map(|p| rings(p)).collect())
        }
    };

    Geometry::new(value)
}

pub fn from_geojson_geometry(geometry: &Geometry) -> Result<FeatureGeometry> {
    match &geometry.value {
        Value::Point(position) => Ok(FeatureGeometry::Point { coordinate: coordinate(position)? }),
        Value::MultiPoint(points) => Ok(FeatureGeometry::MultiPoint { points: coordinates(points)? }),
        Value::LineString(line) => {
            Ok(FeatureGeometry::LineString { coordinates: coordinates(line)? })
        }
        Value::MultiLineString(lines) => Ok(FeatureGeometry::MultiLineString {
            lines: lines.iter().map(|line| coordinates(line)).collect::<Result<_>>()?,
        }),
        Value::Polygon(rings) => Ok(FeatureGeometry::Polygon { polygon: polygon_rings(rings)? }),
        Value::MultiPolygon(polygons) => Ok(FeatureGeometry::MultiPolygon {
            polygons: polygons.iter().map(|rings| polygon_rings(rings)).collect::<Result<_>>()?,
        }),
        Value::GeometryCollection(_) => {
            Err(EarshotError::invalid_geometry("GeometryCollection is not supported"))
        }
    }
}

/// Parse a value listed under `non_finite` back into a double
fn non_finite_double(value: &serde_json::Value) -> Option<PropertyValue> {
    match value {
        serde_json::Value::String(s) => s.parse::<f64>().ok().map(PropertyValue::Double),
        other => PropertyValue::from_json(other),
    }
}

fn coordinate(position: &[f64]) -> Result<Coordinate> {
    Coordinate::from_position(position).ok_or_else(|| {
        EarshotError::invalid_geometry(format!(
            "position needs at least 2 values, got {}",
            position.len()
        ))
    })
}

fn coordinates(positions: &[Vec<f64>]) -> Result<Vec<Coordinate>> {
    positions.iter().map(|p| coordinate(p)).collect()
}

fn polygon_rings(rings: &[Vec<Vec<f64>>]) -> Result<PolygonRings> {
    let (exterior, interiors) = rings
        .split_first()
        .ok_or_else(|| EarshotError::invalid_geometry("polygon has no rings"))?;

    Ok(PolygonRings::with_interiors(
        coordinates(exterior)?,
        interiors.iter().map(|ring| coordinates(ring)).collect::<Result<_>>()?,
    ))
}
