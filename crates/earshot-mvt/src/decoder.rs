//! Tile decoding.

use earshot_core::models::{
    FeatureList, Properties, PropertyValue, SpatialFeature, TileCoordinate,
};
use earshot_core::DecodeError;
use prost::Message;
use tracing::debug;

use crate::geometry::{self, StreamError};
use crate::kind::classify;
use crate::proto::{self, GeomType};

const SUPPORTED_VERSIONS: [u32; 2] = [1, 2];
const DEFAULT_EXTENT: u32 = 4096;

/// Decode a vector tile into features in world coordinates.
///
/// Decoding is all-or-nothing: any error in any layer fails the whole tile
/// and no partially decoded features are returned. A feature whose stream is
/// complete but describes nothing usable (a one-vertex line, a zero-area
/// ring) is skipped instead.
pub fn decode_tile(bytes: &[u8], tile: TileCoordinate) -> Result<FeatureList, DecodeError> {
    let message = proto::Tile::decode(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let mut features = FeatureList::new();
    for layer in &message.layers {
        decode_layer(layer, &tile, &mut features)?;
    }

    debug!(
        tile = %tile,
        layers = message.layers.len(),
        features = features.len(),
        "Decoded tile"
    );
    Ok(features)
}

fn decode_layer(
    layer: &proto::Layer,
    tile: &TileCoordinate,
    out: &mut FeatureList,
) -> Result<(), DecodeError> {
    if !SUPPORTED_VERSIONS.contains(&layer.version) {
        return Err(DecodeError::UnsupportedVersion {
            layer: layer.name.clone(),
            version: layer.version,
        });
    }

    let extent = layer.extent.unwrap_or(DEFAULT_EXTENT);
    if extent == 0 {
        return Err(DecodeError::Malformed(format!("layer '{}' has zero extent", layer.name)));
    }

    for (index, feature) in layer.features.iter().enumerate() {
        let properties = resolve_properties(layer, feature)?;

        let paths = geometry::decode_paths(&feature.geometry).map_err(|e| match e {
            StreamError::Truncated => {
                DecodeError::TruncatedGeometry { layer: layer.name.clone(), feature: index }
            }
            StreamError::InvalidCommand(command) => {
                DecodeError::InvalidCommand { layer: layer.name.clone(), command }
            }
        })?;

        let geom_type = feature.r#type.unwrap_or(GeomType::Unknown as i32);
        let geometry = match GeomType::try_from(geom_type) {
            Ok(GeomType::Point) => geometry::to_points(&paths, tile, extent),
            Ok(GeomType::Linestring) => geometry::to_lines(&paths, tile, extent),
            Ok(GeomType::Polygon) => geometry::to_polygons(&paths, tile, extent),
            Ok(GeomType::Unknown) | Err(_) => {
                return Err(DecodeError::UnknownGeometryType {
                    layer: layer.name.clone(),
                    geom_type,
                })
            }
        };
        let Some(geometry) = geometry else {
            debug!(layer = %layer.name, feature = index, "Skipping degenerate geometry");
            continue;
        };

        let kind = classify(&layer.name, &properties);
        let mut spatial = SpatialFeature::new(geometry, kind).with_layer(layer.name.as_str());
        spatial.properties = properties;
        spatial.external_id = feature.id.filter(|&id| id != 0);

        out.append(spatial);
    }

    Ok(())
}

fn resolve_properties(
    layer: &proto::Layer,
    feature: &proto::Feature,
) -> Result<Properties, DecodeError> {
    if feature.tags.len() % 2 != 0 {
        return Err(DecodeError::Malformed(format!(
            "odd number of tag indices in layer '{}'",
            layer.name
        )));
    }

    let mut properties = Properties::with_capacity(feature.tags.len() / 2);
    for pair in feature.tags.chunks_exact(2) {
        let (key_index, value_index) = (pair[0], pair[1]);

        let key = layer.keys.get(key_index as usize).ok_or_else(|| {
            DecodeError::PropertyIndexOutOfRange {
                layer: layer.name.clone(),
                index: key_index,
                len: layer.keys.len(),
            }
        })?;
        let value = layer.values.get(value_index as usize).ok_or_else(|| {
            DecodeError::PropertyIndexOutOfRange {
                layer: layer.name.clone(),
                index: value_index,
                len: layer.values.len(),
            }
        })?;

        let value = convert_value(value).ok_or_else(|| {
            DecodeError::Malformed(format!(
                "value {} in layer '{}' carries no data",
                value_index, layer.name
            ))
        })?;
        properties.insert(key.clone(), value);
    }

    Ok(properties)
}

fn convert_value(value: &proto::Value) -> Option<PropertyValue> {
    if let Some(s) = &value.string_value {
        return Some(PropertyValue::String(s.clone()));
    }
    if let Some(v) = value.float_value {
        return Some(PropertyValue::Double(f64::from(v)));
    }
    if let Some(v) = value.double_value {
        return Some(PropertyValue::Double(v));
    }
    if let Some(v) = value.int_value.or(value.sint_value) {
        return Some(PropertyValue::Int(v));
    }
    if let Some(v) = value.uint_value {
        return Some(match i64::try_from(v) {
            Ok(small) => PropertyValue::Int(small),
            Err(_) => PropertyValue::UInt(v),
        });
    }
    value.bool_value.map(PropertyValue::Bool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_value_variants() {
        let uint = proto::Value { uint_value: Some(7), ..Default::default() };
        assert_eq!(convert_value(&uint), Some(PropertyValue::Int(7)));

        let big = proto::Value { uint_value: Some(u64::MAX), ..Default::default() };
        assert_eq!(convert_value(&big), Some(PropertyValue::UInt(u64::MAX)));

        let sint = proto::Value { sint_value: Some(-4), ..Default::default() };
        assert_eq!(convert_value(&sint), Some(PropertyValue::Int(-4)));

        let float = proto::Value { float_value: Some(1.5), ..Default::default() };
        assert_eq!(convert_value(&float), Some(PropertyValue::Double(1.5)));

        assert_eq!(convert_value(&proto::Value::default()), None);
    }

    #[test]
    fn test_empty_bytes_decode_to_empty_list() {
        let features = decode_tile(&[], TileCoordinate::new(0, 0, 0)).unwrap();
        assert!(features.is_empty());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = decode_tile(&[0xff, 0xff, 0xff], TileCoordinate::new(0, 0, 0)).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }
}
