//! Tile encoding.
//!
//! Builds tiles from tile-local integer positions, mostly for test fixtures.
//! The runtime pipeline only decodes.

use std::collections::HashMap;

use earshot_core::models::PropertyValue;
use prost::Message;

use crate::geometry::{CLOSE_PATH, LINE_TO, MOVE_TO};
use crate::proto::{self, GeomType};

pub fn encode_command(id: u32, count: u32) -> u32 {
    (id & 0x7) | (count << 3)
}

pub fn zigzag_encode(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Emits a command stream, tracking the cursor between parts
#[derive(Default)]
struct StreamWriter {
    commands: Vec<u32>,
    cursor: (i32, i32),
}

impl StreamWriter {
    fn move_to(&mut self, points: &[(i32, i32)]) {
        self.commands.push(encode_command(MOVE_TO, points.len() as u32));
        self.params(points);
    }

    fn line_to(&mut self, points: &[(i32, i32)]) {
        if points.is_empty() {
            return;
        }
        self.commands.push(encode_command(LINE_TO, points.len() as u32));
        self.params(points);
    }

    fn close_path(&mut self) {
        self.commands.push(encode_command(CLOSE_PATH, 1));
    }

    fn params(&mut self, points: &[(i32, i32)]) {
        for &(x, y) in points {
            self.commands.push(zigzag_encode(x.wrapping_sub(self.cursor.0)));
            self.commands.push(zigzag_encode(y.wrapping_sub(self.cursor.1)));
            self.cursor = (x, y);
        }
    }
}

fn to_proto_value(value: &PropertyValue) -> proto::Value {
    let mut out = proto::Value::default();
    match value {
        PropertyValue::Bool(b) => out.bool_value = Some(*b),
        PropertyValue::Int(i) if *i < 0 => out.sint_value = Some(*i),
        PropertyValue::Int(i) => out.uint_value = Some(*i as u64),
        PropertyValue::UInt(u) => out.uint_value = Some(*u),
        PropertyValue::Double(d) => out.double_value = Some(*d),
        PropertyValue::String(s) => out.string_value = Some(s.clone()),
    }
    out
}

/// Builder for one layer. Keys and values are interned so features share
/// the layer's tables.
pub struct LayerBuilder {
    layer: proto::Layer,
    key_index: HashMap<String, u32>,
    value_index: HashMap<String, u32>,
}

impl LayerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            layer: proto::Layer {
                version: 2,
                name: name.into(),
                features: Vec::new(),
                keys: Vec::new(),
                values: Vec::new(),
                extent: Some(4096),
            },
            key_index: HashMap::new(),
            value_index: HashMap::new(),
        }
    }

    pub fn with_extent(mut self, extent: u32) -> Self {
        self.layer.extent = Some(extent);
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.layer.version = version;
        self
    }

    pub fn extent(&self) -> u32 {
        self.layer.extent.unwrap_or(4096)
    }

    pub fn add_point(&mut self, id: Option<u64>, x: i32, y: i32, properties: &[(&str, PropertyValue)]) -> &mut Self {
        let mut stream = StreamWriter::default();
        stream.move_to(&[(x, y)]);
        self.push(id, GeomType::Point, stream.commands, properties)
    }

    pub fn add_line_string(
        &mut self,
        id: Option<u64>,
        points: &[(i32, i32)],
        properties: &[(&str, PropertyValue)],
    ) -> &mut Self {
        let mut stream = StreamWriter::default();
        if let Some((first, rest)) = points.split_first() {
            stream.move_to(&[*first]);
            stream.line_to(rest);
        }
        self.push(id, GeomType::Linestring, stream.commands, properties)
    }

    /// Add a polygon. The first ring is the exterior and must wind clockwise
    /// in tile space (positive area), the rest are holes and wind the other
    /// way. Rings are given without a repeated closing point.
    pub fn add_polygon(
        &mut self,
        id: Option<u64>,
        rings: &[Vec<(i32, i32)>],
        properties: &[(&str, PropertyValue)],
    ) -> &mut Self {
        let mut stream = StreamWriter::default();
        for ring in rings {
            if let Some((first, rest)) = ring.split_first() {
                stream.move_to(&[*first]);
                stream.line_to(rest);
                stream.close_path();
            }
        }
        self.push(id, GeomType::Polygon, stream.commands, properties)
    }

    /// Add a hand-built feature as is. Tags must already index this layer's
    /// tables.
    pub fn add_raw(&mut self, feature: proto::Feature) -> &mut Self {
        self.layer.features.push(feature);
        self
    }

    pub fn build(self) -> proto::Layer {
        self.layer
    }

    fn push(
        &mut self,
        id: Option<u64>,
        geom_type: GeomType,
        geometry: Vec<u32>,
        properties: &[(&str, PropertyValue)],
    ) -> &mut Self {
        let mut tags = Vec::with_capacity(properties.len() * 2);
        for (key, value) in properties {
            tags.push(self.intern_key(key));
            tags.push(self.intern_value(value));
        }

        self.layer.features.push(proto::Feature {
            id,
            tags,
            r#type: Some(geom_type as i32),
            geometry,
        });
        self
    }

    fn intern_key(&mut self, key: &str) -> u32 {
        if let Some(&index) = self.key_index.get(key) {
            return index;
        }
        let index = self.layer.keys.len() as u32;
        self.layer.keys.push(key.to_string());
        self.key_index.insert(key.to_string(), index);
        index
    }

    fn intern_value(&mut self, value: &PropertyValue) -> u32 {
        // Debug output keeps the variant, so 1 and 1.0 stay distinct
        let lookup = format!("{:?}", value);
        if let Some(&index) = self.value_index.get(&lookup) {
            return index;
        }
        let index = self.layer.values.len() as u32;
        self.layer.values.push(to_proto_value(value));
        self.value_index.insert(lookup, index);
        index
    }
}

#[derive(Default)]
pub struct TileBuilder {
    tile: proto::Tile,
}

impl TileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(mut self, layer: LayerBuilder) -> Self {
        self.tile.layers.push(layer.build());
        self
    }

    pub fn raw_layer(mut self, layer: proto::Layer) -> Self {
        self.tile.layers.push(layer);
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        self.tile.encode_to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{decode_paths, zigzag};

    #[test]
    fn test_zigzag_encode_inverts_decode() {
        for n in [0, 1, -1, 2, -2, 4095, -4096, i32::MAX, i32::MIN] {
            assert_eq!(zigzag(zigzag_encode(n)), n);
        }
    }

    #[test]
    fn test_line_stream_matches_reference_example() {
        let mut layer = LayerBuilder::new("lines");
        layer.add_line_string(None, &[(2, 2), (2, 10), (10, 10)], &[]);
        let layer = layer.build();

        assert_eq!(layer.features[0].geometry, vec![9, 4, 4, 18, 0, 16, 16, 0]);
    }

    #[test]
    fn test_polygon_cursor_carries_between_rings() {
        let mut layer = LayerBuilder::new("polys");
        layer.add_polygon(
            None,
            &[vec![(0, 0), (10, 0), (10, 10), (0, 10)], vec![(2, 2), (2, 8), (8, 8), (8, 2)]],
            &[],
        );
        let layer = layer.build();
        let paths = decode_paths(&layer.features[0].geometry).unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1].points[0], (2, 2));
        assert!(paths.iter().all(|p| p.closed));
    }

    #[test]
    fn test_keys_and_values_are_interned() {
        let mut layer = LayerBuilder::new("poi");
        layer
            .add_point(Some(1), 1, 1, &[("class", "cafe".into()), ("rank", PropertyValue::Int(1))])
            .add_point(Some(2), 2, 2, &[("class", "cafe".into()), ("rank", PropertyValue::Double(1.0))]);
        let layer = layer.build();

        assert_eq!(layer.keys, vec!["class".to_string(), "rank".to_string()]);
        assert_eq!(layer.values.len(), 3);
        assert_eq!(layer.features[0].tags, vec![0, 0, 1, 1]);
        assert_eq!(layer.features[1].tags, vec![0, 0, 1, 2]);
    }
}
