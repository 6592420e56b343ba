//! Feature geometry in world coordinates.
//!
//! These types mirror the geometry kinds a vector tile can carry and map
//! one-to-one onto GeoJSON geometry types at the interchange boundary.

use serde::{Deserialize, Serialize};

use crate::models::Coordinate;

/// Geometry type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
}

impl GeometryType {
    /// The matching GeoJSON `type` member
    pub fn geojson_type(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::LineString => "LineString",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPolygon => "MultiPolygon",
        }
    }
}

/// A polygon as an exterior ring plus holes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolygonRings {
    pub exterior: Vec<Coordinate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interiors: Vec<Vec<Coordinate>>,
}

impl PolygonRings {
    pub fn new(exterior: Vec<Coordinate>) -> Self {
        Self { exterior, interiors: Vec::new() }
    }

    pub fn with_interiors(exterior: Vec<Coordinate>, interiors: Vec<Vec<Coordinate>>) -> Self {
        Self { exterior, interiors }
    }

    /// Vertex average of the exterior ring, ignoring the closing vertex
    fn center(&self) -> Option<Coordinate> {
        let ring = &self.exterior;
        let count = match ring.len() {
            0 => return None,
            n if n > 1 && ring.first() == ring.last() => n - 1,
            n => n,
        };
        let (lon, lat) = ring[..count]
            .iter()
            .fold((0.0, 0.0), |(lon, lat), c| (lon + c.longitude, lat + c.latitude));
        Some(Coordinate::new(lon / count as f64, lat / count as f64))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeatureGeometry {
    Point { coordinate: Coordinate },
    MultiPoint { points: Vec<Coordinate> },
    LineString { coordinates: Vec<Coordinate> },
    MultiLineString { lines: Vec<Vec<Coordinate>> },
    Polygon { polygon: PolygonRings },
    MultiPolygon { polygons: Vec<PolygonRings> },
}

impl FeatureGeometry {
    /// Create a Point geometry
    pub fn point(longitude: f64, latitude: f64) -> Self {
        FeatureGeometry::Point { coordinate: Coordinate::new(longitude, latitude) }
    }

    /// Create a LineString geometry
    pub fn line_string(coordinates: Vec<Coordinate>) -> Self {
        FeatureGeometry::LineString { coordinates }
    }

    /// Create a Polygon geometry without holes
    pub fn polygon(exterior: Vec<Coordinate>) -> Self {
        FeatureGeometry::Polygon { polygon: PolygonRings::new(exterior) }
    }

    pub fn geometry_type(&self) -> GeometryType {
        match self {
            FeatureGeometry::Point { .. } => GeometryType::Point,
            FeatureGeometry::MultiPoint { .. } => GeometryType::MultiPoint,
            FeatureGeometry::LineString { .. } => GeometryType::LineString,
            FeatureGeometry::MultiLineString { .. } => GeometryType::MultiLineString,
            FeatureGeometry::Polygon { .. } => GeometryType::Polygon,
            FeatureGeometry::MultiPolygon { .. } => GeometryType::MultiPolygon,
        }
    }

    /// Every vertex of the geometry, holes included
    pub fn all_coordinates(&self) -> Vec<Coordinate> {
        match self {
            FeatureGeometry::Point { coordinate } => vec![*coordinate],
            FeatureGeometry::MultiPoint { points } => points.clone(),
            FeatureGeometry::LineString { coordinates } => coordinates.clone(),
            FeatureGeometry::MultiLineString { lines } => lines.iter().flatten().copied().collect(),
            FeatureGeometry::Polygon { polygon } => polygon_coordinates(polygon).collect(),
            FeatureGeometry::MultiPolygon { polygons } => {
                polygons.iter().flat_map(polygon_coordinates).collect()
            }
        }
    }

    pub fn first_coordinate(&self) -> Option<Coordinate> {
        match self {
            FeatureGeometry::Point { coordinate } => Some(*coordinate),
            FeatureGeometry::MultiPoint { points } => points.first().copied(),
            FeatureGeometry::LineString { coordinates } => coordinates.first().copied(),
            FeatureGeometry::MultiLineString { lines } => {
                lines.first().and_then(|line| line.first()).copied()
            }
            FeatureGeometry::Polygon { polygon } => polygon.exterior.first().copied(),
            FeatureGeometry::MultiPolygon { polygons } => {
                polygons.first().and_then(|p| p.exterior.first()).copied()
            }
        }
    }

    /// Representative point used for sorting and labelling.
    ///
    /// Lines use their middle vertex, polygons the vertex average of the
    /// exterior ring, multi-geometries their first part.
    pub fn center(&self) -> Option<Coordinate> {
        match self {
            FeatureGeometry::Point { coordinate } => Some(*coordinate),
            FeatureGeometry::MultiPoint { points } => match points.len() {
                0 => None,
                n => {
                    let (lon, lat) = points
                        .iter()
                        .fold((0.0, 0.0), |(lon, lat), c| (lon + c.longitude, lat + c.latitude));
                    Some(Coordinate::new(lon / n as f64, lat / n as f64))
                }
            },
            FeatureGeometry::LineString { coordinates } => {
                coordinates.get(coordinates.len() / 2).copied()
            }
            FeatureGeometry::MultiLineString { lines } => {
                lines.first().and_then(|line| line.get(line.len() / 2)).copied()
            }
            FeatureGeometry::Polygon { polygon } => polygon.center(),
            FeatureGeometry::MultiPolygon { polygons } => {
                polygons.first().and_then(PolygonRings::center)
            }
        }
    }

    /// True for a Point, or a MultiPoint with at most one member
    pub fn is_point_like(&self) -> bool {
        match self {
            FeatureGeometry::Point { .. } => true,
            FeatureGeometry::MultiPoint { points } => points.len() <= 1,
            _ => false,
        }
    }

    /// Vertex closest to `location` by squared degrees.
    ///
    /// Cheap and approximate, it never looks between vertices. Polygons only
    /// consider their exterior rings.
    pub fn nearest_vertex_to(&self, location: &Coordinate) -> Option<Coordinate> {
        match self {
            FeatureGeometry::Point { coordinate } => Some(*coordinate),
            FeatureGeometry::MultiPoint { points } => closest_vertex(points.iter(), location),
            FeatureGeometry::LineString { coordinates } => closest_vertex(coordinates.iter(), location),
            FeatureGeometry::MultiLineString { lines } => closest_vertex(lines.iter().flatten(), location),
            FeatureGeometry::Polygon { polygon } => closest_vertex(polygon.exterior.iter(), location),
            FeatureGeometry::MultiPolygon { polygons } => {
                closest_vertex(polygons.iter().flat_map(|p| p.exterior.iter()), location)
            }
        }
    }
}

fn closest_vertex<'a>(
    coords: impl Iterator<Item = &'a Coordinate>,
    location: &Coordinate,
) -> Option<Coordinate> {
    coords
        .min_by(|a, b| a.squared_degrees_to(location).total_cmp(&b.squared_degrees_to(location)))
        .copied()
}

fn polygon_coordinates(polygon: &PolygonRings) -> impl Iterator<Item = Coordinate> + '_ {
    polygon.exterior.iter().chain(polygon.interiors.iter().flatten()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(2.0, 0.0),
            Coordinate::new(2.0, 2.0),
            Coordinate::new(0.0, 2.0),
            Coordinate::new(0.0, 0.0),
        ]
    }

    #[test]
    fn test_polygon_center_skips_closing_vertex() {
        let center = FeatureGeometry::polygon(square()).center().unwrap();
        assert!((center.longitude - 1.0).abs() < 1e-12);
        assert!((center.latitude - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_line_center_is_middle_vertex() {
        let line = FeatureGeometry::line_string(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 0.0),
            Coordinate::new(5.0, 0.0),
        ]);
        assert_eq!(line.center(), Some(Coordinate::new(1.0, 0.0)));
    }

    #[test]
    fn test_empty_geometry_has_no_center() {
        assert_eq!(FeatureGeometry::line_string(vec![]).center(), None);
        assert_eq!(FeatureGeometry::MultiPoint { points: vec![] }.first_coordinate(), None);
    }

    #[test]
    fn test_all_coordinates_includes_holes() {
        let hole = vec![
            Coordinate::new(0.5, 0.5),
            Coordinate::new(1.0, 0.5),
            Coordinate::new(0.5, 1.0),
            Coordinate::new(0.5, 0.5),
        ];
        let geom = FeatureGeometry::Polygon {
            polygon: PolygonRings::with_interiors(square(), vec![hole]),
        };
        assert_eq!(geom.all_coordinates().len(), 9);
    }

    #[test]
    fn test_nearest_vertex() {
        let line = FeatureGeometry::line_string(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 1.0),
            Coordinate::new(2.0, 2.0),
        ]);
        let nearest = line.nearest_vertex_to(&Coordinate::new(1.9, 2.2));
        assert_eq!(nearest, Some(Coordinate::new(2.0, 2.0)));
    }

    #[test]
    fn test_point_like() {
        assert!(FeatureGeometry::point(1.0, 1.0).is_point_like());
        assert!(FeatureGeometry::MultiPoint { points: vec![Coordinate::new(1.0, 1.0)] }
            .is_point_like());
        assert!(!FeatureGeometry::line_string(vec![]).is_point_like());
    }

    #[test]
    fn test_geometry_serialization() {
        let point = FeatureGeometry::point(-4.25, 55.86);
        let json = serde_json::to_string(&point).unwrap();
        assert!(json.contains("Point"));

        let parsed: FeatureGeometry = serde_json::from_str(&json).unwrap();
        assert_eq!(point, parsed);
    }
}
