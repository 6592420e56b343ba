//! Conversions between earshot geometry and the `geo` crate.

use earshot_core::models::{Coordinate, FeatureGeometry, PolygonRings};
use geo::Geometry as GeoGeometry;

pub fn to_geo_point(c: &Coordinate) -> geo::Point {
    geo::Point::new(c.longitude, c.latitude)
}

fn to_geo_line(coords: &[Coordinate]) -> geo::LineString {
    geo::LineString::new(coords.iter().map(|c| geo::Coord { x: c.longitude, y: c.latitude }).collect())
}

pub fn to_geo_polygon(polygon: &PolygonRings) -> geo::Polygon {
    geo::Polygon::new(
        to_geo_line(&polygon.exterior),
        polygon.interiors.iter().map(|ring| to_geo_line(ring)).collect(),
    )
}

/// Convert a feature geometry to a geo::Geometry
pub fn to_geo_geometry(geom: &FeatureGeometry) -> GeoGeometry {
    match geom {
        FeatureGeometry::Point { coordinate } => GeoGeometry::Point(to_geo_point(coordinate)),
        FeatureGeometry::MultiPoint { points } => {
            GeoGeometry::MultiPoint(geo::MultiPoint::new(points.iter().map(to_geo_point).collect()))
        }
        FeatureGeometry::LineString { coordinates } => {
            GeoGeometry::LineString(to_geo_line(coordinates))
        }
        FeatureGeometry::MultiLineString { lines } => GeoGeometry::MultiLineString(
            geo::MultiLineString::new(lines.iter().map(|line| to_geo_line(line)).collect()),
        ),
        FeatureGeometry::Polygon { polygon } => GeoGeometry::Polygon(to_geo_polygon(polygon)),
        FeatureGeometry::MultiPolygon { polygons } => GeoGeometry::MultiPolygon(
            geo::MultiPolygon::new(polygons.iter().map(to_geo_polygon).collect()),
        ),
    }
}

/// Extension trait for FeatureGeometry with geo-crate operations
pub trait GeometryExt {
    /// Convert to geo::Geometry
    fn to_geo(&self) -> GeoGeometry;

    /// Area-weighted centroid, unlike the vertex-based `center()`
    fn centroid(&self) -> Option<Coordinate>;
}

impl GeometryExt for FeatureGeometry {
    fn to_geo(&self) -> GeoGeometry {
        to_geo_geometry(self)
    }

    fn centroid(&self) -> Option<Coordinate> {
        use geo::algorithm::centroid::Centroid;
        self.to_geo().centroid().map(|p| Coordinate::new(p.x(), p.y()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_with_hole_converts() {
        let geom = FeatureGeometry::Polygon {
            polygon: PolygonRings::with_interiors(
                vec![
                    Coordinate::new(0.0, 0.0),
                    Coordinate::new(4.0, 0.0),
                    Coordinate::new(4.0, 4.0),
                    Coordinate::new(0.0, 4.0),
                    Coordinate::new(0.0, 0.0),
                ],
                vec![vec![
                    Coordinate::new(1.0, 1.0),
                    Coordinate::new(2.0, 1.0),
                    Coordinate::new(2.0, 2.0),
                    Coordinate::new(1.0, 1.0),
                ]],
            ),
        };

        match geom.to_geo() {
            GeoGeometry::Polygon(p) => {
                assert_eq!(p.exterior().0.len(), 5);
                assert_eq!(p.interiors().len(), 1);
            }
            other => panic!("Expected Polygon geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_centroid() {
        let geom = FeatureGeometry::polygon(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(2.0, 0.0),
            Coordinate::new(2.0, 2.0),
            Coordinate::new(0.0, 2.0),
            Coordinate::new(0.0, 0.0),
        ]);

        let centroid = geom.centroid().unwrap();
        assert!((centroid.longitude - 1.0).abs() < 1e-10);
        assert!((centroid.latitude - 1.0).abs() < 1e-10);
    }
}
