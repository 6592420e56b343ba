use earshot_core::models::{Coordinate, FeatureGeometry, PolygonRings, SpatialFeature, TileCoordinate};
use geo::algorithm::contains::Contains;

use crate::models::{to_geo_point, to_geo_polygon};
use crate::ruler::{PointDistanceBearing, Ruler};

/// Distance from `location` to the nearest part of `geometry`.
///
/// Polygons containing the location report zero with the location itself as
/// the nearest point. Returns `None` for geometries without vertices.
pub fn geometry_distance(
    ruler: &dyn Ruler,
    location: &Coordinate,
    geometry: &FeatureGeometry,
) -> Option<PointDistanceBearing> {
    match geometry {
        FeatureGeometry::Point { coordinate } => Some(point_distance(ruler, location, coordinate)),
        FeatureGeometry::MultiPoint { points } => {
            nearest(points.iter().map(|p| Some(point_distance(ruler, location, p))))
        }
        FeatureGeometry::LineString { coordinates } => {
            ruler.distance_to_line_string(location, coordinates).ok()
        }
        FeatureGeometry::MultiLineString { lines } => nearest(
            lines.iter().map(|line| ruler.distance_to_line_string(location, line).ok()),
        ),
        FeatureGeometry::Polygon { polygon } => polygon_distance(ruler, location, polygon),
        FeatureGeometry::MultiPolygon { polygons } => {
            nearest(polygons.iter().map(|p| polygon_distance(ruler, location, p)))
        }
    }
}

pub fn feature_distance(
    ruler: &dyn Ruler,
    location: &Coordinate,
    feature: &SpatialFeature,
) -> Option<PointDistanceBearing> {
    geometry_distance(ruler, location, &feature.geometry)
}

/// Whether any part of `feature` lies within `radius` meters of `location`
pub fn within_radius(
    ruler: &dyn Ruler,
    location: &Coordinate,
    feature: &SpatialFeature,
    radius: f64,
) -> bool {
    feature_distance(ruler, location, feature).is_some_and(|d| d.distance <= radius)
}

/// Whether the circle of `radius` meters around `location` touches `tile`
pub fn tile_within_radius(
    ruler: &dyn Ruler,
    location: &Coordinate,
    tile: &TileCoordinate,
    radius: f64,
) -> bool {
    let bounds = tile.bounds();
    if bounds.contains(location) {
        return true;
    }
    ruler.distance(location, &bounds.clamp(location)) <= radius
}

fn point_distance(ruler: &dyn Ruler, location: &Coordinate, point: &Coordinate) -> PointDistanceBearing {
    PointDistanceBearing {
        point: *point,
        distance: ruler.distance(location, point),
        bearing: ruler.bearing(location, point),
    }
}

fn polygon_distance(
    ruler: &dyn Ruler,
    location: &Coordinate,
    polygon: &PolygonRings,
) -> Option<PointDistanceBearing> {
    if polygon.exterior.is_empty() {
        return None;
    }
    if to_geo_polygon(polygon).contains(&to_geo_point(location)) {
        return Some(PointDistanceBearing { point: *location, distance: 0.0, bearing: 0.0 });
    }

    // Outside, or inside a hole: the nearest boundary may be any ring
    nearest(
        std::iter::once(&polygon.exterior)
            .chain(polygon.interiors.iter())
            .map(|ring| ruler.distance_to_line_string(location, ring).ok()),
    )
}

fn nearest(
    candidates: impl Iterator<Item = Option<PointDistanceBearing>>,
) -> Option<PointDistanceBearing> {
    candidates.flatten().min_by(|a, b| a.distance.total_cmp(&b.distance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CheapRuler;
    use earshot_core::models::FeatureKind;

    fn block() -> PolygonRings {
        PolygonRings::with_interiors(
            vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(0.01, 0.0),
                Coordinate::new(0.01, 0.01),
                Coordinate::new(0.0, 0.01),
                Coordinate::new(0.0, 0.0),
            ],
            vec![vec![
                Coordinate::new(0.004, 0.004),
                Coordinate::new(0.006, 0.004),
                Coordinate::new(0.006, 0.006),
                Coordinate::new(0.004, 0.006),
                Coordinate::new(0.004, 0.004),
            ]],
        )
    }

    #[test]
    fn test_inside_polygon_is_zero() {
        let ruler = CheapRuler::new(0.0);
        let geom = FeatureGeometry::Polygon { polygon: block() };
        let inside = Coordinate::new(0.002, 0.002);

        let d = geometry_distance(&ruler, &inside, &geom).unwrap();
        assert_eq!(d.distance, 0.0);
        assert_eq!(d.point, inside);
    }

    #[test]
    fn test_inside_hole_measures_to_hole_ring() {
        let ruler = CheapRuler::new(0.0);
        let geom = FeatureGeometry::Polygon { polygon: block() };
        let in_hole = Coordinate::new(0.005, 0.0055);

        let d = geometry_distance(&ruler, &in_hole, &geom).unwrap();
        let expected = ruler.distance(&in_hole, &Coordinate::new(0.005, 0.006));
        assert!((d.distance - expected).abs() < 1e-6);
    }

    #[test]
    fn test_outside_polygon_measures_to_edge() {
        let ruler = CheapRuler::new(0.0);
        let geom = FeatureGeometry::Polygon { polygon: block() };
        let outside = Coordinate::new(0.005, -0.001);

        let d = geometry_distance(&ruler, &outside, &geom).unwrap();
        assert!((d.point.latitude).abs() < 1e-12);
        assert!((d.distance - 110.6).abs() < 1.0);
    }

    #[test]
    fn test_multi_point_picks_nearest() {
        let ruler = CheapRuler::new(0.0);
        let geom = FeatureGeometry::MultiPoint {
            points: vec![Coordinate::new(1.0, 1.0), Coordinate::new(0.001, 0.0)],
        };
        let d = geometry_distance(&ruler, &Coordinate::new(0.0, 0.0), &geom).unwrap();
        assert_eq!(d.point, Coordinate::new(0.001, 0.0));
    }

    #[test]
    fn test_empty_geometry_has_no_distance() {
        let ruler = CheapRuler::new(0.0);
        let geom = FeatureGeometry::MultiLineString { lines: vec![] };
        assert!(geometry_distance(&ruler, &Coordinate::default(), &geom).is_none());
        assert!(geometry_distance(&ruler, &Coordinate::default(), &FeatureGeometry::polygon(vec![])).is_none());
    }

    #[test]
    fn test_within_radius() {
        let ruler = CheapRuler::new(0.0);
        let feature = SpatialFeature::new(
            FeatureGeometry::line_string(vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.01)]),
            FeatureKind::Road,
        );
        let p = Coordinate::new(0.0005, 0.005);

        assert!(within_radius(&ruler, &p, &feature, 60.0));
        assert!(!within_radius(&ruler, &p, &feature, 50.0));
    }

    #[test]
    fn test_tile_within_radius() {
        let ruler = CheapRuler::new(55.86);
        let location = Coordinate::new(-4.2518, 55.8642);
        let home = TileCoordinate::containing(&location, 16);
        let far = TileCoordinate::new(home.x + 5, home.y, 16);

        assert!(tile_within_radius(&ruler, &location, &home, 0.0));
        assert!(!tile_within_radius(&ruler, &location, &far, 100.0));
        assert!(tile_within_radius(&ruler, &location, &far, 5_000.0));
    }
}
