//! R-tree index over the features of one decoded tile.
//!
//! Each feature is indexed by its bounding box. Queries narrow the candidates
//! through the tree and then confirm each one against the exact geometry, so
//! results never depend on how loose a bounding box is.

use std::sync::Arc;

use earshot_core::models::{Coordinate, FeatureGeometry, FeatureList, SpatialFeature};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::algorithm::intersects::Intersects;
use rstar::{RTree, RTreeObject, AABB};

use crate::haversine::EARTH_RADIUS;
use crate::models::{to_geo_geometry, to_geo_point, to_geo_polygon};
use crate::ruler::{PointDistanceBearing, Ruler};
use crate::spatial::feature_distance;

/// Widening of the spherical search square. Ellipsoidal rulers measure up to
/// about 0.6% fewer meters per degree than the sphere.
const SEARCH_MARGIN: f64 = 1.1;

/// A feature together with its nearest point to a query location
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyFeature {
    pub feature: Arc<SpatialFeature>,
    pub nearest: PointDistanceBearing,
}

/// A triangle in world coordinates, usually a field of view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub origin: Coordinate,
    pub left: Coordinate,
    pub right: Coordinate,
}

impl Triangle {
    pub fn new(origin: Coordinate, left: Coordinate, right: Coordinate) -> Self {
        Self { origin, left, right }
    }

    /// What can be seen from `origin` facing `heading`: `angle` degrees wide
    /// and `distance` meters deep
    pub fn field_of_view(
        ruler: &dyn Ruler,
        origin: &Coordinate,
        heading: f64,
        angle: f64,
        distance: f64,
    ) -> Self {
        let half = angle / 2.0;
        Self {
            origin: *origin,
            left: ruler.destination(origin, distance, (heading - half).rem_euclid(360.0)),
            right: ruler.destination(origin, distance, (heading + half).rem_euclid(360.0)),
        }
    }

    fn corners(&self) -> [[f64; 2]; 3] {
        [self.origin, self.left, self.right].map(|c| [c.longitude, c.latitude])
    }

    fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_points(self.corners().iter())
    }

    fn to_geo(&self) -> geo::Geometry {
        let ring: Vec<(f64, f64)> = self.corners().iter().map(|&[x, y]| (x, y)).collect();
        geo::Geometry::Polygon(geo::Polygon::new(geo::LineString::from(ring), vec![]))
    }
}

/// Position of a feature in the tile's list and its bounding box
#[derive(Debug, Clone, PartialEq)]
struct IndexedFeature {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index over an immutable feature list.
///
/// Results come back in list order unless a query says otherwise. Features
/// without any coordinates are kept in the list but never match a query.
pub struct FeatureIndex {
    features: FeatureList,
    tree: RTree<IndexedFeature>,
}

impl FeatureIndex {
    pub fn new(features: FeatureList) -> Self {
        let entries: Vec<IndexedFeature> = features
            .iter()
            .enumerate()
            .filter_map(|(position, feature)| {
                envelope_of(&feature.geometry).map(|envelope| IndexedFeature { position, envelope })
            })
            .collect();

        Self { tree: RTree::bulk_load(entries), features }
    }

    pub fn features(&self) -> &FeatureList {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Every feature with any part within `radius` meters of `location`
    pub fn within(&self, ruler: &dyn Ruler, location: &Coordinate, radius: f64) -> Vec<NearbyFeature> {
        self.candidates(&search_square(location, radius))
            .filter_map(|feature| {
                let nearest = feature_distance(ruler, location, feature)?;
                (nearest.distance <= radius).then(|| NearbyFeature { feature: Arc::clone(feature), nearest })
            })
            .collect()
    }

    /// Up to `max_count` features within `radius`, nearest first
    pub fn nearest(
        &self,
        ruler: &dyn Ruler,
        location: &Coordinate,
        radius: f64,
        max_count: usize,
    ) -> Vec<NearbyFeature> {
        let mut found = self.within(ruler, location, radius);
        sort_by_distance(&mut found);
        found.truncate(max_count);
        found
    }

    /// The single nearest feature within `radius`
    pub fn nearest_feature(
        &self,
        ruler: &dyn Ruler,
        location: &Coordinate,
        radius: f64,
    ) -> Option<NearbyFeature> {
        self.within(ruler, location, radius)
            .into_iter()
            .min_by(|a, b| a.nearest.distance.total_cmp(&b.nearest.distance))
    }

    /// Every feature that overlaps `triangle`, measured from its origin
    pub fn within_triangle(&self, ruler: &dyn Ruler, triangle: &Triangle) -> Vec<NearbyFeature> {
        let area = triangle.to_geo();
        self.candidates(&triangle.envelope())
            .filter(|feature| to_geo_geometry(&feature.geometry).intersects(&area))
            .filter_map(|feature| {
                let nearest = feature_distance(ruler, &triangle.origin, feature)?;
                Some(NearbyFeature { feature: Arc::clone(feature), nearest })
            })
            .collect()
    }

    /// Up to `max_count` features overlapping `triangle`, nearest to its
    /// origin first
    pub fn nearest_within_triangle(
        &self,
        ruler: &dyn Ruler,
        triangle: &Triangle,
        max_count: usize,
    ) -> Vec<NearbyFeature> {
        let mut found = self.within_triangle(ruler, triangle);
        sort_by_distance(&mut found);
        found.truncate(max_count);
        found
    }

    /// Polygon features whose area contains `location`. Points on a ring are
    /// not contained.
    pub fn containing_polygons(&self, location: &Coordinate) -> Vec<Arc<SpatialFeature>> {
        let point = AABB::from_point([location.longitude, location.latitude]);
        self.candidates(&point)
            .filter(|feature| polygon_contains(&feature.geometry, location))
            .cloned()
            .collect()
    }

    /// Features whose bounding box touches `envelope`, in list order
    fn candidates(&self, envelope: &AABB<[f64; 2]>) -> impl Iterator<Item = &Arc<SpatialFeature>> {
        let mut positions: Vec<usize> =
            self.tree.locate_in_envelope_intersecting(envelope).map(|entry| entry.position).collect();
        positions.sort_unstable();
        positions.into_iter().filter_map(move |position| self.features.get(position))
    }
}

impl std::fmt::Debug for FeatureIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureIndex")
            .field("features", &self.features.len())
            .field("indexed", &self.tree.size())
            .finish()
    }
}

/// Stable so equally distant features keep list order
pub fn sort_by_distance(found: &mut [NearbyFeature]) {
    found.sort_by(|a, b| a.nearest.distance.total_cmp(&b.nearest.distance));
}

fn envelope_of(geometry: &FeatureGeometry) -> Option<AABB<[f64; 2]>> {
    let rect = to_geo_geometry(geometry).bounding_rect()?;
    Some(AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

/// Degree box holding every point within `radius` meters of `location`.
///
/// Longitudes widen to the whole world near the poles and when the box would
/// cross the antimeridian.
fn search_square(location: &Coordinate, radius: f64) -> AABB<[f64; 2]> {
    let lat_offset = (radius * SEARCH_MARGIN / EARTH_RADIUS).to_degrees();
    let south = (location.latitude - lat_offset).max(-90.0);
    let north = (location.latitude + lat_offset).min(90.0);

    // Degrees of longitude are narrowest at the latitude furthest from the equator
    let widest = south.abs().max(north.abs()).to_radians().cos();
    let lng_offset = lat_offset / widest;
    let (west, east) = if !lng_offset.is_finite()
        || location.longitude - lng_offset < -180.0
        || location.longitude + lng_offset > 180.0
    {
        (-180.0, 180.0)
    } else {
        (location.longitude - lng_offset, location.longitude + lng_offset)
    };

    AABB::from_corners([west, south], [east, north])
}

fn polygon_contains(geometry: &FeatureGeometry, location: &Coordinate) -> bool {
    let point = to_geo_point(location);
    match geometry {
        FeatureGeometry::Polygon { polygon } => to_geo_polygon(polygon).contains(&point),
        FeatureGeometry::MultiPolygon { polygons } => {
            polygons.iter().any(|polygon| to_geo_polygon(polygon).contains(&point))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CheapRuler, HaversineRuler};
    use earshot_core::models::{FeatureKind, PolygonRings};

    const ORIGIN: Coordinate = Coordinate::new(-4.2518, 55.8642);

    fn poi(ruler: &dyn Ruler, id: u64, meters: f64, bearing: f64) -> SpatialFeature {
        let at = ruler.destination(&ORIGIN, meters, bearing);
        SpatialFeature::new(FeatureGeometry::Point { coordinate: at }, FeatureKind::Poi).with_external_id(id)
    }

    fn square(ruler: &dyn Ruler, id: u64, center: &Coordinate, half_side: f64) -> SpatialFeature {
        let north = ruler.destination(center, half_side, 0.0).latitude;
        let south = ruler.destination(center, half_side, 180.0).latitude;
        let east = ruler.destination(center, half_side, 90.0).longitude;
        let west = ruler.destination(center, half_side, 270.0).longitude;
        let ring = vec![
            Coordinate::new(west, south),
            Coordinate::new(east, south),
            Coordinate::new(east, north),
            Coordinate::new(west, north),
            Coordinate::new(west, south),
        ];
        SpatialFeature::new(FeatureGeometry::Polygon { polygon: PolygonRings::new(ring) }, FeatureKind::Building)
            .with_external_id(id)
    }

    fn ids(found: &[NearbyFeature]) -> Vec<u64> {
        found.iter().filter_map(|hit| hit.feature.external_id).collect()
    }

    fn index_of(features: Vec<SpatialFeature>) -> FeatureIndex {
        FeatureIndex::new(features.into_iter().collect())
    }

    #[test]
    fn test_within_matches_exhaustive_scan() {
        let ruler = CheapRuler::new(ORIGIN.latitude);
        let features: Vec<SpatialFeature> = (0..36u64)
            .map(|i| poi(&ruler, i, 10.0 + i as f64 * 7.0, i as f64 * 37.0 % 360.0))
            .collect();
        let index = index_of(features.clone());

        for radius in [0.0, 50.0, 99.0, 150.0, 400.0] {
            let expected: Vec<u64> = features
                .iter()
                .filter(|f| crate::spatial::within_radius(&ruler, &ORIGIN, f, radius))
                .filter_map(|f| f.external_id)
                .collect();
            assert_eq!(ids(&index.within(&ruler, &ORIGIN, radius)), expected, "radius {}", radius);
        }
    }

    #[test]
    fn test_within_keeps_features_at_the_edge() {
        // The cheap ruler packs more degrees into a meter than the sphere does
        let ruler = CheapRuler::new(0.0);
        let equator = Coordinate::new(10.0, 0.0);
        let edge = ruler.destination(&equator, 999.9, 0.0);
        let index = index_of(vec![SpatialFeature::new(
            FeatureGeometry::Point { coordinate: edge },
            FeatureKind::Poi,
        )]);

        assert_eq!(index.within(&ruler, &equator, 1000.0).len(), 1);
    }

    #[test]
    fn test_nearest_is_sorted_and_capped() {
        let ruler = HaversineRuler;
        let index = index_of(vec![
            poi(&ruler, 1, 80.0, 0.0),
            poi(&ruler, 2, 20.0, 90.0),
            poi(&ruler, 3, 50.0, 180.0),
            poi(&ruler, 4, 500.0, 270.0),
        ]);

        let found = index.nearest(&ruler, &ORIGIN, 100.0, 2);
        assert_eq!(ids(&found), vec![2, 3]);
        assert!((found[0].nearest.distance - 20.0).abs() < 0.01);

        assert_eq!(ids(&index.nearest(&ruler, &ORIGIN, 100.0, 10)), vec![2, 3, 1]);
        assert!(index.nearest(&ruler, &ORIGIN, 100.0, 0).is_empty());
    }

    #[test]
    fn test_nearest_feature() {
        let ruler = CheapRuler::new(ORIGIN.latitude);
        let index = index_of(vec![poi(&ruler, 1, 40.0, 10.0), poi(&ruler, 2, 30.0, 200.0)]);

        assert_eq!(index.nearest_feature(&ruler, &ORIGIN, 100.0).unwrap().feature.external_id, Some(2));
        assert!(index.nearest_feature(&ruler, &ORIGIN, 25.0).is_none());
    }

    #[test]
    fn test_field_of_view() {
        let ruler = CheapRuler::new(ORIGIN.latitude);
        let index = index_of(vec![
            poi(&ruler, 1, 30.0, 5.0),
            poi(&ruler, 2, 60.0, 350.0),
            poi(&ruler, 3, 20.0, 180.0),
            poi(&ruler, 4, 30.0, 80.0),
        ]);

        // Facing north, 90 degrees wide and 100 meters deep
        let view = Triangle::field_of_view(&ruler, &ORIGIN, 0.0, 90.0, 100.0);
        assert_eq!(ids(&index.within_triangle(&ruler, &view)), vec![1, 2]);
        assert_eq!(ids(&index.nearest_within_triangle(&ruler, &view, 1)), vec![1]);

        let behind = Triangle::field_of_view(&ruler, &ORIGIN, 180.0, 90.0, 100.0);
        assert_eq!(ids(&index.within_triangle(&ruler, &behind)), vec![3]);
    }

    #[test]
    fn test_triangle_catches_line_crossing_it() {
        let ruler = CheapRuler::new(ORIGIN.latitude);
        // A road running east-west 50m ahead, both ends outside the view
        let ahead = ruler.destination(&ORIGIN, 50.0, 0.0);
        let road = SpatialFeature::new(
            FeatureGeometry::line_string(vec![
                ruler.destination(&ahead, 500.0, 270.0),
                ruler.destination(&ahead, 500.0, 90.0),
            ]),
            FeatureKind::Road,
        )
        .with_external_id(9);
        let index = index_of(vec![road]);

        let view = Triangle::field_of_view(&ruler, &ORIGIN, 0.0, 60.0, 100.0);
        let found = index.within_triangle(&ruler, &view);
        assert_eq!(ids(&found), vec![9]);
        assert!((found[0].nearest.distance - 50.0).abs() < 0.5);
    }

    #[test]
    fn test_containing_polygons() {
        let ruler = CheapRuler::new(ORIGIN.latitude);
        let index = index_of(vec![
            square(&ruler, 1, &ORIGIN, 20.0),
            square(&ruler, 2, &ORIGIN, 200.0),
            square(&ruler, 3, &ruler.destination(&ORIGIN, 100.0, 90.0), 20.0),
            poi(&ruler, 4, 0.0, 0.0),
        ]);

        let inside: Vec<u64> = index.containing_polygons(&ORIGIN).iter().filter_map(|f| f.external_id).collect();
        assert_eq!(inside, vec![1, 2]);

        let outside = ruler.destination(&ORIGIN, 1_000.0, 0.0);
        assert!(index.containing_polygons(&outside).is_empty());
    }

    #[test]
    fn test_empty_geometry_is_listed_but_never_found() {
        let ruler = CheapRuler::new(0.0);
        let index = index_of(vec![SpatialFeature::new(
            FeatureGeometry::MultiPoint { points: vec![] },
            FeatureKind::Other,
        )]);

        assert_eq!(index.len(), 1);
        assert!(index.within(&ruler, &Coordinate::default(), 1e7).is_empty());
        assert!(index.containing_polygons(&Coordinate::default()).is_empty());
    }

    #[test]
    fn test_search_square_widens_near_poles_and_antimeridian() {
        let polar = search_square(&Coordinate::new(0.0, 89.999), 1_000.0);
        assert_eq!(polar.lower()[0], -180.0);
        assert_eq!(polar.upper()[1], 90.0);

        let dateline = search_square(&Coordinate::new(179.9999, 0.0), 1_000.0);
        assert_eq!((dateline.lower()[0], dateline.upper()[0]), (-180.0, 180.0));

        let plain = search_square(&ORIGIN, 100.0);
        assert!(plain.lower()[0] > -4.26 && plain.upper()[0] < -4.24);
    }
}
