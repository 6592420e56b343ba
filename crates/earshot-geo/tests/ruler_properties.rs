//! Property tests shared by every ruler

use earshot_core::config::RulerKind;
use earshot_core::models::Coordinate;
use earshot_geo::{build_ruler, Ruler};
use proptest::prelude::*;

fn coordinate() -> impl Strategy<Value = Coordinate> {
    (-179.0f64..179.0, -80.0f64..80.0).prop_map(|(lon, lat)| Coordinate::new(lon, lat))
}

/// A point within roughly a kilometer of `origin`
fn nearby(origin: Coordinate) -> impl Strategy<Value = Coordinate> {
    (-0.01f64..0.01, -0.01f64..0.01)
        .prop_map(move |(dx, dy)| Coordinate::new(origin.longitude + dx, origin.latitude + dy))
}

fn ruler_kind() -> impl Strategy<Value = RulerKind> {
    prop_oneof![Just(RulerKind::Cheap), Just(RulerKind::Haversine)]
}

proptest! {
    #[test]
    fn distance_is_symmetric(kind in ruler_kind(), a in coordinate(), b in coordinate()) {
        let ruler = build_ruler(kind, a.latitude);
        let ab = ruler.distance(&a, &b);
        let ba = ruler.distance(&b, &a);
        prop_assert!((ab - ba).abs() <= 1e-9 * ab.max(1.0));
    }

    #[test]
    fn distance_to_self_is_zero(kind in ruler_kind(), a in coordinate()) {
        let ruler = build_ruler(kind, a.latitude);
        prop_assert_eq!(ruler.distance(&a, &a), 0.0);
    }

    #[test]
    fn destination_round_trips(
        kind in ruler_kind(),
        p in coordinate(),
        dist in 0.0f64..5_000.0,
        bearing in 0.0f64..360.0,
    ) {
        let ruler = build_ruler(kind, p.latitude);
        let q = ruler.destination(&p, dist, bearing);
        let back = ruler.distance(&p, &q);
        prop_assert!((back - dist).abs() <= 1e-6 * dist + 1e-6, "{} vs {}", back, dist);
    }

    #[test]
    fn bearing_is_in_range(kind in ruler_kind(), a in coordinate(), b in coordinate()) {
        let ruler = build_ruler(kind, a.latitude);
        let bearing = ruler.bearing(&a, &b);
        prop_assert!((0.0..360.0).contains(&bearing), "bearing {}", bearing);
    }

    #[test]
    fn along_hits_both_ends(
        kind in ruler_kind(),
        (start, rest) in coordinate().prop_flat_map(|start| {
            (Just(start), prop::collection::vec(nearby(start), 1..6))
        }),
    ) {
        let ruler = build_ruler(kind, start.latitude);
        let mut line = vec![start];
        line.extend(rest);

        let length = ruler.line_length(&line);
        prop_assert_eq!(ruler.along(&line, 0.0).unwrap(), line[0]);
        prop_assert_eq!(ruler.along(&line, length).unwrap(), *line.last().unwrap());
    }

    #[test]
    fn nearest_point_is_no_farther_than_vertices(
        kind in ruler_kind(),
        (p, line) in coordinate().prop_flat_map(|origin| {
            (nearby(origin), prop::collection::vec(nearby(origin), 2..6))
        }),
    ) {
        let ruler = build_ruler(kind, p.latitude);
        let nearest = ruler.distance_to_line_string(&p, &line).unwrap();

        for vertex in &line {
            prop_assert!(nearest.distance <= ruler.distance(&p, vertex) + 1e-6);
        }
        prop_assert!((nearest.distance - ruler.distance(&p, &nearest.point)).abs() < 1e-9);
    }
}

#[test]
fn rulers_agree_over_short_distances() {
    let cheap = build_ruler(RulerKind::Cheap, 55.86);
    let haversine = build_ruler(RulerKind::Haversine, 55.86);
    let a = Coordinate::new(-4.2518, 55.8642);
    let b = Coordinate::new(-4.2400, 55.8700);

    let dc = cheap.distance(&a, &b);
    let dh = haversine.distance(&a, &b);
    // The cheap ruler follows the ellipsoid, the haversine one a sphere
    assert!((dc - dh).abs() / dh < 0.005, "cheap {} haversine {}", dc, dh);
    assert!((cheap.bearing(&a, &b) - haversine.bearing(&a, &b)).abs() < 1.0);
}
