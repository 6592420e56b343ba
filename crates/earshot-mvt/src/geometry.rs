//! Geometry command stream decoding.
//!
//! A stream is a sequence of command integers (`id | count << 3`) each
//! followed by `count` zig-zag encoded parameter pairs. Coordinates are
//! deltas from the previous cursor position, and the cursor carries over
//! between the parts of one feature.

use earshot_core::models::{Coordinate, FeatureGeometry, PolygonRings, TileCoordinate};

pub(crate) const MOVE_TO: u32 = 1;
pub(crate) const LINE_TO: u32 = 2;
pub(crate) const CLOSE_PATH: u32 = 7;

/// Stream-level failure, turned into a `DecodeError` by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamError {
    Truncated,
    InvalidCommand(u32),
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Path {
    pub points: Vec<(i32, i32)>,
    pub closed: bool,
}

pub(crate) fn zigzag(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Split a command stream into paths of absolute tile-local positions
pub(crate) fn decode_paths(stream: &[u32]) -> Result<Vec<Path>, StreamError> {
    let mut paths = Vec::new();
    let mut current: Option<Path> = None;
    let (mut x, mut y) = (0i32, 0i32);
    let mut i = 0;

    let next_point = |i: &mut usize, x: &mut i32, y: &mut i32| -> Result<(i32, i32), StreamError> {
        let (dx, dy) = match stream.get(*i..*i + 2) {
            Some(&[dx, dy]) => (zigzag(dx), zigzag(dy)),
            _ => return Err(StreamError::Truncated),
        };
        *i += 2;
        *x = x.wrapping_add(dx);
        *y = y.wrapping_add(dy);
        Ok((*x, *y))
    };

    while i < stream.len() {
        let header = stream[i];
        i += 1;
        let count = header >> 3;

        match header & 0x7 {
            MOVE_TO => {
                for _ in 0..count {
                    let point = next_point(&mut i, &mut x, &mut y)?;
                    if let Some(done) = current.take() {
                        paths.push(done);
                    }
                    current = Some(Path { points: vec![point], closed: false });
                }
            }
            LINE_TO => {
                let path = current.as_mut().ok_or(StreamError::InvalidCommand(LINE_TO))?;
                for _ in 0..count {
                    let point = next_point(&mut i, &mut x, &mut y)?;
                    path.points.push(point);
                }
            }
            CLOSE_PATH => {
                let path = current.as_mut().ok_or(StreamError::InvalidCommand(CLOSE_PATH))?;
                path.closed = true;
            }
            other => return Err(StreamError::InvalidCommand(other)),
        }
    }

    if let Some(done) = current {
        paths.push(done);
    }
    Ok(paths)
}

/// Twice the signed area of a ring in tile space. Tile `y` grows downwards,
/// so exterior rings (clockwise on screen) come out positive.
pub(crate) fn signed_area(ring: &[(i32, i32)]) -> i64 {
    let n = ring.len();
    let mut area = 0i64;
    for k in 0..n {
        let (x1, y1) = ring[k];
        let (x2, y2) = ring[(k + 1) % n];
        area += i64::from(x1) * i64::from(y2) - i64::from(x2) * i64::from(y1);
    }
    area
}

fn project(tile: &TileCoordinate, extent: u32, points: &[(i32, i32)]) -> Vec<Coordinate> {
    points.iter().map(|&(x, y)| tile.project(f64::from(x), f64::from(y), extent)).collect()
}

pub(crate) fn to_points(paths: &[Path], tile: &TileCoordinate, extent: u32) -> Option<FeatureGeometry> {
    let points: Vec<(i32, i32)> = paths.iter().flat_map(|p| p.points.iter().copied()).collect();
    match points.len() {
        0 => None,
        1 => Some(FeatureGeometry::Point { coordinate: project(tile, extent, &points)[0] }),
        _ => Some(FeatureGeometry::MultiPoint { points: project(tile, extent, &points) }),
    }
}

pub(crate) fn to_lines(paths: &[Path], tile: &TileCoordinate, extent: u32) -> Option<FeatureGeometry> {
    let mut lines: Vec<Vec<Coordinate>> = paths
        .iter()
        .filter(|p| p.points.len() >= 2)
        .map(|p| {
            let mut line = project(tile, extent, &p.points);
            // A closed path returns to its start
            if p.closed && line.first() != line.last() {
                line.push(line[0]);
            }
            line
        })
        .collect();

    match lines.len() {
        0 => None,
        1 => Some(FeatureGeometry::LineString { coordinates: lines.remove(0) }),
        _ => Some(FeatureGeometry::MultiLineString { lines }),
    }
}

/// Group rings into polygons: each positive-area ring starts a polygon and
/// the negative-area rings that follow are its holes. A leading hole with no
/// exterior is promoted to an exterior.
pub(crate) fn to_polygons(paths: &[Path], tile: &TileCoordinate, extent: u32) -> Option<FeatureGeometry> {
    let mut polygons: Vec<PolygonRings> = Vec::new();

    for path in paths.iter().filter(|p| p.points.len() >= 3) {
        let area = signed_area(&path.points);
        if area == 0 {
            continue;
        }

        let mut ring = project(tile, extent, &path.points);
        if ring.first() != ring.last() {
            ring.push(ring[0]);
        }

        match polygons.last_mut() {
            Some(polygon) if area < 0 => polygon.interiors.push(ring),
            _ => polygons.push(PolygonRings::new(ring)),
        }
    }

    match polygons.len() {
        0 => None,
        1 => Some(FeatureGeometry::Polygon { polygon: polygons.remove(0) }),
        _ => Some(FeatureGeometry::MultiPolygon { polygons }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(id: u32, count: u32) -> u32 {
        (id & 0x7) | (count << 3)
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(1), -1);
        assert_eq!(zigzag(2), 1);
        assert_eq!(zigzag(3), -2);
        assert_eq!(zigzag(u32::MAX), i32::MIN);
    }

    #[test]
    fn test_decode_line_from_reference_example() {
        // MoveTo(2,2) LineTo(2,10) LineTo(10,10)
        let stream = [9, 4, 4, 18, 0, 16, 16, 0];
        let paths = decode_paths(&stream).unwrap();

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].points, vec![(2, 2), (2, 10), (10, 10)]);
        assert!(!paths[0].closed);
    }

    #[test]
    fn test_cursor_carries_between_parts() {
        // MoveTo(5,7) MoveTo(3,2): the second point is relative to the first
        let stream = [command(MOVE_TO, 2), 10, 14, 3, 9];
        let paths = decode_paths(&stream).unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].points, vec![(5, 7)]);
        assert_eq!(paths[1].points, vec![(3, 2)]);
    }

    #[test]
    fn test_truncated_parameters() {
        let stream = [command(MOVE_TO, 1), 4];
        assert_eq!(decode_paths(&stream), Err(StreamError::Truncated));

        let stream = [command(MOVE_TO, 1), 4, 4, command(LINE_TO, 2), 0, 16];
        assert_eq!(decode_paths(&stream), Err(StreamError::Truncated));
    }

    #[test]
    fn test_invalid_commands() {
        assert_eq!(decode_paths(&[command(LINE_TO, 1), 2, 2]), Err(StreamError::InvalidCommand(LINE_TO)));
        assert_eq!(decode_paths(&[command(3, 1), 2, 2]), Err(StreamError::InvalidCommand(3)));
    }

    #[test]
    fn test_polygon_grouping_by_winding() {
        let tile = TileCoordinate::new(0, 0, 1);
        let outer = Path { points: vec![(0, 0), (10, 0), (10, 10), (0, 10)], closed: true };
        let hole = Path { points: vec![(2, 2), (2, 8), (8, 8), (8, 2)], closed: true };
        let second = Path { points: vec![(20, 20), (30, 20), (30, 30)], closed: true };

        assert!(signed_area(&outer.points) > 0);
        assert!(signed_area(&hole.points) < 0);

        match to_polygons(&[outer, hole, second], &tile, 4096) {
            Some(FeatureGeometry::MultiPolygon { polygons }) => {
                assert_eq!(polygons.len(), 2);
                assert_eq!(polygons[0].interiors.len(), 1);
                assert_eq!(polygons[0].exterior.len(), 5);
                assert_eq!(polygons[0].exterior.first(), polygons[0].exterior.last());
                assert!(polygons[1].interiors.is_empty());
            }
            other => panic!("Expected MultiPolygon, got {:?}", other),
        }
    }

    #[test]
    fn test_degenerate_parts_dropped() {
        let tile = TileCoordinate::new(0, 0, 1);
        let single = Path { points: vec![(1, 1)], closed: false };
        assert_eq!(to_lines(&[single], &tile, 4096), None);

        let flat = Path { points: vec![(0, 0), (5, 0), (10, 0)], closed: true };
        assert_eq!(to_polygons(&[flat], &tile, 4096), None);
    }
}
