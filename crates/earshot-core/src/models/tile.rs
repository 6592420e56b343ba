//! Slippy-map tile addressing.
//!
//! Tiles follow the usual Web Mercator pyramid: at zoom `z` there are `2^z`
//! columns and rows, column 0 starts at the antimeridian and row 0 at the
//! northern edge of the projection.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::error::EarshotError;
use crate::models::Coordinate;

/// Highest zoom level accepted anywhere in the pipeline
pub const MAX_ZOOM: u8 = 24;

/// Largest grid radius, in tiles, a grid may be configured with
pub const MAX_GRID_RADIUS: u32 = 32;

/// Latitude limit of the Web Mercator projection
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// One tile in the pyramid, addressed by column, row and zoom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoordinate {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

/// Geographic extent of a tile in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl TileBounds {
    /// Closest point of the bounds to `location`
    pub fn clamp(&self, location: &Coordinate) -> Coordinate {
        Coordinate::new(
            location.longitude.clamp(self.west, self.east),
            location.latitude.clamp(self.south, self.north),
        )
    }

    pub fn contains(&self, location: &Coordinate) -> bool {
        location.longitude >= self.west
            && location.longitude <= self.east
            && location.latitude >= self.south
            && location.latitude <= self.north
    }
}

/// Shape of the neighbourhood of tiles kept around the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GridShape {
    /// Every tile within `radius` columns and rows
    #[default]
    Square,
    /// Tiles whose column plus row offset is within `radius`
    Diamond,
}

impl TileCoordinate {
    pub const fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Number of columns (and rows) at this tile's zoom
    pub fn tiles_per_side(&self) -> u64 {
        1u64 << self.zoom
    }

    /// The tile containing `location` at `zoom`
    pub fn containing(location: &Coordinate, zoom: u8) -> Self {
        let zoom = zoom.min(MAX_ZOOM);
        let n = (1u64 << zoom) as f64;
        let max_index = (1u64 << zoom) - 1;

        let lon = location.longitude.clamp(-180.0, 180.0);
        let lat = location.latitude.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);

        let x = ((lon + 180.0) / 360.0 * n).floor().max(0.0) as u64;
        let lat_rad = lat.to_radians();
        let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor().max(0.0) as u64;

        Self { x: x.min(max_index) as u32, y: y.min(max_index) as u32, zoom }
    }

    /// Project a tile-local position into world coordinates.
    ///
    /// `px` and `py` are in the tile's own grid of `extent` units per side,
    /// `y` growing southwards. Positions outside `0..extent` (tile buffers)
    /// are projected the same way.
    pub fn project(&self, px: f64, py: f64, extent: u32) -> Coordinate {
        let n = self.tiles_per_side() as f64;
        let extent = f64::from(extent);
        let world_x = (f64::from(self.x) + px / extent) / n;
        let world_y = (f64::from(self.y) + py / extent) / n;

        let longitude = world_x * 360.0 - 180.0;
        let latitude = (PI * (1.0 - 2.0 * world_y)).sinh().atan().to_degrees();
        Coordinate::new(longitude, latitude)
    }

    pub fn bounds(&self) -> TileBounds {
        let north_west = self.project(0.0, 0.0, 1);
        let south_east = self.project(1.0, 1.0, 1);
        TileBounds {
            west: north_west.longitude,
            south: south_east.latitude,
            east: south_east.longitude,
            north: north_west.latitude,
        }
    }

    pub fn center(&self) -> Coordinate {
        self.project(0.5, 0.5, 1)
    }

    /// All tiles within `radius` of this one, this tile first.
    ///
    /// Columns wrap around the antimeridian; rows beyond the poles are
    /// dropped. Duplicates produced by wrapping at low zoom are removed, and
    /// a radius wider than the pyramid visits each tile once.
    pub fn neighbors(&self, radius: u32, shape: GridShape) -> Vec<TileCoordinate> {
        let n = self.tiles_per_side() as i64;
        let r = i64::from(radius);
        // Column offsets past n/2 wrap onto columns already visited
        let reach_x = r.min(n / 2);
        let reach_y = r.min(n - 1);
        let mut seen = HashSet::new();
        let mut tiles = Vec::new();

        seen.insert(*self);
        tiles.push(*self);

        for dy in -reach_y..=reach_y {
            for dx in -reach_x..=reach_x {
                if shape == GridShape::Diamond && dx.abs() + dy.abs() > r {
                    continue;
                }
                let row = i64::from(self.y) + dy;
                if row < 0 || row >= n {
                    continue;
                }
                let col = (i64::from(self.x) + dx).rem_euclid(n);
                let tile = TileCoordinate::new(col as u32, row as u32, self.zoom);
                if seen.insert(tile) {
                    tiles.push(tile);
                }
            }
        }

        tiles
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

impl FromStr for TileCoordinate {
    type Err = EarshotError;

    /// Parse the `z/x/y` form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| EarshotError::ConfigInvalid { key: "tile".to_string(), reason };

        let parts: Vec<&str> = s.trim().split('/').collect();
        let [z, x, y] = parts.as_slice() else {
            return Err(invalid(format!("expected z/x/y, got '{}'", s)));
        };

        let zoom: u8 = z.parse().map_err(|_| invalid(format!("bad zoom '{}'", z)))?;
        let x: u32 = x.parse().map_err(|_| invalid(format!("bad column '{}'", x)))?;
        let y: u32 = y.parse().map_err(|_| invalid(format!("bad row '{}'", y)))?;

        if zoom > MAX_ZOOM {
            return Err(invalid(format!("zoom {} exceeds {}", zoom, MAX_ZOOM)));
        }
        let n = 1u64 << zoom;
        if u64::from(x) >= n || u64::from(y) >= n {
            return Err(invalid(format!("tile {}/{}/{} outside the pyramid", zoom, x, y)));
        }

        Ok(Self { x, y, zoom })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_containing_tile_bounds_include_location() {
        let glasgow = Coordinate::new(-4.2518, 55.8642);
        let tile = TileCoordinate::containing(&glasgow, 16);

        assert_eq!(tile, TileCoordinate::new(31993, 20451, 16));
        assert!(tile.bounds().contains(&glasgow));
    }

    #[test]
    fn test_zoom_zero_is_whole_world() {
        let tile = TileCoordinate::containing(&Coordinate::new(170.0, -60.0), 0);
        assert_eq!(tile, TileCoordinate::new(0, 0, 0));

        let bounds = tile.bounds();
        assert!((bounds.west + 180.0).abs() < 1e-9);
        assert!((bounds.east - 180.0).abs() < 1e-9);
        assert!((bounds.north - MAX_MERCATOR_LATITUDE).abs() < 1e-6);
    }

    #[test]
    fn test_containing_clamps_edges() {
        let tile = TileCoordinate::containing(&Coordinate::new(180.0, -90.0), 2);
        assert_eq!(tile, TileCoordinate::new(3, 3, 2));
    }

    #[test]
    fn test_square_neighbors() {
        let tile = TileCoordinate::new(10, 10, 5);
        let tiles = tile.neighbors(1, GridShape::Square);

        assert_eq!(tiles.len(), 9);
        assert_eq!(tiles[0], tile);
        assert!(tiles.contains(&TileCoordinate::new(9, 9, 5)));
        assert!(tiles.contains(&TileCoordinate::new(11, 11, 5)));
    }

    #[test]
    fn test_diamond_neighbors() {
        let tile = TileCoordinate::new(10, 10, 5);
        let tiles = tile.neighbors(1, GridShape::Diamond);

        assert_eq!(tiles.len(), 5);
        assert!(!tiles.contains(&TileCoordinate::new(9, 9, 5)));
        assert!(tiles.contains(&TileCoordinate::new(10, 9, 5)));
    }

    #[test]
    fn test_neighbors_wrap_columns_and_clip_rows() {
        let tile = TileCoordinate::new(0, 0, 3);
        let tiles = tile.neighbors(1, GridShape::Square);

        // Row -1 is dropped, column -1 wraps to 7
        assert_eq!(tiles.len(), 6);
        assert!(tiles.contains(&TileCoordinate::new(7, 0, 3)));
        assert!(tiles.contains(&TileCoordinate::new(7, 1, 3)));
    }

    #[test]
    fn test_neighbors_at_zoom_zero_do_not_duplicate() {
        let tile = TileCoordinate::new(0, 0, 0);
        assert_eq!(tile.neighbors(2, GridShape::Square), vec![tile]);
    }

    #[test]
    fn test_huge_radius_covers_pyramid_once() {
        let tile = TileCoordinate::new(1, 2, 2);
        let tiles = tile.neighbors(u32::MAX, GridShape::Square);
        assert_eq!(tiles.len(), 16);
        assert_eq!(tiles[0], tile);

        let diamond = tile.neighbors(100_000, GridShape::Diamond);
        assert_eq!(diamond.len(), 16);
    }

    #[test]
    fn test_parse_and_display() {
        let tile: TileCoordinate = "16/32000/20427".parse().unwrap();
        assert_eq!(tile, TileCoordinate::new(32000, 20427, 16));
        assert_eq!(tile.to_string(), "16/32000/20427");

        assert!("16/32000".parse::<TileCoordinate>().is_err());
        assert!("2/4/0".parse::<TileCoordinate>().is_err());
        assert!("a/b/c".parse::<TileCoordinate>().is_err());
    }

    #[test]
    fn test_project_corners_match_bounds() {
        let tile = TileCoordinate::new(3, 2, 3);
        let bounds = tile.bounds();
        let nw = tile.project(0.0, 0.0, 4096);
        let se = tile.project(4096.0, 4096.0, 4096);

        assert!((nw.longitude - bounds.west).abs() < 1e-9);
        assert!((nw.latitude - bounds.north).abs() < 1e-9);
        assert!((se.longitude - bounds.east).abs() < 1e-9);
        assert!((se.latitude - bounds.south).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_containing_tile_holds_location(
            lon in -180.0f64..180.0,
            lat in -85.0f64..85.0,
            zoom in 0u8..=20,
        ) {
            let location = Coordinate::new(lon, lat);
            let tile = TileCoordinate::containing(&location, zoom);
            let b = tile.bounds();
            let eps = 1e-9;

            prop_assert!(lon >= b.west - eps && lon <= b.east + eps);
            prop_assert!(lat >= b.south - eps && lat <= b.north + eps);
            prop_assert_eq!(tile.to_string().parse::<TileCoordinate>().unwrap(), tile);
        }
    }
}
