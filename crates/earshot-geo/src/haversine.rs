//! Great-circle ruler on a spherical earth.
//!
//! Point-to-point math is delegated to the `geo` crate; segment projection
//! uses cross-track and along-track distances on the same sphere.

use earshot_core::models::Coordinate;
use geo::{Bearing, Destination, Distance, Haversine, Point};

use crate::models::to_geo_point;
use crate::ruler::{normalize_bearing, Ruler};

/// Mean earth radius used by `geo::Haversine`, in meters
pub(crate) const EARTH_RADIUS: f64 = 6_371_008.8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HaversineRuler;

fn from_point(p: Point) -> Coordinate {
    Coordinate::new(p.x(), p.y())
}

impl Ruler for HaversineRuler {
    fn distance(&self, a: &Coordinate, b: &Coordinate) -> f64 {
        Haversine.distance(to_geo_point(a), to_geo_point(b))
    }

    fn bearing(&self, a: &Coordinate, b: &Coordinate) -> f64 {
        if a.longitude == b.longitude && a.latitude == b.latitude {
            return 0.0;
        }
        normalize_bearing(Haversine.bearing(to_geo_point(a), to_geo_point(b)))
    }

    fn destination(&self, p: &Coordinate, distance: f64, bearing: f64) -> Coordinate {
        from_point(Haversine.destination(to_geo_point(p), bearing, distance))
    }

    fn interpolate(&self, a: &Coordinate, b: &Coordinate, fraction: f64) -> Coordinate {
        if fraction <= 0.0 {
            return *a;
        }
        if fraction >= 1.0 {
            return *b;
        }
        let total = self.distance(a, b);
        self.destination(a, total * fraction, self.bearing(a, b))
    }

    fn nearest_on_segment(&self, p: &Coordinate, a: &Coordinate, b: &Coordinate) -> Coordinate {
        let d12 = self.distance(a, b) / EARTH_RADIUS;
        if d12 == 0.0 {
            return *a;
        }
        let d13 = self.distance(a, p) / EARTH_RADIUS;
        if d13 == 0.0 {
            return *a;
        }

        let theta12 = self.bearing(a, b).to_radians();
        let theta13 = self.bearing(a, p).to_radians();
        let delta = theta13 - theta12;

        // Behind the start of the segment
        if delta.cos() < 0.0 {
            return *a;
        }

        // Right spherical triangle: tan(along) = tan(d13) * cos(delta)
        let along_track = (d13.sin() * delta.cos()).atan2(d13.cos());

        if along_track >= d12 {
            return *b;
        }

        self.destination(a, along_track * EARTH_RADIUS, self.bearing(a, b))
    }
}
