//! Flat-earth ruler for short distances.
//!
//! Distances are scaled per degree of longitude and latitude at a fixed
//! reference latitude using the WGS 84 ellipsoid, so errors stay well under
//! one percent within a few kilometers of that latitude.

use earshot_core::models::Coordinate;

use crate::ruler::{normalize_bearing, Ruler};

/// WGS 84 equatorial radius in kilometers
const RE: f64 = 6378.137;
/// WGS 84 flattening
const FE: f64 = 1.0 / 298.257_223_563;
const E2: f64 = FE * (2.0 - FE);
const RAD: f64 = std::f64::consts::PI / 180.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheapRuler {
    /// Meters per degree of longitude
    kx: f64,
    /// Meters per degree of latitude
    ky: f64,
}

impl CheapRuler {
    pub fn new(latitude: f64) -> Self {
        let m = RAD * RE * 1000.0;
        let coslat = (latitude * RAD).cos();
        let w2 = 1.0 / (1.0 - E2 * (1.0 - coslat * coslat));
        let w = w2.sqrt();

        Self { kx: m * w * coslat, ky: m * w * w2 * (1.0 - E2) }
    }

    /// Shift `p` by `dx` meters east and `dy` meters north
    pub fn offset(&self, p: &Coordinate, dx: f64, dy: f64) -> Coordinate {
        Coordinate::new(p.longitude + dx / self.kx, p.latitude + dy / self.ky)
    }
}

/// Longitude difference folded into `[-180, 180]`
fn wrap(degrees: f64) -> f64 {
    let mut d = degrees;
    while d < -180.0 {
        d += 360.0;
    }
    while d > 180.0 {
        d -= 360.0;
    }
    d
}

impl Ruler for CheapRuler {
    fn distance(&self, a: &Coordinate, b: &Coordinate) -> f64 {
        let dx = wrap(a.longitude - b.longitude) * self.kx;
        let dy = (a.latitude - b.latitude) * self.ky;
        (dx * dx + dy * dy).sqrt()
    }

    fn bearing(&self, a: &Coordinate, b: &Coordinate) -> f64 {
        let dx = wrap(b.longitude - a.longitude) * self.kx;
        let dy = (b.latitude - a.latitude) * self.ky;
        normalize_bearing(dx.atan2(dy).to_degrees())
    }

    fn destination(&self, p: &Coordinate, distance: f64, bearing: f64) -> Coordinate {
        let a = bearing * RAD;
        self.offset(p, a.sin() * distance, a.cos() * distance)
    }

    fn interpolate(&self, a: &Coordinate, b: &Coordinate, fraction: f64) -> Coordinate {
        let dx = wrap(b.longitude - a.longitude);
        let dy = b.latitude - a.latitude;
        Coordinate::new(a.longitude + dx * fraction, a.latitude + dy * fraction)
    }

    fn nearest_on_segment(&self, p: &Coordinate, a: &Coordinate, b: &Coordinate) -> Coordinate {
        let mut x = a.longitude;
        let mut y = a.latitude;
        let dx = wrap(b.longitude - x) * self.kx;
        let dy = (b.latitude - y) * self.ky;

        if dx != 0.0 || dy != 0.0 {
            let t = (wrap(p.longitude - x) * self.kx * dx + (p.latitude - y) * self.ky * dy)
                / (dx * dx + dy * dy);

            if t > 1.0 {
                return *b;
            } else if t > 0.0 {
                x += dx / self.kx * t;
                y += dy / self.ky * t;
            } else {
                return *a;
            }
        }

        Coordinate::new(x, y)
    }
}
