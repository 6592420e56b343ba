//! The ruler abstraction.
//!
//! Every ruler works in meters and in degrees clockwise from true north,
//! normalised to `[0, 360)`. Line operations are provided on top of a few
//! per-ruler primitives, so all rulers walk lines the same way.

use earshot_core::config::RulerKind;
use earshot_core::models::Coordinate;
use earshot_core::{EarshotError, Result};

use crate::{CheapRuler, HaversineRuler};

/// Nearest point on a line with its distance and bearing from the query
/// location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointDistanceBearing {
    pub point: Coordinate,
    pub distance: f64,
    pub bearing: f64,
}

pub trait Ruler: Send + Sync {
    /// Distance between two points in meters
    fn distance(&self, a: &Coordinate, b: &Coordinate) -> f64;

    /// Initial bearing from `a` towards `b`
    fn bearing(&self, a: &Coordinate, b: &Coordinate) -> f64;

    /// The point `distance` meters from `p` along `bearing`
    fn destination(&self, p: &Coordinate, distance: f64, bearing: f64) -> Coordinate;

    /// The point a `fraction` of the way from `a` to `b`
    fn interpolate(&self, a: &Coordinate, b: &Coordinate, fraction: f64) -> Coordinate;

    /// Closest point to `p` on the segment `a`-`b`, endpoints included
    fn nearest_on_segment(&self, p: &Coordinate, a: &Coordinate, b: &Coordinate) -> Coordinate;

    fn point_to_segment_distance(&self, p: &Coordinate, a: &Coordinate, b: &Coordinate) -> f64 {
        if a == b {
            return self.distance(p, a);
        }
        self.distance(p, &self.nearest_on_segment(p, a, b))
    }

    /// Sum of segment lengths; zero for empty and single-vertex lines
    fn line_length(&self, line: &[Coordinate]) -> f64 {
        let mut sum = 0.0;
        for pair in line.windows(2) {
            sum += self.distance(&pair[0], &pair[1]);
        }
        sum
    }

    /// The point `distance` meters along `line`.
    ///
    /// Distances at or below zero give the first vertex, distances at or past
    /// the end give the last one. Fails only for an empty line.
    fn along(&self, line: &[Coordinate], distance: f64) -> Result<Coordinate> {
        let first = line
            .first()
            .ok_or_else(|| EarshotError::invalid_geometry("along() on an empty line"))?;
        if distance <= 0.0 {
            return Ok(*first);
        }

        let mut sum = 0.0;
        for pair in line.windows(2) {
            let (p0, p1) = (&pair[0], &pair[1]);
            let d = self.distance(p0, p1);
            sum += d;
            if sum > distance {
                return Ok(self.interpolate(p0, p1, (distance - (sum - d)) / d));
            }
        }

        Ok(line[line.len() - 1])
    }

    /// Nearest point of `line` to `p`, its distance and the bearing towards it
    fn distance_to_line_string(
        &self,
        p: &Coordinate,
        line: &[Coordinate],
    ) -> Result<PointDistanceBearing> {
        let first = line.first().ok_or_else(|| {
            EarshotError::invalid_geometry("distance_to_line_string() on an empty line")
        })?;

        let mut best = *first;
        let mut best_distance = self.distance(p, first);
        for pair in line.windows(2) {
            let candidate = self.nearest_on_segment(p, &pair[0], &pair[1]);
            let d = self.distance(p, &candidate);
            if d < best_distance {
                best = candidate;
                best_distance = d;
            }
        }

        Ok(PointDistanceBearing {
            point: best,
            distance: best_distance,
            bearing: self.bearing(p, &best),
        })
    }
}

/// Build the ruler selected in configuration.
///
/// `latitude` is the reference latitude for the cheap ruler and is ignored by
/// the haversine one.
pub fn build_ruler(kind: RulerKind, latitude: f64) -> Box<dyn Ruler> {
    match kind {
        RulerKind::Cheap => Box::new(CheapRuler::new(latitude)),
        RulerKind::Haversine => Box::new(HaversineRuler),
    }
}

/// Normalise an angle in degrees into `[0, 360)`
pub(crate) fn normalize_bearing(degrees: f64) -> f64 {
    let b = degrees.rem_euclid(360.0);
    if b >= 360.0 {
        0.0
    } else {
        b
    }
}
