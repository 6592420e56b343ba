use serde::{Deserialize, Serialize};
use std::fmt;

/// A WGS 84 position in degrees, with an optional elevation in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Coordinate {
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude, altitude: None }
    }

    pub const fn with_altitude(longitude: f64, latitude: f64, altitude: f64) -> Self {
        Self { longitude, latitude, altitude: Some(altitude) }
    }

    /// Squared planar distance in degrees. Only meaningful for ranking
    /// nearby candidates, use a ruler for real distances.
    pub fn squared_degrees_to(&self, other: &Coordinate) -> f64 {
        let dx = self.longitude - other.longitude;
        let dy = self.latitude - other.latitude;
        dx * dx + dy * dy
    }

    pub fn is_finite(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite()
    }

    /// GeoJSON position: `[lon, lat]` or `[lon, lat, alt]`
    pub fn to_position(&self) -> Vec<f64> {
        match self.altitude {
            Some(alt) => vec![self.longitude, self.latitude, alt],
            None => vec![self.longitude, self.latitude],
        }
    }

    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [lon, lat] => Some(Self::new(*lon, *lat)),
            [lon, lat, alt, ..] => Some(Self::with_altitude(*lon, *lat, *alt)),
            _ => None,
        }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((longitude, latitude): (f64, f64)) -> Self {
        Self::new(longitude, latitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.longitude, self.latitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_roundtrip_keeps_altitude() {
        let c = Coordinate::with_altitude(-4.25, 55.86, 12.5);
        assert_eq!(Coordinate::from_position(&c.to_position()), Some(c));

        let flat = Coordinate::new(-4.25, 55.86);
        assert_eq!(flat.to_position().len(), 2);
        assert_eq!(Coordinate::from_position(&flat.to_position()), Some(flat));
    }

    #[test]
    fn test_short_position_rejected() {
        assert_eq!(Coordinate::from_position(&[1.0]), None);
    }
}
