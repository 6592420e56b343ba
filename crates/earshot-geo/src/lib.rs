//! Earshot Geo - Rulers and spatial operations
//!
//! This crate holds the geometry engine: interchangeable rulers for distance,
//! bearing and interpolation, conversions into `geo` types, the
//! feature-to-location distance used by proximity queries and an R-tree
//! index over a tile's features.

pub mod cheap;
pub mod haversine;
pub mod index;
pub mod models;
pub mod ruler;
pub mod spatial;

pub use cheap::CheapRuler;
pub use haversine::HaversineRuler;
pub use index::{FeatureIndex, NearbyFeature, Triangle};
pub use ruler::{build_ruler, PointDistanceBearing, Ruler};
