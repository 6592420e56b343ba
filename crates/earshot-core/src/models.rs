pub mod callout;
pub mod coordinate;
pub mod feature;
pub mod feature_list;
pub mod geometry;
pub mod tile;

pub use callout::TrackedCallout;
pub use coordinate::Coordinate;
pub use feature::{FeatureKind, Properties, PropertyValue, SpatialFeature};
pub use feature_list::FeatureList;
pub use geometry::{FeatureGeometry, GeometryType, PolygonRings};
pub use tile::{GridShape, TileBounds, TileCoordinate};
