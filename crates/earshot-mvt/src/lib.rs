//! Earshot MVT - Mapbox vector tile decoding
//!
//! Turns raw tile bytes into a [`FeatureList`](earshot_core::models::FeatureList)
//! in world coordinates. Each call is independent and holds no shared state,
//! so different tiles can be decoded concurrently.

pub mod decoder;
pub mod encode;
mod geometry;
pub mod kind;
pub mod proto;

pub use decoder::decode_tile;
pub use encode::{LayerBuilder, TileBuilder};
pub use kind::classify;
