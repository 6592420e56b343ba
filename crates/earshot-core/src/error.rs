//! Error types for Earshot

use thiserror::Error;

use crate::models::TileCoordinate;

#[derive(Debug, Error)]
pub enum EarshotError {
    // Geometry errors
    #[error("Invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    // Tile pipeline errors
    #[error("Tile decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Tile fetch failed: {0}")]
    Fetch(#[from] FetchError),

    // Configuration errors
    #[error("Capacity misconfiguration for {key}: {reason}")]
    CapacityMisconfiguration { key: String, reason: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EarshotError {
    pub fn invalid_geometry(reason: impl Into<String>) -> Self {
        EarshotError::InvalidGeometry { reason: reason.into() }
    }
}

/// Failure to turn raw tile bytes into features.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed tile: {0}")]
    Malformed(String),

    #[error("Layer '{layer}' uses unsupported encoding version {version}")]
    UnsupportedVersion { layer: String, version: u32 },

    #[error("Truncated geometry command stream in layer '{layer}' feature {feature}")]
    TruncatedGeometry { layer: String, feature: usize },

    #[error("Unknown geometry type {geom_type} in layer '{layer}'")]
    UnknownGeometryType { layer: String, geom_type: i32 },

    #[error("Property index {index} out of range in layer '{layer}' (table size {len})")]
    PropertyIndexOutOfRange { layer: String, index: u32, len: usize },

    #[error("Invalid geometry command {command} in layer '{layer}'")]
    InvalidCommand { layer: String, command: u32 },
}

/// Failure reported by a tile transport.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Tile {0} not found")]
    NotFound(TileCoordinate),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EarshotError>;
