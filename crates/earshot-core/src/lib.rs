//! Earshot Core - Domain models, configuration and ports
//!
//! This crate contains the spatial data model shared by the decoder, the tile
//! grid cache and the callout history, together with the error taxonomy,
//! layered configuration and the tile transport port.

pub mod config;
pub mod error;
pub mod interchange;
pub mod models;
pub mod ports;

pub use error::{DecodeError, EarshotError, FetchError, Result};
