//! Port trait definitions
//!
//! These traits define the interfaces that adapters must implement.

pub mod transport;

pub use transport::TileTransport;
