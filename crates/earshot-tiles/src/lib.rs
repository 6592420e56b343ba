//! Earshot Tiles - The tile grid cache
//!
//! Tracks which tiles surround the user, fetches and decodes them off the
//! caller's thread, retries failures with capped exponential backoff and
//! answers proximity queries over the decoded features.

pub mod grid;
pub mod state;
pub mod transport;

pub use earshot_geo::{NearbyFeature, Triangle};
pub use grid::TileGridCache;
pub use state::{RecomputeSummary, TileEvent, TileStatus};
pub use transport::{FileTileTransport, MemoryTileTransport};
