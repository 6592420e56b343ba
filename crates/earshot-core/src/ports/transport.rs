use async_trait::async_trait;
use std::sync::Arc;

use crate::error::FetchError;
use crate::models::TileCoordinate;

/// Port for fetching raw vector tile bytes
///
/// Implementations may suspend for network or disk I/O. The tile grid cache
/// calls `fetch` from spawned tasks and may abort a call that is no longer
/// needed, so implementations must tolerate being dropped mid-flight.
#[async_trait]
pub trait TileTransport: Send + Sync {
    /// Fetch the encoded bytes of one tile
    async fn fetch(&self, tile: TileCoordinate) -> Result<Vec<u8>, FetchError>;
}

#[async_trait]
impl<T: TileTransport + ?Sized> TileTransport for Arc<T> {
    async fn fetch(&self, tile: TileCoordinate) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(tile).await
    }
}
