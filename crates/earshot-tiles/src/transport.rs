//! Tile transport implementations.
//!
//! Network transports are supplied by the host; these cover local tile trees
//! and in-memory fixtures.

use async_trait::async_trait;
use earshot_core::models::TileCoordinate;
use earshot_core::ports::TileTransport;
use earshot_core::FetchError;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory transport keyed by tile coordinate.
///
/// Missing tiles fail with [`FetchError::NotFound`]. Every call is counted so
/// tests can assert how often a tile was requested.
#[derive(Debug, Clone, Default)]
pub struct MemoryTileTransport {
    tiles: Arc<RwLock<HashMap<TileCoordinate, Vec<u8>>>>,
    calls: Arc<Mutex<HashMap<TileCoordinate, usize>>>,
    latency: Option<Duration>,
}

impl MemoryTileTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch by `latency` (on the tokio clock)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, tile: TileCoordinate, bytes: Vec<u8>) {
        self.tiles.write().unwrap_or_else(PoisonError::into_inner).insert(tile, bytes);
    }

    pub fn remove(&self, tile: &TileCoordinate) -> Option<Vec<u8>> {
        self.tiles.write().unwrap_or_else(PoisonError::into_inner).remove(tile)
    }

    /// Number of fetches issued for `tile`
    pub fn calls(&self, tile: &TileCoordinate) -> usize {
        lock(&self.calls).get(tile).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }
}

#[async_trait]
impl TileTransport for MemoryTileTransport {
    async fn fetch(&self, tile: TileCoordinate) -> Result<Vec<u8>, FetchError> {
        *lock(&self.calls).entry(tile).or_insert(0) += 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let tiles = self.tiles.read().unwrap_or_else(PoisonError::into_inner);
        tiles.get(&tile).cloned().ok_or(FetchError::NotFound(tile))
    }
}

/// Reads tiles from a `<root>/<z>/<x>/<y>.mvt` directory tree
#[derive(Debug, Clone)]
pub struct FileTileTransport {
    root: PathBuf,
    extension: String,
}

impl FileTileTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), extension: "mvt".to_string() }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, tile: &TileCoordinate) -> PathBuf {
        self.root
            .join(tile.zoom.to_string())
            .join(tile.x.to_string())
            .join(format!("{}.{}", tile.y, self.extension))
    }
}

#[async_trait]
impl TileTransport for FileTileTransport {
    async fn fetch(&self, tile: TileCoordinate) -> Result<Vec<u8>, FetchError> {
        let path = self.path_for(&tile);
        debug!(tile = %tile, path = %path.display(), "Reading tile");

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FetchError::NotFound(tile)),
            Err(e) => Err(FetchError::Io(e)),
        }
    }
}
