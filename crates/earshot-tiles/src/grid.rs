//! The tile grid cache.
//!
//! Keeps the tiles around the user's location decoded and answers proximity
//! queries over them. All state changes (recompute, pin, refresh and fetch
//! completions) go through one mutex; queries read an immutable snapshot of
//! the decoded tiles and never wait on a recompute.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use earshot_core::config::{GridConfig, RulerKind};
use earshot_core::models::{Coordinate, FeatureKind, FeatureList, TileCoordinate};
use earshot_core::ports::TileTransport;
use earshot_core::Result;
use earshot_geo::index::sort_by_distance;
use earshot_geo::spatial::tile_within_radius;
use earshot_geo::{build_ruler, FeatureIndex, NearbyFeature, PointDistanceBearing, Triangle};
use earshot_mvt::decode_tile;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::state::{RecomputeSummary, TileEvent, TileState, TileStatus};

const EVENT_CAPACITY: usize = 256;

/// Cache of decoded tiles around the last known location.
///
/// Cloning is cheap and every clone shares the same cache.
#[derive(Clone)]
pub struct TileGridCache {
    inner: Arc<Inner>,
    ruler: RulerKind,
}

struct Inner {
    config: GridConfig,
    transport: Arc<dyn TileTransport>,
    runtime: Handle,
    state: Mutex<GridState>,
    snapshot: RwLock<Arc<Snapshot>>,
    events: broadcast::Sender<TileEvent>,
    pending: watch::Sender<usize>,
}

#[derive(Default)]
struct GridState {
    tiles: HashMap<TileCoordinate, TileState>,
    pinned: HashSet<TileCoordinate>,
    targets: HashSet<TileCoordinate>,
    next_generation: u64,
}

/// Decoded tiles as of the last state change
#[derive(Default)]
struct Snapshot {
    tiles: BTreeMap<TileCoordinate, Arc<FeatureIndex>>,
}

type FetchOutcome = std::result::Result<FeatureIndex, String>;

/// Hits merged across tiles. A feature on a shared tile edge is decoded once
/// per tile; copies sharing an external id keep the nearest, copies without
/// one merge when structurally equal.
#[derive(Default)]
struct Merged {
    hits: Vec<NearbyFeature>,
    by_id: HashMap<u64, usize>,
}

impl Merged {
    fn add(&mut self, hit: NearbyFeature) {
        match hit.feature.external_id {
            Some(id) => match self.by_id.get(&id) {
                Some(&slot) => {
                    if hit.nearest.distance < self.hits[slot].nearest.distance {
                        self.hits[slot] = hit;
                    }
                }
                None => {
                    self.by_id.insert(id, self.hits.len());
                    self.hits.push(hit);
                }
            },
            None => {
                let duplicate = self
                    .hits
                    .iter()
                    .any(|existing| existing.feature.external_id.is_none() && *existing.feature == *hit.feature);
                if !duplicate {
                    self.hits.push(hit);
                }
            }
        }
    }

    fn into_features(self) -> FeatureList {
        self.hits.into_iter().map(|hit| hit.feature).collect()
    }

    /// Nearest first, at most `max_count`
    fn into_nearest(mut self, max_count: usize) -> Vec<NearbyFeature> {
        sort_by_distance(&mut self.hits);
        self.hits.truncate(max_count);
        self.hits
    }
}

impl TileGridCache {
    /// Create a cache fetching through `transport`.
    ///
    /// Fetch and decode tasks are spawned on `runtime`. Fails with
    /// `CapacityMisconfiguration` or `ConfigInvalid` if `config` is invalid.
    pub fn new(config: GridConfig, transport: Arc<dyn TileTransport>, runtime: Handle) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (pending, _) = watch::channel(0);

        Ok(Self {
            ruler: RulerKind::default(),
            inner: Arc::new(Inner {
                config,
                transport,
                runtime,
                state: Mutex::new(GridState::default()),
                snapshot: RwLock::new(Arc::new(Snapshot::default())),
                events,
                pending,
            }),
        })
    }

    /// Use `ruler` for query distances
    pub fn with_ruler(mut self, ruler: RulerKind) -> Self {
        self.ruler = ruler;
        self
    }

    pub fn config(&self) -> &GridConfig {
        &self.inner.config
    }

    /// Retarget the grid on `location` at `zoom`.
    ///
    /// Starts fetches for target tiles that are neither decoded nor pending,
    /// retries failed tiles whose backoff has elapsed and evicts every tile
    /// that left the target set and is not pinned. Does not wait for any
    /// fetch, and calling it again with the same input issues no new fetches.
    pub fn recompute(&self, location: &Coordinate, zoom: u8) -> RecomputeSummary {
        let config = &self.inner.config;
        let center = TileCoordinate::containing(location, zoom);

        let mut ordered = center.neighbors(config.radius, config.shape);
        let mut state = self.inner.lock_state();

        let mut pinned: Vec<TileCoordinate> = state.pinned.iter().copied().collect();
        pinned.sort();
        for tile in pinned {
            if !ordered.contains(&tile) {
                ordered.push(tile);
            }
        }
        state.targets = ordered.iter().copied().collect();

        let evicted = self.inner.evict_untargeted(&mut state);

        let now = Instant::now();
        let mut started = 0;
        for tile in &ordered {
            let retry_attempt = match state.tiles.get_mut(tile) {
                None => Some(1),
                Some(TileState::Pending { .. }) => None,
                Some(TileState::Decoded { last_access, .. }) => {
                    *last_access = now;
                    None
                }
                Some(TileState::Failed { attempts, retry_at, .. }) => {
                    (*attempts < config.max_fetch_attempts && now >= *retry_at).then_some(*attempts + 1)
                }
            };
            if let Some(attempt) = retry_attempt {
                self.start_fetch(&mut state, *tile, attempt);
                started += 1;
            }
        }

        if evicted > 0 {
            self.inner.publish_snapshot(&state);
        }
        self.inner.publish_pending(&state);

        let summary = RecomputeSummary { targets: ordered.len(), started, evicted };
        info!(
            center = %center,
            targets = summary.targets,
            started = summary.started,
            evicted = summary.evicted,
            "Recomputed tile grid"
        );
        summary
    }

    /// Keep `tile` regardless of distance until it is unpinned.
    ///
    /// The tile joins the target set at the next recompute. Returns false if
    /// it was already pinned.
    pub fn pin(&self, tile: TileCoordinate) -> bool {
        let newly = self.inner.lock_state().pinned.insert(tile);
        debug!(tile = %tile, newly, "Pinned tile");
        newly
    }

    /// Release a pin. The tile is evicted at the next recompute unless it is
    /// within the radius.
    pub fn unpin(&self, tile: TileCoordinate) -> bool {
        let removed = self.inner.lock_state().pinned.remove(&tile);
        debug!(tile = %tile, removed, "Unpinned tile");
        removed
    }

    pub fn is_pinned(&self, tile: &TileCoordinate) -> bool {
        self.inner.lock_state().pinned.contains(tile)
    }

    /// Fetch a targeted tile again now, resetting its retry count.
    ///
    /// Returns false if the tile is not targeted or already pending.
    pub fn refresh(&self, tile: TileCoordinate) -> bool {
        let mut state = self.inner.lock_state();
        if !state.targets.contains(&tile) || state.tiles.get(&tile).is_some_and(TileState::is_pending) {
            return false;
        }

        let had_features = matches!(state.tiles.get(&tile), Some(TileState::Decoded { .. }));
        self.start_fetch(&mut state, tile, 1);
        if had_features {
            self.inner.publish_snapshot(&state);
        }
        self.inner.publish_pending(&state);
        debug!(tile = %tile, "Refreshing tile");
        true
    }

    /// Features within `radius` meters of `location` from every decoded tile
    /// the radius touches, optionally restricted to `kinds`.
    ///
    /// Features sharing an external id are returned once; features without
    /// one are merged only when structurally equal.
    pub fn features_near(
        &self,
        location: &Coordinate,
        radius: f64,
        kinds: Option<&[FeatureKind]>,
    ) -> FeatureList {
        let result = self.gather_near(location, radius, kinds).into_features();
        debug!(
            longitude = location.longitude,
            latitude = location.latitude,
            radius,
            found = result.len(),
            "Queried nearby features"
        );
        result
    }

    /// Up to `max_count` features within `radius` meters, nearest first
    pub fn nearest_features(
        &self,
        location: &Coordinate,
        radius: f64,
        max_count: usize,
        kinds: Option<&[FeatureKind]>,
    ) -> Vec<NearbyFeature> {
        self.gather_near(location, radius, kinds).into_nearest(max_count)
    }

    /// The nearest feature within `radius` meters
    pub fn nearest_feature(
        &self,
        location: &Coordinate,
        radius: f64,
        kinds: Option<&[FeatureKind]>,
    ) -> Option<NearbyFeature> {
        self.nearest_features(location, radius, 1, kinds).into_iter().next()
    }

    /// Every decoded feature overlapping `triangle`
    pub fn features_within_triangle(&self, triangle: &Triangle) -> FeatureList {
        self.gather_triangle(triangle).into_features()
    }

    /// Up to `max_count` features overlapping `triangle`, nearest to its
    /// origin first
    pub fn nearest_within_triangle(&self, triangle: &Triangle, max_count: usize) -> Vec<NearbyFeature> {
        self.gather_triangle(triangle).into_nearest(max_count)
    }

    /// Polygon features whose area contains `location`
    pub fn containing_polygons(&self, location: &Coordinate) -> FeatureList {
        let snapshot = self.inner.snapshot();
        let mut merged = Merged::default();
        for index in snapshot.tiles.values() {
            for feature in index.containing_polygons(location) {
                let nearest = PointDistanceBearing { point: *location, distance: 0.0, bearing: 0.0 };
                merged.add(NearbyFeature { feature, nearest });
            }
        }
        merged.into_features()
    }

    fn gather_near(&self, location: &Coordinate, radius: f64, kinds: Option<&[FeatureKind]>) -> Merged {
        let snapshot = self.inner.snapshot();
        let ruler = build_ruler(self.ruler, location.latitude);

        let mut merged = Merged::default();
        for (tile, index) in &snapshot.tiles {
            if !tile_within_radius(ruler.as_ref(), location, tile, radius) {
                continue;
            }
            for hit in index.within(ruler.as_ref(), location, radius) {
                if kinds.is_some_and(|kinds| !kinds.contains(&hit.feature.kind)) {
                    continue;
                }
                merged.add(hit);
            }
        }
        merged
    }

    fn gather_triangle(&self, triangle: &Triangle) -> Merged {
        let snapshot = self.inner.snapshot();
        let ruler = build_ruler(self.ruler, triangle.origin.latitude);

        let mut merged = Merged::default();
        for index in snapshot.tiles.values() {
            for hit in index.within_triangle(ruler.as_ref(), triangle) {
                merged.add(hit);
            }
        }
        merged
    }

    /// Receive an event for every tile fetch that completes from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TileEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until no tile is pending
    pub async fn settled(&self) {
        let mut pending = self.inner.pending.subscribe();
        // The sender lives as long as the cache, so this only ends when idle
        let _ = pending.wait_for(|&count| count == 0).await;
    }

    pub fn state_of(&self, tile: &TileCoordinate) -> Option<TileStatus> {
        let max_attempts = self.inner.config.max_fetch_attempts;
        self.inner.lock_state().tiles.get(tile).map(|state| state.status(max_attempts))
    }

    pub fn tile_count(&self) -> usize {
        self.inner.lock_state().tiles.len()
    }

    pub fn pending_count(&self) -> usize {
        *self.inner.pending.borrow()
    }

    pub fn decoded_tiles(&self) -> Vec<TileCoordinate> {
        self.inner.snapshot().tiles.keys().copied().collect()
    }

    fn start_fetch(&self, state: &mut GridState, tile: TileCoordinate, attempt: u32) {
        state.next_generation += 1;
        let generation = state.next_generation;

        let transport = Arc::clone(&self.inner.transport);
        let fetch = self.inner.runtime.spawn(async move { fetch_and_decode(transport.as_ref(), tile).await });
        let task = fetch.abort_handle();

        // A panicking transport must still settle the tile
        let weak = Arc::downgrade(&self.inner);
        self.inner.runtime.spawn(async move {
            let outcome = match fetch.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => Err(format!("fetch task panicked: {}", e)),
                // Aborted by eviction or shutdown
                Err(_) => return,
            };
            complete(weak, tile, generation, outcome);
        });

        debug!(tile = %tile, attempt, "Fetching tile");
        state.tiles.insert(tile, TileState::Pending { attempt, generation, task });
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, GridState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        let snapshot = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*snapshot)
    }

    /// Drop every tile outside the target set, aborting its fetch if pending
    fn evict_untargeted(&self, state: &mut GridState) -> usize {
        let stale: Vec<TileCoordinate> =
            state.tiles.keys().filter(|tile| !state.targets.contains(tile)).copied().collect();

        for tile in &stale {
            if let Some(TileState::Pending { task, .. }) = state.tiles.remove(tile) {
                task.abort();
            }
            debug!(tile = %tile, "Evicted tile");
        }
        stale.len()
    }

    fn publish_snapshot(&self, state: &GridState) {
        let tiles = state
            .tiles
            .iter()
            .filter_map(|(tile, tile_state)| match tile_state {
                TileState::Decoded { index, .. } => Some((*tile, Arc::clone(index))),
                _ => None,
            })
            .collect();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Snapshot { tiles });
    }

    fn publish_pending(&self, state: &GridState) {
        let count = state.tiles.values().filter(|s| s.is_pending()).count();
        self.pending.send_replace(count);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for tile_state in state.tiles.values() {
            if let TileState::Pending { task, .. } = tile_state {
                task.abort();
            }
        }
    }
}

async fn fetch_and_decode(transport: &dyn TileTransport, tile: TileCoordinate) -> FetchOutcome {
    let bytes = transport.fetch(tile).await.map_err(|e| e.to_string())?;
    // Decoding and indexing are CPU bound
    match tokio::task::spawn_blocking(move || decode_tile(&bytes, tile).map(FeatureIndex::new)).await {
        Ok(decoded) => decoded.map_err(|e| e.to_string()),
        Err(e) => Err(format!("decode task failed: {}", e)),
    }
}

/// Record the outcome of a fetch, unless the tile was evicted or refetched
/// since it started
fn complete(inner: Weak<Inner>, tile: TileCoordinate, generation: u64, outcome: FetchOutcome) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut state = inner.lock_state();

    let attempt = match state.tiles.get(&tile) {
        Some(TileState::Pending { generation: current, attempt, .. }) if *current == generation => *attempt,
        _ => {
            debug!(tile = %tile, "Discarding result for retargeted tile");
            return;
        }
    };

    let event = match outcome {
        Ok(index) => {
            let feature_count = index.len();
            state.tiles.insert(tile, TileState::Decoded { index: Arc::new(index), last_access: Instant::now() });
            inner.publish_snapshot(&state);
            debug!(tile = %tile, feature_count, "Decoded tile");
            TileEvent::Decoded { tile, feature_count }
        }
        Err(reason) => {
            let retry_at = Instant::now() + inner.config.backoff(attempt);
            warn!(
                tile = %tile,
                attempt,
                max_attempts = inner.config.max_fetch_attempts,
                error = %reason,
                "Tile fetch failed"
            );
            state.tiles.insert(tile, TileState::Failed { attempts: attempt, retry_at, reason: reason.clone() });
            TileEvent::Failed { tile, attempts: attempt, reason }
        }
    };

    inner.publish_pending(&state);
    drop(state);
    // No subscribers is fine
    let _ = inner.events.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTileTransport;
    use earshot_core::models::GridShape;
    use earshot_core::EarshotError;

    fn cache(transport: &MemoryTileTransport, radius: u32) -> TileGridCache {
        let config = GridConfig { radius, ..GridConfig::default() };
        TileGridCache::new(config, Arc::new(transport.clone()), Handle::current()).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let config = GridConfig { max_fetch_attempts: 0, ..GridConfig::default() };
        let result = TileGridCache::new(config, Arc::new(MemoryTileTransport::new()), Handle::current());
        assert!(matches!(result, Err(EarshotError::CapacityMisconfiguration { .. })));
    }

    #[tokio::test]
    async fn test_recompute_targets_neighbourhood() {
        let transport = MemoryTileTransport::new();
        let grid = cache(&transport, 1);

        let summary = grid.recompute(&Coordinate::new(-4.2518, 55.8642), 16);
        assert_eq!(summary.targets, 9);
        assert_eq!(summary.started, 9);
        assert_eq!(grid.tile_count(), 9);
        assert_eq!(grid.pending_count(), 9);
    }

    #[tokio::test]
    async fn test_diamond_shape() {
        let transport = MemoryTileTransport::new();
        let config = GridConfig { radius: 1, shape: GridShape::Diamond, ..GridConfig::default() };
        let grid = TileGridCache::new(config, Arc::new(transport), Handle::current()).unwrap();

        assert_eq!(grid.recompute(&Coordinate::new(-4.2518, 55.8642), 16).targets, 5);
    }

    #[tokio::test]
    async fn test_refresh_requires_target() {
        let transport = MemoryTileTransport::new();
        let grid = cache(&transport, 0);
        let tile = TileCoordinate::new(5, 5, 4);

        assert!(!grid.refresh(tile));
        grid.pin(tile);
        grid.recompute(&tile.center(), 4);
        // Already pending
        assert!(!grid.refresh(tile));
    }
}
