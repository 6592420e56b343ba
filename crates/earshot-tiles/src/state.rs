//! Per-tile state machine and the events it emits.
//!
//! `Pending -> Decoded | Failed`, and `Failed -> Pending` when a retry is due.

use std::sync::Arc;

use earshot_core::models::TileCoordinate;
use earshot_geo::FeatureIndex;
use tokio::task::AbortHandle;
use tokio::time::Instant;

pub(crate) enum TileState {
    Pending {
        attempt: u32,
        /// Distinguishes this fetch from earlier ones for the same tile
        generation: u64,
        task: AbortHandle,
    },
    Decoded {
        index: Arc<FeatureIndex>,
        last_access: Instant,
    },
    Failed {
        attempts: u32,
        retry_at: Instant,
        reason: String,
    },
}

impl TileState {
    pub(crate) fn is_pending(&self) -> bool {
        matches!(self, TileState::Pending { .. })
    }

    pub(crate) fn status(&self, max_attempts: u32) -> TileStatus {
        match self {
            TileState::Pending { attempt, .. } => TileStatus::Pending { attempt: *attempt },
            TileState::Decoded { index, last_access } => TileStatus::Decoded {
                feature_count: index.len(),
                last_access: *last_access,
            },
            TileState::Failed { attempts, retry_at, reason } => TileStatus::Failed {
                attempts: *attempts,
                retry_at: *retry_at,
                reason: reason.clone(),
                exhausted: *attempts >= max_attempts,
            },
        }
    }
}

/// Read-only view of a tile's state
#[derive(Debug, Clone, PartialEq)]
pub enum TileStatus {
    Pending {
        attempt: u32,
    },
    Decoded {
        feature_count: usize,
        last_access: Instant,
    },
    Failed {
        attempts: u32,
        retry_at: Instant,
        reason: String,
        /// No further retries until the tile is refreshed or retargeted
        exhausted: bool,
    },
}

impl TileStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TileStatus::Pending { .. } => "pending",
            TileStatus::Decoded { .. } => "decoded",
            TileStatus::Failed { .. } => "failed",
        }
    }
}

/// Completion of a tile fetch, published to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum TileEvent {
    Decoded { tile: TileCoordinate, feature_count: usize },
    Failed { tile: TileCoordinate, attempts: u32, reason: String },
}

impl TileEvent {
    pub fn tile(&self) -> TileCoordinate {
        match self {
            TileEvent::Decoded { tile, .. } | TileEvent::Failed { tile, .. } => *tile,
        }
    }
}

/// What a recompute changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecomputeSummary {
    pub targets: usize,
    pub started: usize,
    pub evicted: usize,
}
