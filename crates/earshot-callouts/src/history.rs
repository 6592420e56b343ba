use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use earshot_core::config::{HistoryConfig, RulerKind};
use earshot_core::models::{Coordinate, TrackedCallout};
use earshot_core::Result;
use earshot_geo::build_ruler;
use tracing::debug;

/// Bounded, oldest-first history of spoken callouts.
///
/// Lookups are linear; the history holds tens of entries. Not meant for
/// concurrent writers: wrap it in a lock if several producers emit callouts.
#[derive(Debug, Clone)]
pub struct CalloutHistory {
    config: HistoryConfig,
    ruler: RulerKind,
    entries: VecDeque<TrackedCallout>,
}

impl CalloutHistory {
    /// Fails with `CapacityMisconfiguration` if `config` has a zero capacity
    /// or a non-positive threshold.
    pub fn new(config: HistoryConfig, ruler: RulerKind) -> Result<Self> {
        config.validate()?;
        let entries = VecDeque::with_capacity(config.capacity);
        Ok(Self { config, ruler, entries })
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Record a callout, dropping the oldest entry when full
    pub fn add(&mut self, callout: TrackedCallout) {
        while self.entries.len() >= self.config.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                debug!(text = %evicted.text, "Callout history full, dropping oldest");
            }
        }
        self.entries.push_back(callout);
    }

    /// Whether a callout with the same text and location is retained
    pub fn find(&self, callout: &TrackedCallout) -> bool {
        self.entries.iter().any(|entry| entry == callout)
    }

    /// Add `callout` unless it is already retained. Returns whether it was
    /// added, i.e. whether it should be spoken.
    pub fn check_and_add(&mut self, callout: TrackedCallout) -> bool {
        if self.find(&callout) {
            return false;
        }
        self.add(callout);
        true
    }

    /// Trim against the current time. See [`CalloutHistory::trim_at`].
    pub fn trim(&mut self, location: &Coordinate) -> usize {
        self.trim_at(location, Utc::now())
    }

    /// Remove every entry older than the expiry at `now` or farther than the
    /// distance threshold from `location`. Returns how many were removed.
    pub fn trim_at(&mut self, location: &Coordinate, now: DateTime<Utc>) -> usize {
        if self.entries.is_empty() {
            return 0;
        }

        let ruler = build_ruler(self.ruler, location.latitude);
        let expiry = self.config.expiry;
        let max_distance = self.config.distance_threshold_m;
        let before = self.entries.len();

        self.entries.retain(|entry| {
            let expired = entry.age_at(now).to_std().is_ok_and(|age| age > expiry);
            let distant = ruler.distance(location, &entry.location) > max_distance;
            !(expired || distant)
        });

        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Trimmed callout history");
        }
        removed
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries oldest first
    pub fn iter(&self) -> impl Iterator<Item = &TrackedCallout> {
        self.entries.iter()
    }
}
