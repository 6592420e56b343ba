use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Coordinate;

/// A callout that has been spoken, kept to suppress repeats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedCallout {
    /// Spoken text
    pub text: String,

    /// Where the announced feature is
    pub location: Coordinate,

    /// When the callout was issued
    pub created_at: DateTime<Utc>,
}

impl TrackedCallout {
    pub fn new(text: impl Into<String>, location: Coordinate) -> Self {
        Self::at(text, location, Utc::now())
    }

    pub fn at(text: impl Into<String>, location: Coordinate, created_at: DateTime<Utc>) -> Self {
        Self { text: text.into(), location, created_at }
    }

    /// Age of the callout at `now`; zero if `now` precedes creation
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.created_at).max(chrono::Duration::zero())
    }
}

/// Equality ignores the timestamp: two callouts are duplicates when they say
/// the same thing about the same place.
impl PartialEq for TrackedCallout {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.location == other.location
    }
}
