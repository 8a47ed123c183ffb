// SPDX-License-Identifier: Apache-2.0

//! The per-module generator result type (spec.md section 3.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::Id;

/// An immutable-outwardly statistics object produced by a start, updated by the
/// module until stop, and retained until explicitly deleted (see GLOSSARY).
///
/// Results persist after `stop`; they become inactive and are only deletable
/// once inactive (spec.md section 3.3). Statistics are never cleared on stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorResult<S> {
    id: Id,
    generator_id: Id,
    active: bool,
    start_timestamp: DateTime<Utc>,
    timestamp_last: DateTime<Utc>,
    stats: S,
    /// Configuration snapshot optionally supplied by the caller at start
    /// (spec.md section 3.3: "dynamic_results").
    dynamic_results: Option<serde_json::Value>,
}

impl<S> GeneratorResult<S> {
    /// Creates a freshly-started, active result with an empty stats snapshot.
    pub fn started(id: Id, generator_id: Id, dynamic_results: Option<serde_json::Value>, stats: S) -> Self {
        let now = Utc::now();
        Self {
            id,
            generator_id,
            active: true,
            start_timestamp: now,
            timestamp_last: now,
            stats,
            dynamic_results,
        }
    }

    #[must_use]
    pub fn id(&self) -> &Id {
        &self.id
    }

    #[must_use]
    pub fn generator_id(&self) -> &Id {
        &self.generator_id
    }

    #[must_use]
    pub fn active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn start_timestamp(&self) -> DateTime<Utc> {
        self.start_timestamp
    }

    #[must_use]
    pub fn timestamp_last(&self) -> DateTime<Utc> {
        self.timestamp_last
    }

    #[must_use]
    pub fn stats(&self) -> &S {
        &self.stats
    }

    #[must_use]
    pub fn dynamic_results(&self) -> Option<&serde_json::Value> {
        self.dynamic_results.as_ref()
    }

    /// Records a new stats snapshot as of `now`. Statistics are never cleared,
    /// only replaced by a newer aggregate (spec.md section 3.3).
    pub fn update_stats(&mut self, stats: S) {
        self.stats = stats;
        self.timestamp_last = Utc::now();
    }

    /// Marks the result inactive. Called when the parent generator stops;
    /// statistics are left exactly as last observed (spec.md section 4.2: stop).
    pub fn deactivate(&mut self) {
        self.active = false;
        self.timestamp_last = Utc::now();
    }

    /// Re-points this result at a different generator, optionally replacing
    /// its dynamic results snapshot. Used by `Registry::toggle` (spec.md
    /// section 4.2) to hand one result id off from the outgoing generator to
    /// the incoming one without resetting `id`, `start_timestamp`, or `stats`.
    pub(crate) fn retarget(&mut self, generator_id: Id, dynamic_results: Option<serde_json::Value>) {
        self.generator_id = generator_id;
        if dynamic_results.is_some() {
            self.dynamic_results = dynamic_results;
        }
        self.timestamp_last = Utc::now();
    }
}
