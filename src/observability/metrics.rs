//! Engine counters
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Relaxed atomics; counters never influence behavior

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Registry of operational counters shared by the engine components
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    events_appended: AtomicU64,
    idempotent_replays: AtomicU64,
    concurrent_conflicts: AtomicU64,
    conditions_evaluated: AtomicU64,
    condition_fallbacks: AtomicU64,
    projections: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    answers_rejected: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_events_appended(&self) {
        self.events_appended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_idempotent_replays(&self) {
        self.idempotent_replays.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_concurrent_conflicts(&self) {
        self.concurrent_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_conditions_evaluated(&self) {
        self.conditions_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_condition_fallbacks(&self) {
        self.condition_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_projections(&self) {
        self.projections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_answers_rejected(&self) {
        self.answers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_appended: self.events_appended.load(Ordering::Relaxed),
            idempotent_replays: self.idempotent_replays.load(Ordering::Relaxed),
            concurrent_conflicts: self.concurrent_conflicts.load(Ordering::Relaxed),
            conditions_evaluated: self.conditions_evaluated.load(Ordering::Relaxed),
            condition_fallbacks: self.condition_fallbacks.load(Ordering::Relaxed),
            projections: self.projections.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            answers_rejected: self.answers_rejected.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_appended: u64,
    pub idempotent_replays: u64,
    pub concurrent_conflicts: u64,
    pub conditions_evaluated: u64,
    pub condition_fallbacks: u64,
    pub projections: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub answers_rejected: u64,
}
