//! Availability cache
//!
//! - Keyed by (tenant, scenario), tagged with the scenario version it was
//!   computed at
//! - An entry for an older version is still served while younger than the
//!   refresh interval; the lag is bounded by that interval
//! - Entries are discardable; the event log stays the system of record
//! - Disabled caches never hold entries
//! - At most `capacity` entries; the least recently computed is evicted

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::events::ScenarioKey;
use crate::observability::{LogEvent, Logger, MetricsRegistry};

use super::engine::Availability;

/// Entry limit unless configured otherwise
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct CachedAvailability {
    availability: Arc<Availability>,
    computed_at: Instant,
}

/// Materialized availability per scenario
#[derive(Debug)]
pub struct AvailabilityCache {
    entries: RwLock<HashMap<ScenarioKey, CachedAvailability>>,
    refresh_interval: Duration,
    enabled: bool,
    capacity: usize,
    metrics: Arc<MetricsRegistry>,
}

impl AvailabilityCache {
    pub fn new(refresh_interval: Duration, enabled: bool, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            refresh_interval,
            enabled,
            capacity: DEFAULT_CAPACITY,
            metrics,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn disabled(metrics: Arc<MetricsRegistry>) -> Self {
        Self::new(Duration::ZERO, false, metrics)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Cached availability usable at scenario version `version`.
    pub fn get(&self, key: &ScenarioKey, version: u64) -> Option<Arc<Availability>> {
        if !self.enabled {
            return None;
        }
        let hit = self.entries.read().ok().and_then(|entries| {
            entries.get(key).and_then(|entry| {
                let current = entry.availability.version == version;
                let within_lag = entry.availability.version < version
                    && entry.computed_at.elapsed() < self.refresh_interval;
                (current || within_lag).then(|| Arc::clone(&entry.availability))
            })
        });
        match hit {
            Some(_) => self.metrics.increment_cache_hits(),
            None => self.metrics.increment_cache_misses(),
        }
        hit
    }

    pub fn put(&self, key: ScenarioKey, availability: Availability) -> Arc<Availability> {
        let availability = Arc::new(availability);
        if self.enabled {
            if let Ok(mut entries) = self.entries.write() {
                let replace = entries
                    .get(&key)
                    .map_or(true, |e| e.availability.version <= availability.version);
                if replace {
                    if !entries.contains_key(&key) && entries.len() >= self.capacity {
                        let oldest = entries
                            .iter()
                            .min_by_key(|(_, e)| e.computed_at)
                            .map(|(k, _)| k.clone());
                        if let Some(oldest) = oldest {
                            entries.remove(&oldest);
                        }
                    }
                    entries.insert(
                        key,
                        CachedAvailability {
                            availability: Arc::clone(&availability),
                            computed_at: Instant::now(),
                        },
                    );
                }
            }
        }
        availability
    }

    pub fn invalidate(&self, key: &ScenarioKey) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn keys(&self) -> Vec<ScenarioKey> {
        self.entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Recompute every cached entry once. Entries `recompute` returns
    /// `None` for (gone, or no longer worth caching) are dropped.
    pub fn refresh_all<F>(&self, recompute: F) -> usize
    where
        F: Fn(&ScenarioKey) -> Option<Availability>,
    {
        let mut refreshed = 0;
        for key in self.keys() {
            match recompute(&key) {
                Some(availability) => {
                    self.put(key, availability);
                    refreshed += 1;
                }
                None => self.invalidate(&key),
            }
        }
        Logger::trace(
            LogEvent::CacheRefreshed,
            &[("entries", refreshed.to_string().as_str())],
        );
        refreshed
    }

    /// Background task that refreshes the cache every refresh interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_refresher<F>(self: &Arc<Self>, recompute: F) -> JoinHandle<()>
    where
        F: Fn(&ScenarioKey) -> Option<Availability> + Send + Sync + 'static,
    {
        let cache = Arc::clone(self);
        let period = self.refresh_interval.max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            // the first tick completes immediately
            timer.tick().await;
            loop {
                timer.tick().await;
                cache.refresh_all(&recompute);
            }
        })
    }
}
