//! Time-bounded caches for aggregated hotspot queries and wind forecasts.

use dashmap::DashMap;
use firewatch_core::Position;
use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

pub trait CacheEntry {
    fn fetched_at(&self) -> Instant;
}

/// Drop entries older than `max_age`, then the oldest ones until at most
/// `max_entries` remain. Returns how many entries were removed.
pub fn prune_cache<K, V>(cache: &DashMap<K, V>, max_entries: usize, max_age: Duration) -> usize
where
    K: Clone + Eq + Hash,
    V: CacheEntry,
{
    let before = cache.len();
    let now = Instant::now();
    let mut entries: Vec<(K, Instant)> = cache
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().fetched_at()))
        .collect();

    for (key, fetched_at) in &entries {
        if now.duration_since(*fetched_at) > max_age {
            cache.remove(key);
        }
    }

    if cache.len() > max_entries {
        entries.sort_by_key(|(_, fetched_at)| *fetched_at);
        for (key, _) in entries {
            if cache.len() <= max_entries {
                break;
            }
            cache.remove(&key);
        }
    }

    before.saturating_sub(cache.len())
}

/// Grid step, in degrees, that wind forecasts are shared across.
pub const WIND_GRID_DEG: f64 = 0.25;

/// Cache identity of a hotspot query (layer order does not matter) or of a
/// wind forecast (grid cell and altitude).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(typenames: &[String], bbox: &str, count: u32) -> Self {
        let mut sorted: Vec<&str> = typenames.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        Self(format!("{}|{}|{}", sorted.join("|"), bbox, count))
    }

    /// Positions in the same grid cell share a key.
    pub fn wind(position: Position, altitude_m: u32) -> Self {
        // Adding zero folds -0.0 into 0.0.
        let snap = |deg: f64| (deg / WIND_GRID_DEG).round() * WIND_GRID_DEG + 0.0;
        Self(format!("wind|{:.2}_{:.2}|{altitude_m}", snap(position.lat), snap(position.lon)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
struct Stored<V> {
    value: V,
    fetched_at: Instant,
}

impl<V> CacheEntry for Stored<V> {
    fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

/// Concurrent map whose entries expire a fixed time after insertion.
/// Stored values are never mutated; readers get clones.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<CacheKey, Stored<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        {
            let entry = self.entries.get(key)?;
            if entry.fetched_at.elapsed() <= self.ttl {
                return Some(entry.value.clone());
            }
        }
        // The read guard must be released before removing.
        self.entries.remove(key);
        None
    }

    pub fn insert(&self, key: CacheKey, value: V) {
        self.entries.insert(
            key,
            Stored {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Remove expired entries and trim to `max_entries`.
    pub fn sweep(&self, max_entries: usize) -> usize {
        prune_cache(&self.entries, max_entries, self.ttl)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
