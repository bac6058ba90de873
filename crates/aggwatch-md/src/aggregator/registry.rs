//! Concurrent map of [`Stat`]s, created lazily on the first trade of a key.
//!
//! Entries are never removed while the process runs.

use std::sync::Arc;

use aggwatch_core::MarketType;
use dashmap::DashMap;

use super::stat::{Stat, StatKey};

pub struct StatRegistry {
    stats: DashMap<StatKey, Arc<Stat>, ahash::RandomState>,
    window_secs: u64,
}

impl StatRegistry {
    /// `window_secs` labels the window alerts of every entry.
    pub fn new(window_secs: u64) -> Self {
        Self { stats: DashMap::with_hasher(ahash::RandomState::new()), window_secs }
    }

    /// The entry for `(market, symbol)`, inserting an empty one atomically if absent.
    pub fn get_or_create(&self, market: MarketType, symbol: &str) -> Arc<Stat> {
        let key = StatKey::new(market, symbol);
        if let Some(stat) = self.stats.get(&key) {
            return stat.value().clone();
        }
        let window_secs = self.window_secs;
        self.stats.entry(key.clone()).or_insert_with(|| Arc::new(Stat::new(key, window_secs))).value().clone()
    }

    pub fn get(&self, key: &StatKey) -> Option<Arc<Stat>> {
        self.stats.get(key).map(|s| s.value().clone())
    }

    /// Current entries, for the periodic window check. Holds no shard lock
    /// once returned.
    pub fn snapshot(&self) -> Vec<Arc<Stat>> {
        self.stats.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}
