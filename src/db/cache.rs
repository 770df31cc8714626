//! Cache of the problem patterns associated with each error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

/// Counters of cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<i64, Vec<i64>>,
    stats: CacheStats,
}

/// Pattern ids per error id, shared by every clone.
///
/// A poisoned lock behaves as an empty cache: reads miss and writes are skipped.
#[derive(Debug, Clone, Default)]
pub struct ProblemPatternsCache {
    state: Arc<Mutex<CacheState>>,
}

impl ProblemPatternsCache {
    pub fn get(&self, error_id: i64) -> Option<Vec<i64>> {
        let mut state = self.state.lock().ok()?;
        match state.entries.get(&error_id).cloned() {
            Some(pattern_ids) => {
                state.stats.hits += 1;
                Some(pattern_ids)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    pub fn put(&self, error_id: i64, pattern_ids: Vec<i64>) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.insert(error_id, pattern_ids);
        }
    }

    pub fn evict(&self, error_ids: &[i64]) {
        if let Ok(mut state) = self.state.lock() {
            let mut evicted = 0;
            for error_id in error_ids {
                if state.entries.remove(error_id).is_some() {
                    evicted += 1;
                }
            }
            state.stats.evictions += evicted;
            debug!(
                "Evicted problem patterns of {} errors ({} were cached)",
                error_ids.len(),
                evicted
            );
        }
    }

    pub fn contains(&self, error_id: i64) -> bool {
        self.state
            .lock()
            .map(|state| state.entries.contains_key(&error_id))
            .unwrap_or(false)
    }

    pub fn stats(&self) -> CacheStats {
        self.state
            .lock()
            .map(|state| state.stats)
            .unwrap_or_default()
    }
}
