//! Query planner with an in-memory LRU cache of path results.
//!
//! Preset keys carry the graph's id and version, so results computed on
//! another graph, or before this one changed, are never served; they simply
//! age out.

use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::query::engine::{NodePath, PresetQuery, QueryEngine};

pub const DEFAULT_PLANNER_ENTRIES: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheMode {
    Hit,
    Miss,
}

impl CacheMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheMode::Hit => "cache_hit",
            CacheMode::Miss => "cache_miss",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlannerStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
struct PlannerCache {
    entries: IndexMap<String, Arc<Vec<NodePath>>>,
    hits: u64,
    misses: u64,
}

pub struct QueryPlanner {
    max_entries: usize,
    cache: Mutex<PlannerCache>,
}

impl Default for QueryPlanner {
    fn default() -> Self {
        QueryPlanner::new(DEFAULT_PLANNER_ENTRIES)
    }
}

impl QueryPlanner {
    pub fn new(max_entries: usize) -> Self {
        QueryPlanner {
            max_entries: max_entries.max(1),
            cache: Mutex::new(PlannerCache::default()),
        }
    }

    fn cache_key(query: &str, params: &impl Serialize, version: u64) -> String {
        let normalized = serde_json::to_string(params).unwrap_or_default();
        format!("{query}:{version}:{normalized}")
    }

    /// Return the cached result for `(query, params, version)` or compute and
    /// store it. The lock is not held while `compute` runs.
    pub fn get_or_compute(
        &self,
        query: &str,
        params: &impl Serialize,
        version: u64,
        compute: impl FnOnce() -> Vec<NodePath>,
    ) -> (Arc<Vec<NodePath>>, CacheMode) {
        let key = Self::cache_key(query, params, version);
        {
            let mut cache = self.cache.lock();
            if let Some(value) = cache.entries.shift_remove(&key) {
                // Re-insert at the back to mark it most recently used.
                cache.entries.insert(key, Arc::clone(&value));
                cache.hits += 1;
                return (value, CacheMode::Hit);
            }
        }

        let started = Instant::now();
        let value = Arc::new(compute());
        tracing::debug!(
            "Planner miss for {query} (v{version}): {} paths in {:.3}ms",
            value.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        let mut cache = self.cache.lock();
        cache.misses += 1;
        cache.entries.insert(key, Arc::clone(&value));
        while cache.entries.len() > self.max_entries {
            cache.entries.shift_remove_index(0);
        }
        (value, CacheMode::Miss)
    }

    pub fn run_preset(
        &self,
        engine: &QueryEngine<'_>,
        preset: PresetQuery,
    ) -> (Arc<Vec<NodePath>>, CacheMode) {
        let params = (preset.limits(), engine.policy(), engine.graph().graph_id());
        self.get_or_compute(preset.name(), &params, engine.graph().version(), || {
            engine.query_preset(preset)
        })
    }

    pub fn clear(&self) {
        self.cache.lock().entries.clear();
    }

    pub fn stats(&self) -> PlannerStats {
        let cache = self.cache.lock();
        PlannerStats {
            entries: cache.entries.len(),
            max_entries: self.max_entries,
            hits: cache.hits,
            misses: cache.misses,
        }
    }
}
