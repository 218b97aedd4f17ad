//! Cross-request cache of built graphs
//!
//! Keyed by project root, fact fingerprint and enrichment flags. Readers
//! only ever see finished builds: a per-key build lock makes concurrent
//! requests for the same key wait on one builder instead of racing, and the
//! finished graph is published into the map in a single write.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::builder::BuildReport;
use crate::config::CacheConfig;
use crate::enrich::EnrichmentFlags;
use crate::error::Result;
use crate::graph::UniversalGraph;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub root: PathBuf,
    pub content_hash: u64,
    pub flags: EnrichmentFlags,
}

/// A finished build shared between requests
#[derive(Debug, Clone)]
pub struct CachedBuild {
    pub graph: Arc<UniversalGraph>,
    pub report: Arc<BuildReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct GraphCache {
    entries: RwLock<HashMap<CacheKey, CachedBuild>>,
    /// Insertion order for FIFO eviction
    order: Mutex<VecDeque<CacheKey>>,
    building: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl GraphCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
            building: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// `None` when caching is disabled in the configuration
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config.max_entries))
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedBuild> {
        self.entries.read().get(key).cloned()
    }

    /// Return the cached build for `key`, running `build` at most once per key
    /// across concurrent callers. The flag is true on a cache hit.
    ///
    /// A failed build is not cached; the next caller retries it.
    pub fn get_or_build<F>(&self, key: CacheKey, build: F) -> Result<(CachedBuild, bool)>
    where
        F: FnOnce() -> Result<(UniversalGraph, BuildReport)>,
    {
        if let Some(hit) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((hit, true));
        }

        let gate = {
            let mut building = self.building.lock();
            building.entry(key.clone()).or_default().clone()
        };
        let _guard = gate.lock();

        // another caller may have finished while we waited on the gate
        if let Some(hit) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((hit, true));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let outcome = build().map(|(graph, report)| {
            let entry = CachedBuild {
                graph: Arc::new(graph),
                report: Arc::new(report),
            };
            self.insert(key.clone(), entry.clone());
            entry
        });
        // published before the gate is retired, so late callers hit the map
        self.building.lock().remove(&key);
        outcome.map(|entry| (entry, false))
    }

    fn insert(&self, key: CacheKey, entry: CachedBuild) {
        let mut order = self.order.lock();
        let mut entries = self.entries.write();
        if entries.insert(key.clone(), entry).is_none() {
            order.push_back(key);
        }
        while entries.len() > self.max_entries {
            let Some(oldest) = order.pop_front() else {
                break;
            };
            if entries.remove(&oldest).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Evicted cached graph for {}", oldest.root.display());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut order = self.order.lock();
        self.entries.write().clear();
        order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
