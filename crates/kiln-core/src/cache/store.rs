use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

use super::CacheKey;
use crate::diagnostics::Diagnostic;

/// One cached compilation outcome. Success entries carry the compiled
/// stylesheet; failure entries carry the compiler's diagnostic so a broken
/// source is not recompiled until its content (and thus its key) changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,

    /// Compiled stylesheet text; `None` for failure entries
    pub css: Option<String>,

    /// Source map JSON, when generated
    pub source_map: Option<String>,

    /// Transitive dependency paths, in import order
    pub dependencies: Vec<PathBuf>,

    /// The compiler's diagnostic; `None` for success entries
    pub diagnostic: Option<Diagnostic>,

    /// Unix timestamp when cached (for diagnostics)
    pub cached_at: u64,
}

impl CacheEntry {
    pub fn success(
        key: CacheKey,
        css: String,
        source_map: Option<String>,
        dependencies: Vec<PathBuf>,
    ) -> Self {
        Self {
            key,
            css: Some(css),
            source_map,
            dependencies,
            diagnostic: None,
            cached_at: now(),
        }
    }

    pub fn failure(key: CacheKey, diagnostic: Diagnostic, dependencies: Vec<PathBuf>) -> Self {
        Self {
            key,
            css: None,
            source_map: None,
            dependencies,
            diagnostic: Some(diagnostic),
            cached_at: now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.diagnostic.is_none()
    }

    /// Equality excluding the timestamp; used for idempotent stores.
    fn same_output(&self, other: &CacheEntry) -> bool {
        self.key == other.key
            && self.css == other.css
            && self.source_map == other.source_map
            && self.dependencies == other.dependencies
            && self.diagnostic == other.diagnostic
    }
}

fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// In-memory content-addressable store, shared across the worker pool for
/// one batch. Lookups and stores for distinct keys are independent; the
/// in-flight table serializes concurrent requesters for the same key onto
/// a single compilation.
#[derive(Debug, Default)]
pub struct CompileCache {
    entries: Mutex<FxHashMap<CacheKey, CacheEntry>>,
    in_flight: Mutex<FxHashMap<CacheKey, Arc<OnceLock<CacheEntry>>>>,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CacheEntry>) -> Self {
        let map = entries
            .into_iter()
            .map(|entry| (entry.key.clone(), entry))
            .collect();
        Self {
            entries: Mutex::new(map),
            in_flight: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Idempotent: storing an entry equal to the existing one is a no-op.
    /// A differing entry for an existing key refreshes it, which well-formed
    /// content hashing never produces.
    pub fn store(&self, entry: CacheEntry) {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&entry.key) {
            Some(existing) if existing.same_output(&entry) => {}
            Some(_) => {
                debug!(key = %entry.key, "refreshing cache entry with differing content");
                entries.insert(entry.key.clone(), entry);
            }
            None => {
                entries.insert(entry.key.clone(), entry);
            }
        }
    }

    /// At most one `compute` runs per distinct key, batch-wide. The first
    /// requester for a key runs it; concurrent requesters block on the
    /// in-flight cell and share the result. The per-key wait lasts exactly
    /// as long as the one compilation it protects.
    pub fn get_or_compute<F>(&self, key: &CacheKey, compute: F) -> CacheEntry
    where
        F: FnOnce() -> CacheEntry,
    {
        if let Some(entry) = self.lookup(key) {
            return entry;
        }

        let (cell, is_leader) = {
            let mut in_flight = self.in_flight.lock().unwrap();
            // A finished leader stores its entry before retiring the cell,
            // so a requester arriving between the lookup above and this
            // lock must re-check the store rather than claim leadership.
            if let Some(entry) = self.entries.lock().unwrap().get(key).cloned() {
                return entry;
            }
            match in_flight.get(key) {
                Some(cell) => (Arc::clone(cell), false),
                None => {
                    let cell = Arc::new(OnceLock::new());
                    in_flight.insert(key.clone(), Arc::clone(&cell));
                    (cell, true)
                }
            }
        };

        if is_leader {
            let entry = compute();
            self.store(entry.clone());
            // Publish before retiring the cell so a requester that found it
            // never misses the value.
            let _ = cell.set(entry.clone());
            self.in_flight.lock().unwrap().remove(key);
            entry
        } else {
            cell.wait().clone()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// All current entries, for persisting at the end of a batch.
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        self.entries.lock().unwrap().values().cloned().collect()
    }
}
