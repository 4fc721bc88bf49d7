//! An optional, short-TTL in-memory cache memoizing `(filepath) ->
//! (disk_hash, exists, timestamp)` (spec.md section 4.6). Never serves a
//! stale entry past TTL; never influences correctness, only latency.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    disk_hash: Option<String>,
    exists: bool,
    cached_at: Instant,
}

pub struct EtvCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl EtvCache {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            ttl: Duration::from_millis(ttl_ms),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Disabled cache: every lookup misses.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn get(&self, filepath: &str) -> Option<(Option<String>, bool)> {
        let entries = self.entries.lock();
        let entry = entries.get(filepath)?;
        if entry.cached_at.elapsed() > self.ttl {
            return None;
        }
        Some((entry.disk_hash.clone(), entry.exists))
    }

    pub fn put(&self, filepath: &str, disk_hash: Option<String>, exists: bool) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.lock().insert(
            filepath.to_string(),
            CacheEntry {
                disk_hash,
                exists,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, filepath: &str) {
        self.entries.lock().remove(filepath);
    }
}
