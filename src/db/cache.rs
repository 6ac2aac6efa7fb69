use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::table::Table;

struct CachedTable {
    stored_at: Instant,
    table: Arc<Table>,
}

/// Time-boxed cache of read results, shared by every data access handle.
///
/// Any successful write clears the whole cache, so the next read after a
/// commit always goes to the database.
pub struct ReadCache {
    ttl: Duration,
    entries: DashMap<String, CachedTable>,
}

impl ReadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn key(target: &str, query: &str, params_key: &str) -> String {
        format!("{target}\u{1f}{query}\u{1f}{params_key}")
    }

    pub fn get(&self, key: &str) -> Option<Arc<Table>> {
        let hit = self.entries.get(key).and_then(|entry| {
            (entry.stored_at.elapsed() < self.ttl).then(|| entry.table.clone())
        });
        if hit.is_none() {
            // Expired entries are dropped lazily on lookup.
            self.entries
                .remove_if(key, |_, entry| entry.stored_at.elapsed() >= self.ttl);
        }
        hit
    }

    pub fn insert(&self, key: String, table: Arc<Table>) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.insert(
            key,
            CachedTable {
                stored_at: Instant::now(),
                table,
            },
        );
    }

    pub fn clear(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        debug!(entries = dropped, "Read cache cleared.");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
