//! Bounded LRU cache of patch lists
//!
//! Keys are content-derived strings built by the engine; both `get` and
//! `set` promote the entry to most-recently-used.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use void_vdom::Patch;

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries dropped for capacity
    pub evictions: u64,
    /// Current entry count
    pub size: usize,
    /// Maximum entry count
    pub capacity: usize,
}

impl CacheStats {
    /// Fill ratio in `[0, 1]`
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.size as f64 / self.capacity as f64
        }
    }

    /// Hit ratio in `[0, 1]`
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry {
    patches: Vec<Patch>,
    tick: u64,
}

#[derive(Default)]
struct LruState {
    entries: HashMap<String, Entry>,
    /// tick -> key, oldest first
    order: BTreeMap<u64, String>,
    next_tick: u64,
    stats: CacheStats,
}

impl LruState {
    fn touch(&mut self, key: &str) -> Option<&Entry> {
        let tick = self.next_tick;
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.tick);
        entry.tick = tick;
        self.order.insert(tick, key.to_string());
        self.next_tick += 1;
        self.entries.get(key)
    }
}

/// Thread-safe LRU from cache key to patch list
pub struct DiffCache {
    capacity: usize,
    state: Mutex<LruState>,
}

impl DiffCache {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LruState {
                stats: CacheStats {
                    capacity,
                    ..Default::default()
                },
                ..Default::default()
            }),
        }
    }

    /// Look up and promote an entry
    pub fn get(&self, key: &str) -> Option<Vec<Patch>> {
        let mut state = self.state.lock();
        let found = state.touch(key).map(|entry| entry.patches.clone());
        match found {
            Some(_) => state.stats.hits += 1,
            None => state.stats.misses += 1,
        }
        found
    }

    /// Insert or replace an entry, evicting the least recently used on overflow
    pub fn set(&self, key: impl Into<String>, patches: Vec<Patch>) {
        if self.capacity == 0 {
            return;
        }
        let key = key.into();
        let mut state = self.state.lock();

        let tick = state.next_tick;
        state.next_tick += 1;
        if let Some(previous) = state.entries.insert(key.clone(), Entry { patches, tick }) {
            state.order.remove(&previous.tick);
        }
        state.order.insert(tick, key);

        while state.entries.len() > self.capacity {
            let Some((_, oldest)) = state.order.pop_first() else {
                break;
            };
            state.entries.remove(&oldest);
            state.stats.evictions += 1;
        }
        state.stats.size = state.entries.len();
    }

    /// Check for a key without promoting it
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
        state.stats.size = 0;
    }

    /// Get statistics
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats.clone()
    }
}

impl Default for DiffCache {
    fn default() -> Self {
        Self::new(1000)
    }
}
