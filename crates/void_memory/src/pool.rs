//! Reusable object pool
//!
//! Objects are reset when they are released and handed out again by the
//! next [`acquire`](ObjectPool::acquire). The free list is capped by
//! [`PoolConfig::max_pool_size`]; releases beyond the cap are dropped, and
//! [`cleanup`](ObjectPool::cleanup) evicts objects idle for longer than
//! [`PoolConfig::max_idle_secs`].

use parking_lot::Mutex;
use serde::Deserialize;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

/// Objects that can be returned to a pool
pub trait Poolable {
    /// Restore the object to its freshly-created state
    fn reset(&mut self);
}

/// Pool configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum idle objects kept per pool
    pub max_pool_size: usize,
    /// Idle objects older than this are evicted on cleanup
    pub max_idle_secs: u64,
    /// Minimum time between automatic cleanups
    pub cleanup_interval_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 2000,
            max_idle_secs: 300,
            cleanup_interval_secs: 60,
        }
    }
}

impl PoolConfig {
    /// Set the free list cap
    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Set the idle eviction age
    pub fn with_max_idle_secs(mut self, secs: u64) -> Self {
        self.max_idle_secs = secs;
        self
    }

    /// Set the automatic cleanup interval
    pub fn with_cleanup_interval_secs(mut self, secs: u64) -> Self {
        self.cleanup_interval_secs = secs;
        self
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolStats {
    /// Objects built by the factory
    pub created: u64,
    /// Acquires served from the free list
    pub reused: u64,
    /// Releases that went back to the free list
    pub returned: u64,
    /// Objects dropped by the cap or by cleanup
    pub evicted: u64,
    /// Idle objects currently held
    pub pool_size: usize,
    /// `reused / (created + reused)`
    pub hit_rate: f64,
}

impl PoolStats {
    /// Add another pool's counters into this one
    pub fn accumulate(&mut self, other: &PoolStats) {
        self.created += other.created;
        self.reused += other.reused;
        self.returned += other.returned;
        self.evicted += other.evicted;
        self.pool_size += other.pool_size;
        self.update_hit_rate();
    }

    fn update_hit_rate(&mut self) {
        let total = self.created + self.reused;
        self.hit_rate = if total == 0 {
            0.0
        } else {
            self.reused as f64 / total as f64
        };
    }
}

struct Idle<T> {
    value: T,
    since: Instant,
}

struct PoolState<T> {
    free: Vec<Idle<T>>,
    stats: PoolStats,
    last_cleanup: Instant,
}

/// Thread-safe pool of reusable objects
pub struct ObjectPool<T> {
    factory: Box<dyn Fn() -> T + Send + Sync>,
    config: PoolConfig,
    state: Mutex<PoolState<T>>,
}

impl<T: Poolable> ObjectPool<T> {
    /// Create a pool with the default configuration
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            config: PoolConfig::default(),
            state: Mutex::new(PoolState {
                free: Vec::new(),
                stats: PoolStats::default(),
                last_cleanup: Instant::now(),
            }),
        }
    }

    /// Set the configuration
    pub fn with_config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Take an object from the free list, or build a new one
    pub fn acquire(&self) -> T {
        {
            let mut state = self.state.lock();
            if let Some(idle) = state.free.pop() {
                state.stats.reused += 1;
                state.stats.pool_size = state.free.len();
                state.stats.update_hit_rate();
                return idle.value;
            }
            state.stats.created += 1;
            state.stats.update_hit_rate();
        }
        (self.factory)()
    }

    /// Reset an object and return it to the free list.
    ///
    /// Returns `false` if the pool was full and the object was dropped.
    pub fn release(&self, mut value: T) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();

        let pooled = if state.free.len() < self.config.max_pool_size {
            value.reset();
            state.free.push(Idle { value, since: now });
            state.stats.returned += 1;
            true
        } else {
            state.stats.evicted += 1;
            false
        };
        state.stats.pool_size = state.free.len();

        let interval = Duration::from_secs(self.config.cleanup_interval_secs);
        if now.duration_since(state.last_cleanup) >= interval {
            Self::cleanup_locked(&mut state, &self.config, now);
        }
        pooled
    }

    /// Acquire wrapped in a guard that releases on drop
    pub fn guard(&self) -> Pooled<'_, T> {
        Pooled {
            pool: self,
            value: Some(self.acquire()),
        }
    }

    /// Evict idle objects and trim to the configured maximum
    pub fn cleanup(&self) -> usize {
        let mut state = self.state.lock();
        Self::cleanup_locked(&mut state, &self.config, Instant::now())
    }

    fn cleanup_locked(state: &mut PoolState<T>, config: &PoolConfig, now: Instant) -> usize {
        let max_idle = Duration::from_secs(config.max_idle_secs);
        let before = state.free.len();

        state
            .free
            .retain(|idle| now.duration_since(idle.since) <= max_idle);
        state.free.truncate(config.max_pool_size);

        let evicted = before - state.free.len();
        state.stats.evicted += evicted as u64;
        state.stats.pool_size = state.free.len();
        state.last_cleanup = now;
        if evicted > 0 {
            log::debug!("Pool cleanup evicted {} idle objects", evicted);
        }
        evicted
    }

    /// Number of idle objects
    pub fn len(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Check if no idle objects are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every idle object
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let dropped = state.free.len() as u64;
        state.free.clear();
        state.stats.evicted += dropped;
        state.stats.pool_size = 0;
    }

    /// Get statistics
    pub fn stats(&self) -> PoolStats {
        self.state.lock().stats.clone()
    }
}

/// Object on loan from an [`ObjectPool`]; released when dropped
pub struct Pooled<'a, T: Poolable> {
    pool: &'a ObjectPool<T>,
    value: Option<T>,
}

impl<T: Poolable> Pooled<'_, T> {
    /// Keep the object instead of returning it to the pool
    pub fn into_inner(mut self) -> Option<T> {
        self.value.take()
    }
}

impl<T: Poolable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("pooled value is only taken by into_inner"),
        }
    }
}

impl<T: Poolable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("pooled value is only taken by into_inner"),
        }
    }
}

impl<T: Poolable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.release(value);
        }
    }
}
