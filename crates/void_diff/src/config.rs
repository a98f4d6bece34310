//! Diffing engine configuration

use serde::Deserialize;

/// Diffing engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Trees with more nodes than this use the incremental algorithm
    pub incremental_threshold: usize,
    /// Maximum cached patch lists
    pub cache_capacity: usize,
    /// Patch lists this long or longer are not cached
    pub max_cached_patches: usize,
    /// Batches shorter than this skip the optimizer
    pub min_optimize_batch: usize,
    /// Memoize results by content hash
    pub enable_cache: bool,
    /// Run the patch optimizer
    pub enable_optimizer: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            incremental_threshold: 1000,
            cache_capacity: 1000,
            max_cached_patches: 1000,
            min_optimize_batch: 128,
            enable_cache: true,
            enable_optimizer: true,
        }
    }
}

impl DiffConfig {
    /// Set the incremental algorithm threshold
    pub fn with_incremental_threshold(mut self, nodes: usize) -> Self {
        self.incremental_threshold = nodes;
        self
    }

    /// Set the cache capacity
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the optimizer minimum batch
    pub fn with_min_optimize_batch(mut self, size: usize) -> Self {
        self.min_optimize_batch = size;
        self
    }

    /// Enable or disable the cache
    pub fn with_cache(mut self, enable: bool) -> Self {
        self.enable_cache = enable;
        self
    }

    /// Enable or disable the optimizer
    pub fn with_optimizer(mut self, enable: bool) -> Self {
        self.enable_optimizer = enable;
        self
    }
}
