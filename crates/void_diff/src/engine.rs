//! Diffing engine
//!
//! [`DiffingEngine`] is the entry point for turning two trees into a patch
//! list. Per call it:
//! - Short-circuits when both arguments are the same tree
//! - Looks up a content-addressed cache
//! - Picks an algorithm by tree size and keying
//! - Optimizes and caches the result

use parking_lot::Mutex;
use std::sync::Arc;
use void_memory::PatchObjectPool;
use void_vdom::{DefaultHashComputer, HashComputer, Patch, Tree};

use crate::algorithms::{
    is_fully_keyed, AlgorithmKind, DiffAlgorithm, IncrementalDiff, KeyedDiff, SimpleDiff,
};
use crate::cache::{CacheStats, DiffCache};
use crate::config::DiffConfig;
use crate::error::{DiffError, Result};
use crate::hash_index::tree_hash;
use crate::optimizer::{PatchBatch, PatchOptimizer};
use crate::planner::KeyedPlanner;
use crate::reconciler::TreeReconciler;

/// Engine statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    /// Calls to `diff`
    pub diffs: u64,
    /// Calls answered by the same-tree fast path
    pub identity_hits: u64,
    /// Calls answered from the cache
    pub cache_hits: u64,
    /// Runs of the simple algorithm
    pub simple_runs: u64,
    /// Runs of the keyed algorithm
    pub keyed_runs: u64,
    /// Runs of the incremental algorithm
    pub incremental_runs: u64,
    /// Patches returned across all calls
    pub patches_emitted: u64,
    /// Prop updates folded by the optimizer
    pub patches_merged: u64,
}

/// Diffing entry point
pub struct DiffingEngine {
    config: DiffConfig,
    cache: DiffCache,
    optimizer: PatchOptimizer,
    reconciler: Arc<TreeReconciler>,
    simple: SimpleDiff,
    keyed: KeyedDiff,
    incremental: IncrementalDiff,
    /// Used for cache keys when a tree has no memoized hashes
    fallback_hasher: Arc<dyn HashComputer>,
    stats: Mutex<EngineStats>,
}

impl DiffingEngine {
    /// Create an engine with default configuration
    pub fn new() -> Self {
        Self::with_config(DiffConfig::default())
    }

    /// Create an engine with custom configuration
    pub fn with_config(config: DiffConfig) -> Self {
        let reconciler = Arc::new(TreeReconciler::new());
        Self {
            cache: DiffCache::new(config.cache_capacity),
            optimizer: PatchOptimizer::new().with_min_batch(config.min_optimize_batch),
            simple: SimpleDiff::new(reconciler.clone()),
            keyed: KeyedDiff::new(reconciler.clone()),
            incremental: IncrementalDiff::new(reconciler.clone()),
            reconciler,
            fallback_hasher: Arc::new(DefaultHashComputer),
            stats: Mutex::new(EngineStats::default()),
            config,
        }
    }

    /// Use a custom child matching strategy
    pub fn with_planner(self, planner: Arc<dyn KeyedPlanner>) -> Self {
        let reconciler = self.reconciler_parts().with_planner(planner);
        self.with_reconciler(reconciler)
    }

    /// Draw emitted patches from `pool`
    pub fn with_patch_pool(self, pool: Arc<PatchObjectPool>) -> Self {
        let reconciler = self.reconciler_parts().with_patch_pool(pool);
        self.with_reconciler(reconciler)
    }

    /// Hash strategy for cache keys of trees without memoized hashes
    pub fn with_hash_computer(mut self, hasher: Arc<dyn HashComputer>) -> Self {
        self.fallback_hasher = hasher;
        self
    }

    /// Replace the optimizer
    pub fn with_optimizer(mut self, optimizer: PatchOptimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Fresh reconciler carrying the current planner and pool
    fn reconciler_parts(&self) -> TreeReconciler {
        let mut reconciler = TreeReconciler::new().with_planner(self.reconciler.planner().clone());
        if let Some(pool) = self.reconciler.patch_pool() {
            reconciler = reconciler.with_patch_pool(pool.clone());
        }
        reconciler
    }

    fn with_reconciler(mut self, reconciler: TreeReconciler) -> Self {
        let reconciler = Arc::new(reconciler);
        self.simple = SimpleDiff::new(reconciler.clone());
        self.keyed = KeyedDiff::new(reconciler.clone());
        self.incremental = IncrementalDiff::new(reconciler.clone());
        self.reconciler = reconciler;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Get the shared reconciler
    pub fn reconciler(&self) -> &Arc<TreeReconciler> {
        &self.reconciler
    }

    /// Pick the algorithm for a pair of trees
    pub fn select_algorithm(&self, old: &Tree, new: &Tree) -> AlgorithmKind {
        if old.node_count().max(new.node_count()) > self.config.incremental_threshold {
            AlgorithmKind::Incremental
        } else if is_fully_keyed(old) && is_fully_keyed(new) {
            AlgorithmKind::Keyed
        } else {
            AlgorithmKind::Simple
        }
    }

    fn algorithm(&self, kind: AlgorithmKind) -> &dyn DiffAlgorithm {
        match kind {
            AlgorithmKind::Simple => &self.simple,
            AlgorithmKind::Keyed => &self.keyed,
            AlgorithmKind::Incremental => &self.incremental,
        }
    }

    /// Content-derived cache key
    pub fn cache_key(&self, old: &Tree, new: &Tree) -> String {
        let hasher = self.fallback_hasher.as_ref();
        format!(
            "{}:{}:{}:{}",
            tree_hash(old, hasher),
            tree_hash(new, hasher),
            old.key_count(),
            new.key_count()
        )
    }

    /// Compute the patches that turn `old` into `new`
    pub fn diff(&self, old: &Tree, new: &Tree) -> Result<Vec<Patch>> {
        self.stats.lock().diffs += 1;

        if old.id() == new.id() || (old.is_empty() && new.is_empty()) {
            self.stats.lock().identity_hits += 1;
            return Ok(Vec::new());
        }

        let cache_key = self.config.enable_cache.then(|| self.cache_key(old, new));
        if let Some(key) = &cache_key {
            if let Some(patches) = self.cache.get(key) {
                let mut stats = self.stats.lock();
                stats.cache_hits += 1;
                stats.patches_emitted += patches.len() as u64;
                return Ok(patches);
            }
        }

        let kind = self.select_algorithm(old, new);
        let dirty = new.is_derived_from(old).then(|| new.dirty_state());
        let algorithm = self.algorithm(kind);
        log::trace!(
            "Diffing {} -> {} nodes with {} algorithm",
            old.node_count(),
            new.node_count(),
            algorithm.name()
        );

        let patches = algorithm
            .diff(old, new, dirty.as_ref())
            .map_err(|source| DiffError::Failed {
                algorithm: algorithm.name(),
                source,
            })?;

        let mut merged = 0;
        let patches = if self.config.enable_optimizer {
            let mut batch = PatchBatch::from_patches(patches);
            self.optimizer.optimize(&mut batch);
            merged = batch.stats().patches_merged;
            batch.into_patches()
        } else {
            patches
        };

        if let Some(key) = cache_key {
            if patches.len() < self.config.max_cached_patches {
                self.cache.set(key, patches.clone());
            }
        }

        let mut stats = self.stats.lock();
        match kind {
            AlgorithmKind::Simple => stats.simple_runs += 1,
            AlgorithmKind::Keyed => stats.keyed_runs += 1,
            AlgorithmKind::Incremental => stats.incremental_runs += 1,
        }
        stats.patches_emitted += patches.len() as u64;
        stats.patches_merged += merged as u64;

        Ok(patches)
    }

    /// Get engine statistics
    pub fn stats(&self) -> EngineStats {
        self.stats.lock().clone()
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop all cached results
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl Default for DiffingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_vdom::Node;

    fn list(keys: &[&str]) -> Node {
        Node::keyed("List", "list").with_children(keys.iter().map(|k| Node::keyed("Item", *k)))
    }

    fn tree(keys: &[&str]) -> Tree {
        Tree::from_root(list(keys)).unwrap()
    }

    #[test]
    fn test_same_tree_short_circuits() {
        let engine = DiffingEngine::new();
        let t = tree(&["a"]);
        assert!(engine.diff(&t, &t).unwrap().is_empty());
        assert_eq!(engine.stats().identity_hits, 1);
        assert_eq!(engine.cache_stats().misses, 0);
    }

    #[test]
    fn test_cache_hit_on_equal_content() {
        let engine = DiffingEngine::new();
        let first = engine.diff(&tree(&["a", "b"]), &tree(&["b"])).unwrap();
        let second = engine.diff(&tree(&["a", "b"]), &tree(&["b"])).unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.stats().cache_hits, 1);
        assert_eq!(engine.stats().keyed_runs, 1);
    }

    #[test]
    fn test_cache_disabled() {
        let engine = DiffingEngine::with_config(DiffConfig::default().with_cache(false));
        engine.diff(&tree(&["a"]), &tree(&["b"])).unwrap();
        engine.diff(&tree(&["a"]), &tree(&["b"])).unwrap();
        assert_eq!(engine.stats().cache_hits, 0);
        assert_eq!(engine.cache_stats().size, 0);
    }

    #[test]
    fn test_algorithm_selection() {
        let engine = DiffingEngine::with_config(DiffConfig::default().with_incremental_threshold(3));
        let small = tree(&["a"]);
        let large = tree(&["a", "b", "c"]);
        let mixed = Tree::from_root(list(&["a"]).with_child(Node::new("Spacer"))).unwrap();

        assert_eq!(engine.select_algorithm(&small, &small), AlgorithmKind::Keyed);
        assert_eq!(engine.select_algorithm(&small, &large), AlgorithmKind::Incremental);
        assert_eq!(engine.select_algorithm(&small, &mixed), AlgorithmKind::Simple);
    }

    #[test]
    fn test_cache_key_independent_of_hashing_mode() {
        let engine = DiffingEngine::new();
        let hashed = tree(&["a"]);
        let plain = Tree::without_hashing().with_root(list(&["a"])).unwrap();
        assert_eq!(
            engine.cache_key(&hashed, &hashed),
            engine.cache_key(&plain, &plain)
        );
    }
}
