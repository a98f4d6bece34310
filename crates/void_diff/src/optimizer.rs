//! Patch batch optimization
//!
//! Large patch lists go through three passes:
//! - Merge repeated prop updates for the same key (later values win)
//! - Drop prop updates whose delta is empty
//! - Stable-sort by patch kind so phases stay grouped
//!
//! Structural patches are never merged or reordered among themselves.

use std::collections::HashMap;
use void_vdom::Patch;

/// A list of patches with optimization statistics
#[derive(Debug, Clone, Default)]
pub struct PatchBatch {
    patches: Vec<Patch>,
    stats: OptimizerStats,
}

impl PatchBatch {
    /// Create a new empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a list of patches
    pub fn from_patches(patches: Vec<Patch>) -> Self {
        Self {
            stats: OptimizerStats {
                original_count: patches.len(),
                optimized_count: patches.len(),
                ..Default::default()
            },
            patches,
        }
    }

    /// Add a patch to the batch
    pub fn add(&mut self, patch: Patch) {
        self.patches.push(patch);
        self.stats.original_count += 1;
    }

    /// Get the patches
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Consume the batch
    pub fn into_patches(self) -> Vec<Patch> {
        self.patches
    }

    /// Get statistics
    pub fn stats(&self) -> &OptimizerStats {
        &self.stats
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Get the number of patches
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Fold repeated `UpdateProps` for one key into the first occurrence.
    ///
    /// Any add, remove or root replacement acts as a barrier: updates on
    /// either side of it are never combined.
    fn merge_redundant(&mut self) {
        let mut first_update: HashMap<String, usize> = HashMap::new();
        let mut out: Vec<Patch> = Vec::with_capacity(self.patches.len());

        for patch in self.patches.drain(..) {
            match patch {
                Patch::UpdateProps { key, delta } => match first_update.get(&key) {
                    Some(&index) => {
                        if let Patch::UpdateProps { delta: existing, .. } = &mut out[index] {
                            existing.merge(delta);
                        }
                        self.stats.patches_merged += 1;
                    }
                    None => {
                        first_update.insert(key.clone(), out.len());
                        out.push(Patch::UpdateProps { key, delta });
                    }
                },
                Patch::MoveNode { .. } => out.push(patch),
                structural => {
                    first_update.clear();
                    out.push(structural);
                }
            }
        }

        self.patches = out;
    }

    /// Remove prop updates that no longer change anything
    fn eliminate_empty(&mut self) {
        let before = self.patches.len();
        self.patches
            .retain(|patch| !matches!(patch, Patch::UpdateProps { delta, .. } if delta.is_empty()));
        self.stats.patches_eliminated += before - self.patches.len();
    }

    /// Sort patches into phase order
    fn sort_optimal(&mut self) {
        // sort_by_key is stable
        self.patches.sort_by_key(|patch| patch.kind().order());
    }
}

/// Statistics about batch optimization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizerStats {
    /// Original patch count
    pub original_count: usize,
    /// Optimized patch count
    pub optimized_count: usize,
    /// Number of prop updates folded into an earlier one
    pub patches_merged: usize,
    /// Number of empty prop updates dropped
    pub patches_eliminated: usize,
}

impl OptimizerStats {
    /// Get the optimization ratio (0.0 = no optimization, 1.0 = everything removed)
    pub fn optimization_ratio(&self) -> f64 {
        if self.original_count == 0 {
            0.0
        } else {
            1.0 - (self.optimized_count as f64 / self.original_count as f64)
        }
    }
}

/// Patch optimizer applied to large batches
#[derive(Debug, Clone)]
pub struct PatchOptimizer {
    /// Batches shorter than this pass through untouched
    min_batch: usize,
    enable_merge: bool,
    enable_eliminate: bool,
    enable_sort: bool,
}

impl PatchOptimizer {
    /// Create a new optimizer with all passes enabled
    pub fn new() -> Self {
        Self {
            min_batch: 128,
            enable_merge: true,
            enable_eliminate: true,
            enable_sort: true,
        }
    }

    /// Disable all passes
    pub fn disabled() -> Self {
        Self {
            min_batch: 128,
            enable_merge: false,
            enable_eliminate: false,
            enable_sort: false,
        }
    }

    /// Set the minimum batch size that gets optimized
    pub fn with_min_batch(mut self, size: usize) -> Self {
        self.min_batch = size;
        self
    }

    /// Set whether to merge repeated prop updates
    pub fn with_merge(mut self, enable: bool) -> Self {
        self.enable_merge = enable;
        self
    }

    /// Set whether to drop empty prop updates
    pub fn with_eliminate(mut self, enable: bool) -> Self {
        self.enable_eliminate = enable;
        self
    }

    /// Set whether to sort by patch kind
    pub fn with_sort(mut self, enable: bool) -> Self {
        self.enable_sort = enable;
        self
    }

    /// Minimum batch size
    pub fn min_batch(&self) -> usize {
        self.min_batch
    }

    /// Optimize a batch in place
    pub fn optimize(&self, batch: &mut PatchBatch) {
        if batch.len() < self.min_batch {
            batch.stats.optimized_count = batch.len();
            return;
        }

        if self.enable_merge {
            batch.merge_redundant();
        }

        if self.enable_eliminate {
            batch.eliminate_empty();
        }

        if self.enable_sort {
            batch.sort_optimal();
        }

        batch.stats.optimized_count = batch.len();
        log::trace!(
            "Optimized patch batch: {} -> {} patches",
            batch.stats.original_count,
            batch.stats.optimized_count
        );
    }

    /// Optimize a plain patch list
    pub fn optimize_patches(&self, patches: Vec<Patch>) -> Vec<Patch> {
        let mut batch = PatchBatch::from_patches(patches);
        self.optimize(&mut batch);
        batch.into_patches()
    }
}

impl Default for PatchOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_vdom::{Node, PatchKind, PropsDelta};

    fn update(key: &str, prop: &str, value: i64) -> Patch {
        Patch::update_props(key, PropsDelta::new().with_set(prop, value))
    }

    #[test]
    fn test_small_batches_untouched() {
        let optimizer = PatchOptimizer::new();
        let patches = vec![update("a", "x", 1), update("a", "x", 2)];
        assert_eq!(optimizer.optimize_patches(patches.clone()), patches);
    }

    #[test]
    fn test_merge_prop_updates() {
        let optimizer = PatchOptimizer::new().with_min_batch(0);
        let mut batch = PatchBatch::from_patches(vec![
            update("a", "x", 1),
            Patch::move_node("b", 0),
            update("a", "x", 2),
            update("a", "y", 3),
        ]);
        optimizer.optimize(&mut batch);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.stats().patches_merged, 2);
        let Patch::UpdateProps { key, delta } = &batch.patches()[1] else {
            panic!("expected UpdateProps after sorting");
        };
        assert_eq!(key, "a");
        assert_eq!(delta, &PropsDelta::new().with_set("x", 2).with_set("y", 3));
    }

    #[test]
    fn test_structural_patch_is_merge_barrier() {
        let optimizer = PatchOptimizer::new().with_min_batch(0).with_sort(false);
        let patches = vec![
            update("a", "x", 1),
            Patch::remove_node("a"),
            Patch::add_node(Node::keyed("Item", "a"), "root", 0),
            update("a", "x", 2),
        ];
        let optimized = optimizer.optimize_patches(patches.clone());
        assert_eq!(optimized, patches);
    }

    #[test]
    fn test_eliminate_empty_updates() {
        let optimizer = PatchOptimizer::new().with_min_batch(0);
        let mut batch = PatchBatch::from_patches(vec![
            Patch::update_props("a", PropsDelta::new()),
            Patch::remove_node("b"),
        ]);
        optimizer.optimize(&mut batch);

        assert_eq!(batch.patches(), &[Patch::remove_node("b")]);
        assert_eq!(batch.stats().patches_eliminated, 1);
        assert!((batch.stats().optimization_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_sort_is_stable_by_kind() {
        let optimizer = PatchOptimizer::new().with_min_batch(0).with_merge(false);
        let optimized = optimizer.optimize_patches(vec![
            update("u", "x", 1),
            Patch::move_node("m2", 1),
            Patch::remove_node("r"),
            Patch::move_node("m1", 0),
        ]);

        let kinds: Vec<_> = optimized.iter().map(Patch::kind).collect();
        assert_eq!(
            kinds,
            vec![
                PatchKind::RemoveNode,
                PatchKind::MoveNode,
                PatchKind::MoveNode,
                PatchKind::UpdateProps
            ]
        );
        // moves keep their relative order
        assert_eq!(optimized[1].key(), Some("m2"));
        assert_eq!(optimized[2].key(), Some("m1"));
    }
}
