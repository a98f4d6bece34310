//! Patch object pool
//!
//! One [`ObjectPool`] per patch kind, keyed by the kind's string name. The
//! reconciler draws blank patches from here and the patcher hands applied
//! patches back, so steady-state diff/apply cycles reuse key strings and
//! delta maps instead of reallocating them.

use std::collections::HashMap;
use thiserror::Error;
use void_vdom::{Patch, PatchKind};

use crate::pool::{ObjectPool, PoolConfig, PoolStats, Poolable, Pooled};

/// Pool errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// No pool exists for the requested kind name
    #[error("Unknown patch kind '{0}'")]
    UnknownKind(String),
}

impl Poolable for Patch {
    fn reset(&mut self) {
        self.clear();
    }
}

/// Patch on loan from a [`PatchObjectPool`]
pub type PooledPatch<'a> = Pooled<'a, Patch>;

/// Per-kind pools of reusable [`Patch`] values
pub struct PatchObjectPool {
    pools: HashMap<&'static str, ObjectPool<Patch>>,
    config: PoolConfig,
}

impl PatchObjectPool {
    /// Create pools for every patch kind with the default configuration
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create pools for every patch kind
    pub fn with_config(config: PoolConfig) -> Self {
        let pools = PatchKind::ALL
            .into_iter()
            .map(|kind| {
                let pool = ObjectPool::new(move || Patch::blank(kind)).with_config(config.clone());
                (kind.as_str(), pool)
            })
            .collect();
        Self { pools, config }
    }

    /// Get the configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Take a blank patch of the given kind
    pub fn acquire(&self, kind: PatchKind) -> Patch {
        match self.pools.get(kind.as_str()) {
            Some(pool) => pool.acquire(),
            None => Patch::blank(kind),
        }
    }

    /// Take a blank patch by kind name
    pub fn acquire_by_name(&self, kind: &str) -> Result<Patch, PoolError> {
        self.pools
            .get(kind)
            .map(ObjectPool::acquire)
            .ok_or_else(|| PoolError::UnknownKind(kind.to_string()))
    }

    /// Take a blank patch that returns itself to the pool when dropped
    pub fn guard(&self, kind: PatchKind) -> Option<PooledPatch<'_>> {
        self.pools.get(kind.as_str()).map(ObjectPool::guard)
    }

    /// Return a patch to the pool of its kind
    pub fn release(&self, patch: Patch) -> bool {
        match self.pools.get(patch.kind().as_str()) {
            Some(pool) => pool.release(patch),
            None => false,
        }
    }

    /// Return a batch of patches, counting how many were pooled
    pub fn release_all(&self, patches: impl IntoIterator<Item = Patch>) -> usize {
        patches
            .into_iter()
            .map(|patch| self.release(patch))
            .filter(|pooled| *pooled)
            .count()
    }

    /// Run cleanup on every pool
    pub fn cleanup(&self) -> usize {
        let evicted: usize = self.pools.values().map(ObjectPool::cleanup).sum();
        log::debug!("Patch pool cleanup evicted {} patches", evicted);
        evicted
    }

    /// Statistics for one kind
    pub fn stats_for(&self, kind: PatchKind) -> PoolStats {
        self.pools
            .get(kind.as_str())
            .map(ObjectPool::stats)
            .unwrap_or_default()
    }

    /// Aggregate statistics across kinds
    pub fn stats(&self) -> PoolStats {
        let mut total = PoolStats::default();
        for pool in self.pools.values() {
            total.accumulate(&pool.stats());
        }
        total
    }
}

impl Default for PatchObjectPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_vdom::{Node, PropsDelta};

    #[test]
    fn test_cycles_reuse_one_patch() {
        let pool = PatchObjectPool::new();

        for i in 0..25 {
            let mut patch = pool.acquire(PatchKind::MoveNode);
            if let Patch::MoveNode { key, new_index } = &mut patch {
                key.push_str("row");
                *new_index = i;
            }
            pool.release(patch);
        }

        let stats = pool.stats_for(PatchKind::MoveNode);
        assert_eq!(stats.created, 1);
        assert_eq!(stats.reused, 24);
        assert_eq!(pool.acquire(PatchKind::MoveNode), Patch::blank(PatchKind::MoveNode));
    }

    #[test]
    fn test_released_patch_is_reset() {
        let pool = PatchObjectPool::new();
        pool.release(Patch::add_node(
            Node::keyed("Item", "a").with_prop("x", 1),
            "list",
            4,
        ));
        pool.release(Patch::update_props("a", PropsDelta::new().with_set("x", 2)));

        assert_eq!(pool.acquire(PatchKind::AddNode), Patch::blank(PatchKind::AddNode));
        assert_eq!(
            pool.acquire(PatchKind::UpdateProps),
            Patch::blank(PatchKind::UpdateProps)
        );
    }

    #[test]
    fn test_kinds_are_isolated() {
        let pool = PatchObjectPool::new();
        pool.release(Patch::remove_node("a"));

        let _ = pool.acquire(PatchKind::MoveNode);
        assert_eq!(pool.stats_for(PatchKind::RemoveNode).pool_size, 1);
        assert_eq!(pool.stats_for(PatchKind::MoveNode).created, 1);

        let total = pool.stats();
        assert_eq!(total.created, 1);
        assert_eq!(total.returned, 1);
    }

    #[test]
    fn test_acquire_by_name() {
        let pool = PatchObjectPool::new();
        assert_eq!(
            pool.acquire_by_name("replace_root").unwrap(),
            Patch::blank(PatchKind::ReplaceRoot)
        );
        assert_eq!(
            pool.acquire_by_name("teleport").unwrap_err(),
            PoolError::UnknownKind("teleport".into())
        );
    }

    #[test]
    fn test_guard_returns_patch() {
        let pool = PatchObjectPool::new();
        {
            let mut guard = pool.guard(PatchKind::RemoveNode).unwrap();
            if let Patch::RemoveNode { key } = &mut *guard {
                key.push_str("gone");
            }
        }
        assert_eq!(pool.stats_for(PatchKind::RemoveNode).returned, 1);
        assert_eq!(pool.release_all(vec![Patch::remove_node("a"), Patch::move_node("b", 1)]), 2);
    }
}
