//! Runtime facade
//!
//! [`VdomRuntime`] wires one diffing engine, one patcher and one effect
//! scheduler around a shared patch pool. Patches the engine emits are drawn
//! from the pool and returned to it once applied.

use std::sync::Arc;
use void_diff::{DiffingEngine, Result as DiffResult};
use void_memory::PatchObjectPool;
use void_vdom::{BindingRegistry, Patch, Tree};

use crate::config::RuntimeConfig;
use crate::lifecycle::ComponentLifecycle;
use crate::patcher::{ApplyReport, TreePatcher};
use crate::scheduler::EffectScheduler;

/// Diff, apply and effect scheduling for one execution context
pub struct VdomRuntime {
    engine: DiffingEngine,
    patcher: TreePatcher,
    scheduler: EffectScheduler,
    pool: Arc<PatchObjectPool>,
}

impl VdomRuntime {
    /// Create a runtime with default configuration
    pub fn new() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }

    /// Create a runtime from configuration
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let pool = Arc::new(PatchObjectPool::with_config(config.pool.clone()));
        log::debug!(
            "Starting VDOM runtime (incremental above {} nodes, cache {})",
            config.diff.incremental_threshold,
            config.diff.cache_capacity
        );
        Self {
            engine: DiffingEngine::with_config(config.diff.clone()).with_patch_pool(pool.clone()),
            patcher: TreePatcher::new().with_patch_pool(pool.clone()),
            scheduler: EffectScheduler::new(),
            pool,
        }
    }

    /// Track host objects in `registry`
    pub fn with_registry(mut self, registry: Arc<dyn BindingRegistry>) -> Self {
        self.patcher = std::mem::take(&mut self.patcher).with_registry(registry);
        self
    }

    /// Drive component lifecycle callbacks
    pub fn with_lifecycle(mut self, lifecycle: Arc<ComponentLifecycle>) -> Self {
        self.patcher = std::mem::take(&mut self.patcher).with_lifecycle(lifecycle);
        self
    }

    /// The diffing engine
    pub fn engine(&self) -> &DiffingEngine {
        &self.engine
    }

    /// The patcher
    pub fn patcher(&self) -> &TreePatcher {
        &self.patcher
    }

    /// The effect scheduler
    pub fn scheduler(&self) -> &EffectScheduler {
        &self.scheduler
    }

    /// The shared patch pool
    pub fn pool(&self) -> &Arc<PatchObjectPool> {
        &self.pool
    }

    /// Compute the patches that turn `old` into `new`
    pub fn diff(&self, old: &Tree, new: &Tree) -> DiffResult<Vec<Patch>> {
        self.engine.diff(old, new)
    }

    /// Apply patches to a live tree inside one commit
    pub fn apply(&self, tree: &mut Tree, patches: Vec<Patch>) -> ApplyReport {
        self.patcher.apply(tree, patches, &self.scheduler)
    }

    /// Bring `live` in line with `next`
    pub fn reconcile(&self, live: &mut Tree, next: &Tree) -> DiffResult<ApplyReport> {
        let patches = self.diff(live, next)?;
        Ok(self.apply(live, patches))
    }
}

impl Default for VdomRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_vdom::{Node, PropsDelta};

    #[test]
    fn test_reconcile_converges() {
        let runtime = VdomRuntime::new();
        let mut live = Tree::from_root(
            Node::keyed("List", "list")
                .with_child(Node::keyed("Item", "a"))
                .with_child(Node::keyed("Item", "b")),
        )
        .unwrap();
        let next = Tree::from_root(
            Node::keyed("List", "list")
                .with_child(Node::keyed("Item", "b").with_prop("done", true))
                .with_child(Node::keyed("Item", "c")),
        )
        .unwrap();

        let report = runtime.reconcile(&mut live, &next).unwrap();
        assert_eq!(report.applied, 3);
        assert_eq!(live.to_node(), next.to_node());
        assert!(runtime.reconcile(&mut live, &next).unwrap().applied == 0);
    }

    #[test]
    fn test_edit_a_copy_then_reconcile() {
        let runtime = VdomRuntime::new();
        let mut live = Tree::from_root(Node::keyed("Form", "form").with_child(Node::keyed("Input", "name")))
            .unwrap();

        let mut draft = live.clone();
        draft
            .update_node_props("name", &PropsDelta::new().with_set("value", "Ada"))
            .unwrap();

        let report = runtime.reconcile(&mut live, &draft).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(live.to_node(), draft.to_node());
        assert_eq!(runtime.pool().stats().returned, 1);
    }
}
