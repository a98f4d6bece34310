//! Patch application
//!
//! [`TreePatcher`] is the bridge between the diffing engine and the live
//! tree. It applies a patch list in order inside one scheduler commit:
//! - Tree mutations go through the tree's key-addressed API
//! - Host objects are created, updated, moved and destroyed through the
//!   tree's [`HostHooks`](void_vdom::HostHooks) and the binding registry
//! - Component lifecycle callbacks are queued, never run inline
//!
//! A patch naming a missing key is logged and skipped. Host failures are
//! logged and counted; the rest of the batch still applies.

use std::sync::Arc;
use void_memory::PatchObjectPool;
use void_vdom::{
    BindingRegistry, HostError, HostHandle, Node, NodeId, Patch, PropsDelta, Tree, VdomError,
};

use crate::lifecycle::ComponentLifecycle;
use crate::scheduler::EffectScheduler;

/// Outcome of applying a patch list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Patches applied to the tree
    pub applied: usize,
    /// Patches skipped (missing key, duplicate key)
    pub skipped: usize,
    /// Host hook or destroy failures
    pub host_errors: usize,
}

impl ApplyReport {
    /// True when every patch applied without host errors
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.host_errors == 0
    }
}

/// Applies patch lists to live trees
#[derive(Default)]
pub struct TreePatcher {
    registry: Option<Arc<dyn BindingRegistry>>,
    lifecycle: Option<Arc<ComponentLifecycle>>,
    pool: Option<Arc<PatchObjectPool>>,
}

impl TreePatcher {
    /// Create a patcher without host registry, lifecycle or pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Track host objects in `registry`
    pub fn with_registry(mut self, registry: Arc<dyn BindingRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Drive component lifecycle callbacks
    pub fn with_lifecycle(mut self, lifecycle: Arc<ComponentLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Return applied patches to `pool`
    pub fn with_patch_pool(mut self, pool: Arc<PatchObjectPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// The binding registry, if any
    pub fn registry(&self) -> Option<&Arc<dyn BindingRegistry>> {
        self.registry.as_ref()
    }

    /// The lifecycle tracker, if any
    pub fn lifecycle(&self) -> Option<&Arc<ComponentLifecycle>> {
        self.lifecycle.as_ref()
    }

    /// Apply `patches` to `tree` inside one commit, then reset the tree's
    /// dirty tracking
    pub fn apply(&self, tree: &mut Tree, patches: Vec<Patch>, scheduler: &EffectScheduler) -> ApplyReport {
        let mut report = ApplyReport::default();
        scheduler.begin_commit();

        for patch in patches {
            log::trace!("Applying {} patch", patch.kind());
            match self.apply_patch(tree, &patch, scheduler, &mut report) {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    log::warn!("Skipping {} patch: {}", patch.kind(), err);
                    report.skipped += 1;
                }
            }
            if let Some(pool) = &self.pool {
                pool.release(patch);
            }
        }

        scheduler.end_commit();
        tree.reset_dirty_tracking();

        if !report.is_clean() {
            log::debug!(
                "Patch batch applied with {} skipped and {} host errors",
                report.skipped,
                report.host_errors
            );
        }
        report
    }

    /// Apply a single patch
    fn apply_patch(
        &self,
        tree: &mut Tree,
        patch: &Patch,
        scheduler: &EffectScheduler,
        report: &mut ApplyReport,
    ) -> Result<(), VdomError> {
        match patch {
            Patch::AddNode {
                node,
                parent_key,
                index,
            } => self.apply_add(tree, node, parent_key, *index, scheduler, report),
            Patch::RemoveNode { key } => self.apply_remove(tree, key, scheduler, report),
            Patch::UpdateProps { key, delta } => self.apply_update(tree, key, delta, scheduler, report),
            Patch::ReplaceRoot { root } => self.apply_replace_root(tree, root.as_ref(), scheduler, report),
            Patch::MoveNode { key, new_index } => self.apply_move(tree, key, *new_index, report),
        }
    }

    fn apply_add(
        &self,
        tree: &mut Tree,
        node: &Node,
        parent_key: &str,
        index: usize,
        scheduler: &EffectScheduler,
        report: &mut ApplyReport,
    ) -> Result<(), VdomError> {
        // New, not changed: no dirty marks
        let id = tree.attach_node(node.clone(), Some(parent_key), index, false)?;
        self.bind_subtree(tree, id, report);
        self.mount_subtree(tree, id, scheduler);
        Ok(())
    }

    fn apply_remove(
        &self,
        tree: &mut Tree,
        key: &str,
        scheduler: &EffectScheduler,
        report: &mut ApplyReport,
    ) -> Result<(), VdomError> {
        let keys = subtree_keys(tree, key)?;
        self.unbind_keys(tree, &keys, report);
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.unmount_keys(&keys, scheduler);
        }
        tree.detach_subtree(key)?;
        Ok(())
    }

    fn apply_update(
        &self,
        tree: &mut Tree,
        key: &str,
        delta: &PropsDelta,
        scheduler: &EffectScheduler,
        report: &mut ApplyReport,
    ) -> Result<(), VdomError> {
        tree.update_node_props(key, delta)?;

        if let (Some(hooks), Some(host)) = (tree.host_hooks(), self.bound_host(tree, key)) {
            if let Err(err) = hooks.apply_props(&host, delta) {
                host_failure(report, key, &err);
            }
        }
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.update(key, delta, scheduler);
        }
        Ok(())
    }

    fn apply_replace_root(
        &self,
        tree: &mut Tree,
        root: Option<&Node>,
        scheduler: &EffectScheduler,
        report: &mut ApplyReport,
    ) -> Result<(), VdomError> {
        let old_keys: Vec<String> = tree
            .root()
            .map(|r| r.subtree_keys().into_iter().map(String::from).collect())
            .unwrap_or_default();

        tree.set_root(root.cloned())?;

        self.unbind_keys(tree, &old_keys, report);
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.unmount_keys(&old_keys, scheduler);
        }
        if let Some(id) = tree.root_id() {
            self.bind_subtree(tree, id, report);
            self.mount_subtree(tree, id, scheduler);
        }
        Ok(())
    }

    fn apply_move(
        &self,
        tree: &mut Tree,
        key: &str,
        new_index: usize,
        report: &mut ApplyReport,
    ) -> Result<(), VdomError> {
        tree.move_node(key, new_index)?;
        // The tree clamps the index; report where the node actually went
        let placed = tree
            .lookup(key)
            .and_then(|node| node.index_in_parent())
            .unwrap_or(new_index);

        if let (Some(hooks), Some(host)) = (tree.host_hooks(), self.bound_host(tree, key)) {
            if let Err(err) = hooks.move_to(&host, placed) {
                host_failure(report, key, &err);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Host bindings
    // ========================================================================

    fn bound_host(&self, tree: &Tree, key: &str) -> Option<HostHandle> {
        self.registry
            .as_ref()
            .and_then(|registry| registry.lookup_by_key(tree.namespace(), key))
    }

    /// Create and register hosts for every keyed node below `id`, parents first
    fn bind_subtree(&self, tree: &Tree, id: NodeId, report: &mut ApplyReport) {
        let (Some(hooks), Some(registry)) = (tree.host_hooks(), &self.registry) else {
            return;
        };
        let Some(root) = tree.get(id) else {
            return;
        };
        for key in root.subtree_keys() {
            let Some(node) = tree.lookup(key) else {
                continue;
            };
            match hooks.create(node) {
                Ok(Some(host)) => registry.on_patch_add_node(tree, key, host),
                Ok(None) => {}
                Err(err) => host_failure(report, key, &err),
            }
        }
    }

    /// Destroy and unregister hosts for `keys` (pre-order), descendants first
    fn unbind_keys(&self, tree: &Tree, keys: &[String], report: &mut ApplyReport) {
        let Some(registry) = &self.registry else {
            return;
        };
        for key in keys.iter().rev() {
            if let Some(host) = registry.lookup_by_key(tree.namespace(), key) {
                if let Err(err) = host.destroy() {
                    host_failure(report, key, &err);
                }
            }
            registry.on_patch_remove_node(tree, key);
        }
    }

    fn mount_subtree(&self, tree: &Tree, id: NodeId, scheduler: &EffectScheduler) {
        if let (Some(lifecycle), Some(node)) = (&self.lifecycle, tree.get(id)) {
            lifecycle.mount_subtree(node, scheduler);
        }
    }
}

fn subtree_keys(tree: &Tree, key: &str) -> Result<Vec<String>, VdomError> {
    let node = tree
        .lookup(key)
        .ok_or_else(|| VdomError::KeyNotFound(key.to_string()))?;
    Ok(node.subtree_keys().into_iter().map(String::from).collect())
}

fn host_failure(report: &mut ApplyReport, key: &str, err: &HostError) {
    log::error!("Host binding for '{}': {}", key, err);
    report.host_errors += 1;
}

/// Apply `patches` to `tree` with a default patcher
pub fn apply_patches(tree: &mut Tree, patches: Vec<Patch>, scheduler: &EffectScheduler) -> ApplyReport {
    TreePatcher::new().apply(tree, patches, scheduler)
}
