//! Diff algorithm variants
//!
//! All three delegate to [`TreeReconciler`]; they differ in what they
//! prepare before the walk.

use std::collections::HashMap;
use std::sync::Arc;
use void_vdom::{DefaultHashComputer, DirtyState, NodeRef, Patch, Tree};

use crate::error::ReconcileError;
use crate::hash_index::HashIndex;
use crate::reconciler::TreeReconciler;

/// Which algorithm the engine picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    Simple,
    Keyed,
    Incremental,
}

impl AlgorithmKind {
    /// Algorithm name
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmKind::Simple => "simple",
            AlgorithmKind::Keyed => "keyed",
            AlgorithmKind::Incremental => "incremental",
        }
    }
}

impl std::fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A strategy for producing a patch list
pub trait DiffAlgorithm: Send + Sync {
    /// Algorithm kind
    fn kind(&self) -> AlgorithmKind;

    /// Diff `old` against `new`
    fn diff(
        &self,
        old: &Tree,
        new: &Tree,
        dirty_state: Option<&DirtyState>,
    ) -> Result<Vec<Patch>, ReconcileError>;

    /// Algorithm name
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// General recursive reconciliation
pub struct SimpleDiff {
    reconciler: Arc<TreeReconciler>,
}

impl SimpleDiff {
    pub fn new(reconciler: Arc<TreeReconciler>) -> Self {
        Self { reconciler }
    }
}

impl DiffAlgorithm for SimpleDiff {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Simple
    }

    fn diff(
        &self,
        old: &Tree,
        new: &Tree,
        dirty_state: Option<&DirtyState>,
    ) -> Result<Vec<Patch>, ReconcileError> {
        self.reconciler.reconcile(old.root(), new.root(), dirty_state)
    }
}

/// Reconciliation for trees whose children all carry keys.
///
/// Runs the same reconciler as [`SimpleDiff`]: the planner already picks
/// the key-map path for every child list whose children are all keyed,
/// and falls back to positional matching for the rest. The separate type
/// exists so the engine can report which shape it selected.
pub struct KeyedDiff {
    reconciler: Arc<TreeReconciler>,
}

impl KeyedDiff {
    pub fn new(reconciler: Arc<TreeReconciler>) -> Self {
        Self { reconciler }
    }
}

impl DiffAlgorithm for KeyedDiff {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Keyed
    }

    fn diff(
        &self,
        old: &Tree,
        new: &Tree,
        dirty_state: Option<&DirtyState>,
    ) -> Result<Vec<Patch>, ReconcileError> {
        if !is_fully_keyed(new) {
            log::debug!("Keyed diff on a tree with unkeyed children; positional fallback applies");
        }
        self.reconciler.reconcile(old.root(), new.root(), dirty_state)
    }
}

/// Hash-index driven reconciliation for large trees
pub struct IncrementalDiff {
    reconciler: Arc<TreeReconciler>,
}

impl IncrementalDiff {
    pub fn new(reconciler: Arc<TreeReconciler>) -> Self {
        Self { reconciler }
    }

    /// Keys whose subtree hash differs between the trees, or that exist on
    /// one side only; sorted
    pub fn changed_keys(old: &Tree, new: &Tree) -> Vec<String> {
        let hasher = DefaultHashComputer;
        let old_index = HashIndex::build(old, &hasher);
        let new_index = HashIndex::build(new, &hasher);
        let old_hashes = keyed_hashes(old, &old_index);
        let new_hashes = keyed_hashes(new, &new_index);

        let mut changed: Vec<String> = old_hashes
            .iter()
            .filter(|(key, hash)| new_hashes.get(*key) != Some(*hash))
            .map(|(key, _)| key.to_string())
            .chain(
                new_hashes
                    .keys()
                    .filter(|key| !old_hashes.contains_key(*key))
                    .map(|key| key.to_string()),
            )
            .collect();
        changed.sort();
        changed
    }
}

impl DiffAlgorithm for IncrementalDiff {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Incremental
    }

    fn diff(
        &self,
        old: &Tree,
        new: &Tree,
        dirty_state: Option<&DirtyState>,
    ) -> Result<Vec<Patch>, ReconcileError> {
        // Memoized hashes are only comparable when both trees carry them
        if old.hash_computer().is_some() && new.hash_computer().is_some() {
            if let (Some(a), Some(b)) = (old.root(), new.root()) {
                if !a.is_dirty() && !b.is_dirty() && a.subtree_hash().is_some()
                    && a.subtree_hash() == b.subtree_hash()
                {
                    return Ok(Vec::new());
                }
            }
            return self.reconciler.reconcile(old.root(), new.root(), dirty_state);
        }

        let hasher = DefaultHashComputer;
        let old_index = HashIndex::build(old, &hasher);
        let new_index = HashIndex::build(new, &hasher);
        if let (Some(a), Some(b)) = (old.root(), new.root()) {
            if old_index.get(a.id()) == new_index.get(b.id()) && !a.is_dirty() && !b.is_dirty() {
                return Ok(Vec::new());
            }
        }
        log::trace!(
            "Incremental diff indexed {} + {} nodes",
            old_index.len(),
            new_index.len()
        );
        self.reconciler.reconcile_indexed(
            old.root(),
            new.root(),
            dirty_state,
            Some(&old_index),
            Some(&new_index),
        )
    }
}

fn keyed_hashes<'t>(tree: &'t Tree, index: &HashIndex) -> HashMap<&'t str, u64> {
    let mut out = HashMap::with_capacity(tree.key_count());
    if let Some(root) = tree.root() {
        collect_keyed(root, index, &mut out);
    }
    out
}

fn collect_keyed<'t>(node: NodeRef<'t>, index: &HashIndex, out: &mut HashMap<&'t str, u64>) {
    if let (Some(key), Some(hash)) = (node.key(), index.get(node.id())) {
        out.insert(key, hash);
    }
    for child in node.children() {
        collect_keyed(child, index, out);
    }
}

/// True when every non-root node of `tree` has a key
pub fn is_fully_keyed(tree: &Tree) -> bool {
    fn children_keyed(node: NodeRef<'_>) -> bool {
        node.children()
            .all(|child| child.key().is_some() && children_keyed(child))
    }
    tree.root().map_or(true, children_keyed)
}
