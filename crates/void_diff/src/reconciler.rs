//! Tree reconciliation
//!
//! [`TreeReconciler`] walks an old and a new tree in lockstep and emits the
//! patch list that turns the old tree into the new one:
//! - Identical subtrees (equal hashes, no dirty flags) are skipped
//! - Prop changes on keyed nodes become `UpdateProps`
//! - Child lists are matched through a [`KeyedPlanner`]
//! - Output is grouped by phase: removes, adds, moves, updates, root replacement
//!
//! Every emitted patch addresses its target by key. A change that cannot be
//! addressed that way (an unkeyed node whose props changed, or a child list
//! that gains or loses unkeyed children) is escalated to the nearest keyed
//! ancestor, which is removed and re-added whole, or to the root.

use std::sync::Arc;
use void_memory::PatchObjectPool;
use void_vdom::{DirtyState, Node, NodeRef, Patch, PatchKind, PropsDelta};

use crate::error::ReconcileError;
use crate::hash_index::HashIndex;
use crate::planner::{ChildSlot, DefaultKeyedPlanner, KeyedPlanner, PlanError};

// ============================================================================
// Phase-ordered output
// ============================================================================

const PHASES: usize = PatchKind::ALL.len();

/// Bucket lengths at a point in time
#[derive(Debug, Clone, Copy)]
struct Checkpoint([usize; PHASES]);

/// Collects patches per phase, drawing blanks from an optional pool
struct PatchSink<'a> {
    buckets: [Vec<Patch>; PHASES],
    pool: Option<&'a PatchObjectPool>,
}

impl<'a> PatchSink<'a> {
    fn new(pool: Option<&'a PatchObjectPool>) -> Self {
        Self {
            buckets: Default::default(),
            pool,
        }
    }

    fn blank(&self, kind: PatchKind) -> Patch {
        match self.pool {
            Some(pool) => pool.acquire(kind),
            None => Patch::blank(kind),
        }
    }

    fn push(&mut self, patch: Patch) {
        self.buckets[patch.kind().order() as usize].push(patch);
    }

    fn remove(&mut self, key: &str) {
        let mut patch = self.blank(PatchKind::RemoveNode);
        if let Patch::RemoveNode { key: slot } = &mut patch {
            slot.push_str(key);
        }
        self.push(patch);
    }

    fn add(&mut self, node: Node, parent_key: &str, index: usize) {
        let mut patch = self.blank(PatchKind::AddNode);
        if let Patch::AddNode {
            node: node_slot,
            parent_key: parent_slot,
            index: index_slot,
        } = &mut patch
        {
            *node_slot = node;
            parent_slot.push_str(parent_key);
            *index_slot = index;
        }
        self.push(patch);
    }

    fn move_to(&mut self, key: &str, new_index: usize) {
        let mut patch = self.blank(PatchKind::MoveNode);
        if let Patch::MoveNode {
            key: slot,
            new_index: index_slot,
        } = &mut patch
        {
            slot.push_str(key);
            *index_slot = new_index;
        }
        self.push(patch);
    }

    fn update(&mut self, key: &str, delta: PropsDelta) {
        let mut patch = self.blank(PatchKind::UpdateProps);
        if let Patch::UpdateProps {
            key: slot,
            delta: delta_slot,
        } = &mut patch
        {
            slot.push_str(key);
            *delta_slot = delta;
        }
        self.push(patch);
    }

    fn replace_root(&mut self, root: Option<Node>) {
        let mut patch = self.blank(PatchKind::ReplaceRoot);
        if let Patch::ReplaceRoot { root: slot } = &mut patch {
            *slot = root;
        }
        self.push(patch);
    }

    fn checkpoint(&self) -> Checkpoint {
        let mut lens = [0; PHASES];
        for (len, bucket) in lens.iter_mut().zip(self.buckets.iter()) {
            *len = bucket.len();
        }
        Checkpoint(lens)
    }

    /// Drop everything emitted since `checkpoint`
    fn rollback(&mut self, checkpoint: Checkpoint) {
        for (bucket, &len) in self.buckets.iter_mut().zip(checkpoint.0.iter()) {
            let discarded = bucket.split_off(len);
            if let Some(pool) = self.pool {
                pool.release_all(discarded);
            }
        }
    }

    fn finish(self) -> Vec<Patch> {
        let total = self.buckets.iter().map(Vec::len).sum();
        let mut patches = Vec::with_capacity(total);
        for bucket in self.buckets {
            patches.extend(bucket);
        }
        patches
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Why a subtree could not be expressed with key-addressed patches
enum Halt {
    Unaddressable(&'static str),
    Failed(ReconcileError),
}

impl From<ReconcileError> for Halt {
    fn from(err: ReconcileError) -> Self {
        Halt::Failed(err)
    }
}

type Step = std::result::Result<(), Halt>;

/// Per-call state
struct Pass<'a> {
    sink: PatchSink<'a>,
    dirty: Option<&'a DirtyState>,
    old_hashes: Option<&'a HashIndex>,
    new_hashes: Option<&'a HashIndex>,
}

impl Pass<'_> {
    /// Dirty-state pruning: a clean pair with no dirty children and no
    /// recorded key can be skipped outright
    fn should_visit(&self, old: NodeRef<'_>, new: NodeRef<'_>) -> bool {
        let Some(dirty) = self.dirty else {
            return true;
        };
        if old.is_dirty() || new.is_dirty() {
            return true;
        }
        if old.children().any(|c| c.is_dirty()) || new.children().any(|c| c.is_dirty()) {
            return true;
        }
        [old.key(), new.key()]
            .into_iter()
            .flatten()
            .any(|key| dirty.contains(key))
    }

    fn hash_of(node: NodeRef<'_>, side: Option<&HashIndex>) -> Option<u64> {
        match side {
            Some(index) => index.get(node.id()),
            None => node.subtree_hash(),
        }
    }

    /// False only when both hashes are known, equal, and neither node is dirty
    fn may_differ(&self, old: NodeRef<'_>, new: NodeRef<'_>) -> bool {
        if old.is_dirty() || new.is_dirty() {
            return true;
        }
        match (
            Self::hash_of(old, self.old_hashes),
            Self::hash_of(new, self.new_hashes),
        ) {
            (Some(a), Some(b)) => a != b,
            _ => true,
        }
    }
}

/// Produces phase-ordered patch lists from two trees
pub struct TreeReconciler {
    planner: Arc<dyn KeyedPlanner>,
    pool: Option<Arc<PatchObjectPool>>,
}

impl TreeReconciler {
    /// Create a reconciler with the default planner and no pool
    pub fn new() -> Self {
        Self {
            planner: Arc::new(DefaultKeyedPlanner::new()),
            pool: None,
        }
    }

    /// Use a custom child matching strategy
    pub fn with_planner(mut self, planner: Arc<dyn KeyedPlanner>) -> Self {
        self.planner = planner;
        self
    }

    /// Draw patch objects from `pool`
    pub fn with_patch_pool(mut self, pool: Arc<PatchObjectPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// The active planner
    pub fn planner(&self) -> &Arc<dyn KeyedPlanner> {
        &self.planner
    }

    /// The patch pool, if any
    pub fn patch_pool(&self) -> Option<&Arc<PatchObjectPool>> {
        self.pool.as_ref()
    }

    /// Diff two roots.
    ///
    /// `dirty_state` enables pruning and is only sound when it describes
    /// every change made to a copy of `old` that became `new`.
    pub fn reconcile(
        &self,
        old: Option<NodeRef<'_>>,
        new: Option<NodeRef<'_>>,
        dirty_state: Option<&DirtyState>,
    ) -> Result<Vec<Patch>, ReconcileError> {
        self.reconcile_indexed(old, new, dirty_state, None, None)
    }

    /// Diff two roots using precomputed hash side tables
    pub fn reconcile_indexed(
        &self,
        old: Option<NodeRef<'_>>,
        new: Option<NodeRef<'_>>,
        dirty_state: Option<&DirtyState>,
        old_hashes: Option<&HashIndex>,
        new_hashes: Option<&HashIndex>,
    ) -> Result<Vec<Patch>, ReconcileError> {
        let mut pass = Pass {
            sink: PatchSink::new(self.pool.as_deref()),
            dirty: dirty_state.filter(|d| !d.is_empty()),
            old_hashes,
            new_hashes,
        };

        match (old, new) {
            (None, None) => {}
            (None, Some(new)) => pass.sink.replace_root(Some(new.to_node())),
            (Some(_), None) => pass.sink.replace_root(None),
            (Some(old), Some(new)) => {
                if old.component_name() != new.component_name() || old.key() != new.key() {
                    pass.sink.replace_root(Some(new.to_node()));
                } else {
                    let checkpoint = pass.sink.checkpoint();
                    match self.diff_pair(&mut pass, old, new, true) {
                        Ok(()) => {}
                        Err(Halt::Unaddressable(reason)) => {
                            log::debug!("Replacing root: {}", reason);
                            pass.sink.rollback(checkpoint);
                            pass.sink.replace_root(Some(new.to_node()));
                        }
                        Err(Halt::Failed(err)) => return Err(err),
                    }
                }
            }
        }

        Ok(pass.sink.finish())
    }

    /// Compare two nodes already known to share component and key
    fn diff_pair(&self, pass: &mut Pass<'_>, old: NodeRef<'_>, new: NodeRef<'_>, prune: bool) -> Step {
        if prune && !pass.should_visit(old, new) {
            return Ok(());
        }
        if !pass.may_differ(old, new) {
            return Ok(());
        }

        let props_differ = match (old.props_hash(), new.props_hash()) {
            (Some(a), Some(b)) if !old.is_props_dirty() && !new.is_props_dirty() => a != b,
            _ => old.props() != new.props(),
        };
        if props_differ {
            let delta = PropsDelta::between(old.props(), new.props());
            if !delta.is_empty() {
                match new.key() {
                    Some(key) => pass.sink.update(key, delta),
                    None => return Err(Halt::Unaddressable("props changed on an unkeyed node")),
                }
            }
        }

        // Dirty flags below a rebuilt child list say nothing about what moved
        let prune_children = prune && !old.is_structural_dirty() && !new.is_structural_dirty();
        self.diff_children(pass, old, new, prune_children)
    }

    fn collect_children<'t>(node: NodeRef<'t>) -> Result<Vec<NodeRef<'t>>, ReconcileError> {
        let children: Vec<NodeRef<'t>> = node.children().collect();
        if children.len() != node.child_count() {
            return Err(ReconcileError::StaleNode(format!(
                "child of {}",
                describe(node)
            )));
        }
        Ok(children)
    }

    fn diff_children(
        &self,
        pass: &mut Pass<'_>,
        old_parent: NodeRef<'_>,
        new_parent: NodeRef<'_>,
        prune: bool,
    ) -> Step {
        let old_children = Self::collect_children(old_parent)?;
        let new_children = Self::collect_children(new_parent)?;
        if old_children.is_empty() && new_children.is_empty() {
            return Ok(());
        }

        let old_slots: Vec<ChildSlot<'_>> = old_children
            .iter()
            .map(|c| ChildSlot::new(c.key(), c.component_name()))
            .collect();
        let new_slots: Vec<ChildSlot<'_>> = new_children
            .iter()
            .map(|c| ChildSlot::new(c.key(), c.component_name()))
            .collect();

        let mut new_to_old = self.planner.match_children(&old_slots, &new_slots).new_to_old;
        validate_matching(&new_to_old, &old_slots, &new_slots, new_parent)?;

        let parent_key = new_parent.key();

        // Recurse into matched pairs; a keyed child under a keyed parent that
        // cannot be patched in place is replaced whole.
        for ni in 0..new_to_old.len() {
            let Some(oi) = new_to_old[ni] else {
                continue;
            };
            let (old_child, new_child) = (old_children[oi], new_children[ni]);
            let checkpoint = pass.sink.checkpoint();
            match self.diff_pair(pass, old_child, new_child, prune) {
                Ok(()) => {}
                Err(Halt::Unaddressable(reason))
                    if new_child.key().is_some() && parent_key.is_some() =>
                {
                    log::trace!("Replacing {}: {}", describe(new_child), reason);
                    pass.sink.rollback(checkpoint);
                    new_to_old[ni] = None;
                }
                Err(halt) => return Err(halt),
            }
        }

        let mut old_to_new = vec![None; old_children.len()];
        for (ni, oi) in new_to_old.iter().enumerate() {
            if let Some(oi) = *oi {
                old_to_new[oi] = Some(ni);
            }
        }

        // Removals
        for (oi, old_child) in old_children.iter().enumerate() {
            if old_to_new[oi].is_some() {
                continue;
            }
            match old_child.key() {
                Some(key) => pass.sink.remove(key),
                None => return Err(Halt::Unaddressable("unkeyed child removed")),
            }
        }

        // Insertions, ascending by target index. Each lands right after the
        // last child bound for an earlier slot, so survivors of each stream
        // keep their relative order and the AddNode index is the live one.
        let mut current: Vec<usize> = old_to_new.iter().flatten().copied().collect();
        if new_to_old.iter().any(Option::is_none) {
            let Some(parent_key) = parent_key else {
                return Err(Halt::Unaddressable("child inserted under an unkeyed parent"));
            };
            for (ni, matched) in new_to_old.iter().enumerate() {
                if matched.is_none() {
                    let at = current.iter().rposition(|&c| c < ni).map_or(0, |p| p + 1);
                    pass.sink.add(new_children[ni].to_node(), parent_key, at);
                    current.insert(at, ni);
                }
            }
        }

        // Reorders
        let moves = self
            .planner
            .plan_moves(&current, &new_slots)
            .map_err(|err| match err {
                PlanError::UnkeyedMove(_) => Halt::Unaddressable("unkeyed child out of order"),
                other => inconsistent(new_parent, other.to_string()),
            })?;
        for planned in moves {
            let key = new_slots
                .get(planned.child)
                .and_then(|slot| slot.key)
                .ok_or_else(|| inconsistent(new_parent, "planned move of an unkeyed child".into()))?;
            pass.sink.move_to(key, planned.to);
        }

        Ok(())
    }
}

impl Default for TreeReconciler {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(node: NodeRef<'_>) -> String {
    match node.key() {
        Some(key) => format!("{}#{}", node.component_name(), key),
        None => format!("{}@{}", node.component_name(), node.id()),
    }
}

fn inconsistent(parent: NodeRef<'_>, reason: String) -> Halt {
    Halt::Failed(ReconcileError::InconsistentPlan {
        parent: describe(parent),
        reason,
    })
}

/// Reject matchings that pair an old child twice, point out of range, or
/// pair children with different identities
fn validate_matching(
    new_to_old: &[Option<usize>],
    old: &[ChildSlot<'_>],
    new: &[ChildSlot<'_>],
    parent: NodeRef<'_>,
) -> Step {
    if new_to_old.len() != new.len() {
        return Err(inconsistent(parent, "matching length differs from child count".into()));
    }
    let mut used = vec![false; old.len()];
    for (ni, matched) in new_to_old.iter().enumerate() {
        let Some(oi) = *matched else {
            continue;
        };
        if oi >= old.len() || std::mem::replace(&mut used[oi], true) {
            return Err(inconsistent(parent, format!("old child {} matched twice or out of range", oi)));
        }
        if old[oi].key != new[ni].key || old[oi].component_name != new[ni].component_name {
            return Err(inconsistent(parent, format!("new child {} matched to a different identity", ni)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_vdom::{Tree, Value};

    fn item(key: &str) -> Node {
        Node::keyed("Item", key)
    }

    fn list(keys: &[&str]) -> Node {
        Node::keyed("List", "list").with_children(keys.iter().map(|k| item(k)))
    }

    fn diff(old: &Node, new: &Node) -> Vec<Patch> {
        let old = Tree::from_root(old.clone()).unwrap();
        let new = Tree::from_root(new.clone()).unwrap();
        TreeReconciler::new()
            .reconcile(old.root(), new.root(), None)
            .unwrap()
    }

    #[test]
    fn test_root_cases() {
        let reconciler = TreeReconciler::new();
        let empty = Tree::new();
        let full = Tree::from_root(list(&["a"])).unwrap();

        assert!(reconciler.reconcile(None, None, None).unwrap().is_empty());
        assert_eq!(
            reconciler.reconcile(empty.root(), full.root(), None).unwrap(),
            vec![Patch::replace_root(Some(list(&["a"])))]
        );
        assert_eq!(
            reconciler.reconcile(full.root(), empty.root(), None).unwrap(),
            vec![Patch::replace_root(None)]
        );
    }

    #[test]
    fn test_root_name_change_replaces() {
        let new = Node::keyed("Grid", "list");
        assert_eq!(
            diff(&list(&["a"]), &new),
            vec![Patch::replace_root(Some(new.clone()))]
        );
    }

    #[test]
    fn test_identical_trees_no_patches() {
        assert!(diff(&list(&["a", "b"]), &list(&["a", "b"])).is_empty());
    }

    #[test]
    fn test_keyed_prop_update() {
        let old = list(&["a"]);
        let new = Node::keyed("List", "list").with_child(item("a").with_prop("label", "hi"));
        assert_eq!(
            diff(&old, &new),
            vec![Patch::update_props(
                "a",
                PropsDelta::new().with_set("label", Value::from("hi"))
            )]
        );
    }

    #[test]
    fn test_phase_order() {
        let old = list(&["a", "b", "c"]);
        let new = Node::keyed("List", "list").with_children(vec![
            item("c").with_prop("x", 1),
            item("a"),
            item("d"),
        ]);
        let kinds: Vec<_> = diff(&old, &new).iter().map(Patch::kind).collect();
        assert_eq!(
            kinds,
            vec![
                PatchKind::RemoveNode,
                PatchKind::AddNode,
                PatchKind::MoveNode,
                PatchKind::UpdateProps
            ]
        );
    }

    #[test]
    fn test_unkeyed_prop_change_escalates_to_keyed_ancestor() {
        let old = Node::keyed("App", "app")
            .with_child(Node::keyed("Card", "card").with_child(Node::new("Text").with_prop("t", "a")));
        let new_card = Node::keyed("Card", "card").with_child(Node::new("Text").with_prop("t", "b"));
        let new = Node::keyed("App", "app").with_child(new_card.clone());

        assert_eq!(
            diff(&old, &new),
            vec![
                Patch::remove_node("card"),
                Patch::add_node(new_card, "app", 0),
            ]
        );
    }

    #[test]
    fn test_unkeyed_root_escalates_to_replace_root() {
        let old = Node::new("App").with_prop("v", 1);
        let new = Node::new("App").with_prop("v", 2);
        assert_eq!(diff(&old, &new), vec![Patch::replace_root(Some(new.clone()))]);
    }

    /// Matches like the default planner but never finds a move plan
    struct StuckPlanner;

    impl KeyedPlanner for StuckPlanner {
        fn match_children(
            &self,
            old: &[ChildSlot<'_>],
            new: &[ChildSlot<'_>],
        ) -> crate::planner::ChildMatching {
            DefaultKeyedPlanner::new().match_children(old, new)
        }

        fn plan_moves(
            &self,
            _current: &[usize],
            _new: &[ChildSlot<'_>],
        ) -> Result<Vec<crate::planner::PlannedMove>, PlanError> {
            Err(PlanError::UnkeyedMove(0))
        }
    }

    #[test]
    fn test_unkeyed_move_escalates_instead_of_failing() {
        let old = Tree::from_root(list(&["a"])).unwrap();
        let new = Tree::from_root(list(&["a", "b"])).unwrap();
        let patches = TreeReconciler::new()
            .with_planner(Arc::new(StuckPlanner))
            .reconcile(old.root(), new.root(), None)
            .unwrap();
        assert_eq!(patches, vec![Patch::replace_root(new.to_node())]);
    }

    #[test]
    fn test_pooled_sink_produces_same_patches() {
        let pool = Arc::new(PatchObjectPool::new());
        let old = Tree::from_root(list(&["a", "b"])).unwrap();
        let new = Tree::from_root(list(&["b", "c"])).unwrap();

        let pooled = TreeReconciler::new()
            .with_patch_pool(pool.clone())
            .reconcile(old.root(), new.root(), None)
            .unwrap();
        let plain = TreeReconciler::new()
            .reconcile(old.root(), new.root(), None)
            .unwrap();

        assert_eq!(pooled, plain);
        assert_eq!(pool.stats().created, pooled.len() as u64);
    }
}
