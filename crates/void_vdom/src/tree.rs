//! Arena-backed VDOM tree
//!
//! The tree owns at most one root and indexes every keyed node by key for
//! O(1) patch targeting. Mutations go through four operations
//! ([`attach_node`](Tree::attach_node), [`detach_subtree`](Tree::detach_subtree),
//! [`update_node_props`](Tree::update_node_props), [`move_node`](Tree::move_node))
//! plus [`set_root`](Tree::set_root); each one:
//! - keeps memoized subtree hashes valid by recomputing up to the root
//! - records dirty flags and dirty keys for incremental diffing
//! - bumps the tree revision

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::arena::{NodeArena, NodeData, NodeId};
use crate::error::{Result, VdomError};
use crate::hash::{DefaultHashComputer, HashComputer};
use crate::host::HostHooks;
use crate::node::Node;
use crate::patch::PropsDelta;
use crate::value::Props;

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a tree instance. Clones get a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(u64);

impl TreeId {
    fn next() -> Self {
        Self(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Keys changed since the last reset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyState {
    /// Keys whose props changed, plus keyed ancestors of any change
    pub dirty_keys: HashSet<String>,
    /// Keys whose child list changed
    pub structural_keys: HashSet<String>,
}

impl DirtyState {
    /// Check if nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.dirty_keys.is_empty() && self.structural_keys.is_empty()
    }

    /// Check if a key is in either set
    pub fn contains(&self, key: &str) -> bool {
        self.dirty_keys.contains(key) || self.structural_keys.contains(key)
    }

    /// Union another state into this one
    pub fn merge(&mut self, other: DirtyState) {
        self.dirty_keys.extend(other.dirty_keys);
        self.structural_keys.extend(other.structural_keys);
    }
}

/// VDOM tree with a key index, hash memoization and dirty tracking
pub struct Tree {
    id: TreeId,
    arena: NodeArena,
    root: Option<NodeId>,
    key_map: HashMap<String, NodeId>,
    namespace: String,
    hasher: Option<Arc<dyn HashComputer>>,
    host_hooks: Option<Arc<dyn HostHooks>>,
    dirty: DirtyState,
    revision: u64,
    derived_from: Option<(TreeId, u64)>,
}

impl Tree {
    /// Create an empty tree hashing with [`DefaultHashComputer`]
    pub fn new() -> Self {
        Self {
            id: TreeId::next(),
            arena: NodeArena::new(),
            root: None,
            key_map: HashMap::new(),
            namespace: "default".to_string(),
            hasher: Some(Arc::new(DefaultHashComputer)),
            host_hooks: None,
            dirty: DirtyState::default(),
            revision: 0,
            derived_from: None,
        }
    }

    /// Create an empty tree that does not memoize hashes
    pub fn without_hashing() -> Self {
        Self {
            hasher: None,
            ..Self::new()
        }
    }

    /// Build a tree from a node snapshot
    pub fn from_root(root: Node) -> Result<Self> {
        Self::new().with_root(root)
    }

    /// Attach `root` as the root of this (empty) tree
    pub fn with_root(mut self, root: Node) -> Result<Self> {
        self.attach_node(root, None, 0, false)?;
        Ok(self)
    }

    /// Set the namespace (backend target) used for host bindings
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the host hooks
    pub fn with_host_hooks(mut self, hooks: Arc<dyn HostHooks>) -> Self {
        self.host_hooks = Some(hooks);
        self
    }

    /// Switch the hash strategy and rehash existing nodes
    pub fn with_hash_computer(mut self, hasher: Arc<dyn HashComputer>) -> Self {
        self.hasher = Some(hasher);
        if let Some(root) = self.root {
            for data in self.arena.values_mut() {
                data.props_hash = None;
            }
            self.rehash_subtree(root);
        }
        self
    }

    /// Get the tree identity
    pub fn id(&self) -> TreeId {
        self.id
    }

    /// Mutation counter
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Namespace used for host bindings
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Host hooks, if the renderer supplied any
    pub fn host_hooks(&self) -> Option<&Arc<dyn HostHooks>> {
        self.host_hooks.as_ref()
    }

    /// Hash strategy, if hashes are memoized
    pub fn hash_computer(&self) -> Option<&Arc<dyn HashComputer>> {
        self.hasher.as_ref()
    }

    /// True if this tree was cloned from `base` and `base` has not changed since
    pub fn is_derived_from(&self, base: &Tree) -> bool {
        self.derived_from == Some((base.id, base.revision))
    }

    /// Get the root node
    pub fn root(&self) -> Option<NodeRef<'_>> {
        self.root.and_then(|id| self.get(id))
    }

    /// Get the root id
    pub fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    /// Resolve a node id
    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.arena.get(id).map(|data| NodeRef {
            tree: self,
            id,
            data,
        })
    }

    /// Find a node by key
    pub fn lookup(&self, key: &str) -> Option<NodeRef<'_>> {
        self.key_map.get(key).and_then(|id| self.get(*id))
    }

    /// Check if a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.key_map.contains_key(key)
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Number of keyed nodes
    pub fn key_count(&self) -> usize {
        self.key_map.len()
    }

    /// Check if the tree has no root
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Export the whole tree as a snapshot
    pub fn to_node(&self) -> Option<Node> {
        self.root.and_then(|id| self.export(id))
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Insert `node` (and its subtree) as child `index` of `parent_key`.
    ///
    /// `parent_key = None` attaches the root. The index is clamped to the
    /// sibling count. With `mark_dirty` the parent is recorded as
    /// structurally changed and every inserted node is flagged dirty.
    pub fn attach_node(
        &mut self,
        node: Node,
        parent_key: Option<&str>,
        index: usize,
        mark_dirty: bool,
    ) -> Result<NodeId> {
        let parent = match parent_key {
            Some(key) => Some(
                *self
                    .key_map
                    .get(key)
                    .ok_or_else(|| VdomError::KeyNotFound(key.to_string()))?,
            ),
            None if self.root.is_some() => return Err(VdomError::RootOccupied),
            None => None,
        };
        self.check_keys(&node)?;

        let id = self.insert_subtree(node, parent, mark_dirty);
        match parent {
            Some(parent_id) => {
                if let Some(data) = self.arena.get_mut(parent_id) {
                    let at = index.min(data.children.len());
                    data.children.insert(at, id);
                }
                if mark_dirty {
                    self.mark_changed(parent_id, false, true);
                }
                self.bubble_hashes(Some(parent_id));
            }
            None => self.root = Some(id),
        }

        self.revision += 1;
        Ok(id)
    }

    /// Remove the subtree rooted at `key`, returning it as a snapshot
    pub fn detach_subtree(&mut self, key: &str) -> Result<Node> {
        let id = *self
            .key_map
            .get(key)
            .ok_or_else(|| VdomError::KeyNotFound(key.to_string()))?;
        let snapshot = self
            .export(id)
            .ok_or_else(|| VdomError::StaleNode(id.to_string()))?;
        let parent = self.arena.get(id).and_then(|data| data.parent);

        self.remove_subtree(id);
        match parent {
            Some(parent_id) => {
                if let Some(data) = self.arena.get_mut(parent_id) {
                    data.children.retain(|child| *child != id);
                }
                self.mark_changed(parent_id, false, true);
                self.bubble_hashes(Some(parent_id));
            }
            None => self.root = None,
        }

        self.revision += 1;
        Ok(snapshot)
    }

    /// Merge a props delta into the node at `key`
    pub fn update_node_props(&mut self, key: &str, delta: &PropsDelta) -> Result<()> {
        let id = *self
            .key_map
            .get(key)
            .ok_or_else(|| VdomError::KeyNotFound(key.to_string()))?;
        let data = self
            .arena
            .get_mut(id)
            .ok_or_else(|| VdomError::StaleNode(id.to_string()))?;
        delta.apply_to(&mut data.props);
        data.props_hash = None;

        self.mark_changed(id, true, false);
        self.bubble_hashes(Some(id));
        self.revision += 1;
        Ok(())
    }

    /// Move the node at `key` to `new_index` among its siblings (clamped)
    pub fn move_node(&mut self, key: &str, new_index: usize) -> Result<()> {
        let id = *self
            .key_map
            .get(key)
            .ok_or_else(|| VdomError::KeyNotFound(key.to_string()))?;
        let Some(parent_id) = self.arena.get(id).and_then(|data| data.parent) else {
            log::debug!("Ignoring move of root node '{}'", key);
            return Ok(());
        };
        let data = self
            .arena
            .get_mut(parent_id)
            .ok_or_else(|| VdomError::StaleNode(parent_id.to_string()))?;
        data.children.retain(|child| *child != id);
        let at = new_index.min(data.children.len());
        data.children.insert(at, id);

        self.mark_changed(parent_id, false, true);
        self.bubble_hashes(Some(parent_id));
        self.revision += 1;
        Ok(())
    }

    /// Replace the root, returning the previous one. `None` clears the tree.
    pub fn set_root(&mut self, root: Option<Node>) -> Result<Option<Node>> {
        if let Some(node) = &root {
            check_unique_keys(node, &HashMap::new())?;
        }
        let previous = self.take_root();
        if let Some(node) = root {
            let id = self.insert_subtree(node, None, false);
            self.root = Some(id);
            self.mark_changed(id, true, true);
        }
        self.revision += 1;
        Ok(previous)
    }

    /// Remove everything, returning the old root snapshot
    pub fn take_root(&mut self) -> Option<Node> {
        let previous = self.to_node();
        self.arena.clear();
        self.key_map.clear();
        if self.root.take().is_some() {
            self.revision += 1;
        }
        previous
    }

    // ========================================================================
    // Dirty tracking
    // ========================================================================

    /// Copy of the dirty keys recorded since the last reset
    pub fn dirty_state(&self) -> DirtyState {
        self.dirty.clone()
    }

    /// Take the recorded dirty keys, or `None` when nothing changed.
    ///
    /// The tree stops counting as derived from its source: the remaining
    /// dirty keys no longer cover every change made since the clone.
    pub fn consume_dirty_state(&mut self) -> Option<DirtyState> {
        if self.dirty.is_empty() {
            return None;
        }
        self.derived_from = None;
        Some(std::mem::take(&mut self.dirty))
    }

    /// Clear dirty keys and every node's dirty flags. Also drops the
    /// lineage recorded by [`Clone`].
    pub fn reset_dirty_tracking(&mut self) {
        self.dirty = DirtyState::default();
        self.derived_from = None;
        for data in self.arena.values_mut() {
            data.props_dirty = false;
            data.structural_dirty = false;
            data.subtree_dirty = false;
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn check_keys(&self, node: &Node) -> Result<()> {
        check_unique_keys(node, &self.key_map)
    }

    fn insert_subtree(&mut self, node: Node, parent: Option<NodeId>, dirty: bool) -> NodeId {
        let Node {
            component_name,
            key,
            props,
            children,
        } = node;

        let id = self.arena.insert(NodeData {
            component_name,
            key: key.clone(),
            props,
            children: Vec::with_capacity(children.len()),
            parent,
            props_dirty: dirty,
            structural_dirty: dirty,
            subtree_dirty: false,
            props_hash: None,
            subtree_hash: None,
        });
        if let Some(key) = key {
            self.key_map.insert(key, id);
        }

        let child_ids: Vec<NodeId> = children
            .into_iter()
            .map(|child| self.insert_subtree(child, Some(id), dirty))
            .collect();
        if let Some(data) = self.arena.get_mut(id) {
            data.children = child_ids;
        }
        self.refresh_hash(id);
        id
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(data) = self.arena.remove(id) {
            if let Some(key) = &data.key {
                self.key_map.remove(key);
            }
            for child in data.children {
                self.remove_subtree(child);
            }
        }
    }

    fn export(&self, id: NodeId) -> Option<Node> {
        let data = self.arena.get(id)?;
        Some(Node {
            component_name: data.component_name.clone(),
            key: data.key.clone(),
            props: data.props.clone(),
            children: data
                .children
                .iter()
                .filter_map(|child| self.export(*child))
                .collect(),
        })
    }

    fn mark_changed(&mut self, id: NodeId, props: bool, structural: bool) {
        let mut parent = match self.arena.get_mut(id) {
            Some(data) => {
                data.props_dirty |= props;
                data.structural_dirty |= structural;
                if let Some(key) = &data.key {
                    if props {
                        self.dirty.dirty_keys.insert(key.clone());
                    }
                    if structural {
                        self.dirty.structural_keys.insert(key.clone());
                    }
                }
                data.parent
            }
            None => return,
        };

        while let Some(ancestor) = parent {
            parent = match self.arena.get_mut(ancestor) {
                Some(data) => {
                    data.subtree_dirty = true;
                    if let Some(key) = &data.key {
                        self.dirty.dirty_keys.insert(key.clone());
                    }
                    data.parent
                }
                None => None,
            };
        }
    }

    fn refresh_hash(&mut self, id: NodeId) {
        let Some(hasher) = self.hasher.as_deref() else {
            return;
        };
        let Some(data) = self.arena.get(id) else {
            return;
        };
        let child_hashes: Vec<u64> = data
            .children
            .iter()
            .filter_map(|child| self.arena.get(*child).and_then(|c| c.subtree_hash))
            .collect();
        let props_hash = data
            .props_hash
            .unwrap_or_else(|| hasher.props_hash(&data.props));
        let subtree_hash = hasher.combine(
            &data.component_name,
            data.key.as_deref(),
            props_hash,
            &child_hashes,
        );
        if let Some(data) = self.arena.get_mut(id) {
            data.props_hash = Some(props_hash);
            data.subtree_hash = Some(subtree_hash);
        }
    }

    fn bubble_hashes(&mut self, mut current: Option<NodeId>) {
        while let Some(id) = current {
            self.refresh_hash(id);
            current = self.arena.get(id).and_then(|data| data.parent);
        }
    }

    fn rehash_subtree(&mut self, id: NodeId) {
        let children = self
            .arena
            .get(id)
            .map(|data| data.children.clone())
            .unwrap_or_default();
        for child in children {
            self.rehash_subtree(child);
        }
        self.refresh_hash(id);
    }
}

fn check_unique_keys(node: &Node, existing: &HashMap<String, NodeId>) -> Result<()> {
    let mut seen = HashSet::new();
    for key in node.keys() {
        if existing.contains_key(key) || !seen.insert(key) {
            return Err(VdomError::DuplicateKey(key.to_string()));
        }
    }
    Ok(())
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep copy with a fresh identity that remembers its source and revision
impl Clone for Tree {
    fn clone(&self) -> Self {
        Self {
            id: TreeId::next(),
            arena: self.arena.clone(),
            root: self.root,
            key_map: self.key_map.clone(),
            namespace: self.namespace.clone(),
            hasher: self.hasher.clone(),
            host_hooks: self.host_hooks.clone(),
            dirty: self.dirty.clone(),
            revision: self.revision,
            derived_from: Some((self.id, self.revision)),
        }
    }
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("nodes", &self.arena.len())
            .field("keys", &self.key_map.len())
            .field("revision", &self.revision)
            .finish()
    }
}

// ============================================================================
// Node view
// ============================================================================

/// Borrowed view of one node in a [`Tree`]
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a Tree,
    id: NodeId,
    data: &'a NodeData,
}

impl<'a> NodeRef<'a> {
    /// Arena id
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Owning tree
    pub fn tree(&self) -> &'a Tree {
        self.tree
    }

    /// Component type tag
    pub fn component_name(&self) -> &'a str {
        &self.data.component_name
    }

    /// Stable identity, if any
    pub fn key(&self) -> Option<&'a str> {
        self.data.key.as_deref()
    }

    /// Props
    pub fn props(&self) -> &'a Props {
        &self.data.props
    }

    /// Ordered children
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        self.data
            .children
            .iter()
            .filter_map(move |id| tree.get(*id))
    }

    /// Number of children
    pub fn child_count(&self) -> usize {
        self.data.children.len()
    }

    /// Child at position `index`
    pub fn child(&self, index: usize) -> Option<NodeRef<'a>> {
        self.data
            .children
            .get(index)
            .and_then(|id| self.tree.get(*id))
    }

    /// Parent node
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.data.parent.and_then(|id| self.tree.get(id))
    }

    /// Key of the parent node
    pub fn parent_key(&self) -> Option<&'a str> {
        self.parent().and_then(|parent| parent.key())
    }

    /// Position among siblings
    pub fn index_in_parent(&self) -> Option<usize> {
        self.parent()?
            .data
            .children
            .iter()
            .position(|child| *child == self.id)
    }

    /// Own props changed since the last reset
    pub fn is_props_dirty(&self) -> bool {
        self.data.props_dirty
    }

    /// Own child list changed since the last reset
    pub fn is_structural_dirty(&self) -> bool {
        self.data.structural_dirty
    }

    /// Some descendant changed since the last reset
    pub fn has_dirty_descendants(&self) -> bool {
        self.data.subtree_dirty
    }

    /// Any dirty flag set
    pub fn is_dirty(&self) -> bool {
        self.data.props_dirty || self.data.structural_dirty || self.data.subtree_dirty
    }

    /// Memoized prop hash
    pub fn props_hash(&self) -> Option<u64> {
        self.data.props_hash
    }

    /// Memoized subtree hash
    pub fn subtree_hash(&self) -> Option<u64> {
        self.data.subtree_hash
    }

    /// Keys in this subtree in depth-first pre-order
    pub fn subtree_keys(&self) -> Vec<&'a str> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys(&self, out: &mut Vec<&'a str>) {
        if let Some(key) = self.key() {
            out.push(key);
        }
        for child in self.children() {
            child.collect_keys(out);
        }
    }

    /// Number of nodes in this subtree
    pub fn subtree_size(&self) -> usize {
        1 + self.children().map(|c| c.subtree_size()).sum::<usize>()
    }

    /// Export this subtree as a snapshot
    pub fn to_node(&self) -> Node {
        self.tree.export(self.id).unwrap_or_default()
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("component_name", &self.data.component_name)
            .field("key", &self.data.key)
            .field("children", &self.data.children.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn sample() -> Node {
        Node::keyed("App", "app").with_children([
            Node::keyed("Header", "header").with_prop("title", "Home"),
            Node::keyed("List", "list").with_children([
                Node::keyed("Item", "a"),
                Node::keyed("Item", "b"),
                Node::new("Spacer"),
            ]),
        ])
    }

    #[test]
    fn test_from_root_indexes_keys() {
        let tree = Tree::from_root(sample()).unwrap();

        assert_eq!(tree.node_count(), 6);
        assert_eq!(tree.key_count(), 5);
        assert_eq!(tree.lookup("b").and_then(|n| n.parent_key()), Some("list"));
        assert_eq!(tree.lookup("b").and_then(|n| n.index_in_parent()), Some(1));
        assert_eq!(tree.to_node(), Some(sample()));
        assert!(tree.root().and_then(|r| r.subtree_hash()).is_some());
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let node = Node::keyed("Row", "r").with_children([Node::keyed("A", "x"), Node::keyed("B", "x")]);
        assert_eq!(Tree::from_root(node).unwrap_err(), VdomError::DuplicateKey("x".into()));

        let mut tree = Tree::from_root(sample()).unwrap();
        let err = tree.attach_node(Node::keyed("Item", "a"), Some("list"), 0, true);
        assert_eq!(err.unwrap_err(), VdomError::DuplicateKey("a".into()));
        assert_eq!(tree.node_count(), 6);
    }

    #[test]
    fn test_attach_clamps_index_and_marks_parent() {
        let mut tree = Tree::from_root(sample()).unwrap();
        let before = tree.root().and_then(|r| r.subtree_hash());

        tree.attach_node(Node::keyed("Item", "c"), Some("list"), 99, true).unwrap();

        let list = tree.lookup("list").unwrap();
        assert_eq!(list.child(3).and_then(|n| n.key()), Some("c"));
        assert!(list.is_structural_dirty());
        assert!(tree.root().unwrap().has_dirty_descendants());
        assert_ne!(tree.root().and_then(|r| r.subtree_hash()), before);

        let dirty = tree.dirty_state();
        assert!(dirty.structural_keys.contains("list"));
        assert!(dirty.dirty_keys.contains("app"));
    }

    #[test]
    fn test_attach_without_parent_requires_empty_tree() {
        let mut tree = Tree::from_root(sample()).unwrap();
        assert_eq!(
            tree.attach_node(Node::new("Other"), None, 0, false).unwrap_err(),
            VdomError::RootOccupied
        );
        assert_eq!(
            tree.attach_node(Node::new("Other"), Some("missing"), 0, false).unwrap_err(),
            VdomError::KeyNotFound("missing".into())
        );
    }

    #[test]
    fn test_detach_removes_descendant_keys() {
        let mut tree = Tree::from_root(sample()).unwrap();
        let removed = tree.detach_subtree("list").unwrap();

        assert_eq!(removed.count(), 4);
        assert!(!tree.contains_key("a"));
        assert!(!tree.contains_key("list"));
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.root().unwrap().child_count(), 1);
    }

    #[test]
    fn test_detach_root_empties_tree() {
        let mut tree = Tree::from_root(sample()).unwrap();
        tree.detach_subtree("app").unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn test_update_props_bubbles_hash() {
        let mut tree = Tree::from_root(sample()).unwrap();
        let root_before = tree.root().and_then(|r| r.subtree_hash());
        let list_before = tree.lookup("list").and_then(|r| r.subtree_hash());

        let delta = PropsDelta::new().with_set("title", "About").with_set("icon", "i");
        tree.update_node_props("header", &delta).unwrap();

        let header = tree.lookup("header").unwrap();
        assert_eq!(header.props().get("title"), Some(&Value::from("About")));
        assert!(header.is_props_dirty());
        assert_ne!(tree.root().and_then(|r| r.subtree_hash()), root_before);
        assert_eq!(tree.lookup("list").and_then(|r| r.subtree_hash()), list_before);
        assert!(tree.dirty_state().dirty_keys.contains("header"));
    }

    #[test]
    fn test_hash_matches_fresh_build() {
        let mut tree = Tree::from_root(sample()).unwrap();
        tree.move_node("b", 0).unwrap();
        tree.update_node_props("a", &PropsDelta::new().with_set("x", 1)).unwrap();

        let rebuilt = Tree::from_root(tree.to_node().unwrap()).unwrap();
        assert_eq!(
            tree.root().and_then(|r| r.subtree_hash()),
            rebuilt.root().and_then(|r| r.subtree_hash())
        );
    }

    #[test]
    fn test_move_node_clamps() {
        let mut tree = Tree::from_root(sample()).unwrap();
        tree.move_node("a", 10).unwrap();

        let keys: Vec<_> = tree.lookup("list").unwrap().children().map(|c| c.key()).collect();
        assert_eq!(keys, vec![Some("b"), None, Some("a")]);
        assert_eq!(tree.move_node("nope", 0).unwrap_err(), VdomError::KeyNotFound("nope".into()));
    }

    #[test]
    fn test_consume_and_reset_dirty_state() {
        let mut tree = Tree::from_root(sample()).unwrap();
        assert!(tree.consume_dirty_state().is_none());

        tree.move_node("a", 1).unwrap();
        let state = tree.consume_dirty_state().unwrap();
        assert!(state.structural_keys.contains("list"));
        assert!(tree.consume_dirty_state().is_none());

        assert!(tree.lookup("list").unwrap().is_structural_dirty());
        tree.reset_dirty_tracking();
        assert!(!tree.lookup("list").unwrap().is_dirty());
    }

    #[test]
    fn test_clone_lineage() {
        let mut base = Tree::from_root(sample()).unwrap();
        let fork = base.clone();

        assert_ne!(fork.id(), base.id());
        assert!(fork.is_derived_from(&base));
        assert!(!base.is_derived_from(&fork));

        base.move_node("a", 1).unwrap();
        assert!(!fork.is_derived_from(&base));
    }

    #[test]
    fn test_reset_drops_lineage() {
        let base = Tree::from_root(sample()).unwrap();
        let mut fork = base.clone();
        fork.update_node_props("a", &PropsDelta::new().with_set("v", 2)).unwrap();
        fork.reset_dirty_tracking();
        assert!(!fork.is_derived_from(&base));

        let mut fork = base.clone();
        fork.move_node("a", 1).unwrap();
        assert!(fork.consume_dirty_state().is_some());
        assert!(!fork.is_derived_from(&base));
    }

    #[test]
    fn test_set_root_replaces_everything() {
        let mut tree = Tree::from_root(sample()).unwrap();
        let previous = tree.set_root(Some(Node::keyed("Login", "login"))).unwrap();

        assert_eq!(previous, Some(sample()));
        assert_eq!(tree.node_count(), 1);
        assert!(tree.contains_key("login"));
        assert!(!tree.contains_key("app"));

        tree.set_root(None).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_without_hashing() {
        let tree = Tree::without_hashing().with_root(sample()).unwrap();
        assert!(tree.root().unwrap().subtree_hash().is_none());
        assert!(tree.hash_computer().is_none());

        let hashed = tree.clone().with_hash_computer(Arc::new(DefaultHashComputer));
        assert_eq!(
            hashed.root().and_then(|r| r.subtree_hash()),
            Tree::from_root(sample()).unwrap().root().and_then(|r| r.subtree_hash())
        );
    }
}
