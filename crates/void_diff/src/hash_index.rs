//! Side table of subtree hashes
//!
//! Trees built without memoized hashing still benefit from subtree
//! skipping; the incremental algorithm computes a [`HashIndex`] for both
//! trees up front and the reconciler consults it instead of the nodes.

use std::collections::HashMap;
use void_vdom::{HashComputer, NodeId, NodeRef, Tree};

/// Subtree hash per node id for one tree
#[derive(Debug, Clone, Default)]
pub struct HashIndex {
    hashes: HashMap<NodeId, u64>,
}

impl HashIndex {
    /// Hash every node of `tree` with `hasher`
    pub fn build(tree: &Tree, hasher: &dyn HashComputer) -> Self {
        let mut hashes = HashMap::with_capacity(tree.node_count());
        if let Some(root) = tree.root() {
            hash_subtree(root, hasher, &mut hashes);
        }
        Self { hashes }
    }

    /// Hash of the subtree rooted at `id`
    pub fn get(&self, id: NodeId) -> Option<u64> {
        self.hashes.get(&id).copied()
    }

    /// Number of hashed nodes
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Content hash of a whole tree; memoized when available, `0` when empty
pub fn tree_hash(tree: &Tree, hasher: &dyn HashComputer) -> u64 {
    match tree.root() {
        Some(root) => root
            .subtree_hash()
            .unwrap_or_else(|| hash_subtree(root, hasher, &mut HashMap::new())),
        None => 0,
    }
}

fn hash_subtree(node: NodeRef<'_>, hasher: &dyn HashComputer, out: &mut HashMap<NodeId, u64>) -> u64 {
    let child_hashes: Vec<u64> = node
        .children()
        .map(|child| hash_subtree(child, hasher, out))
        .collect();
    let hash = hasher.combine(
        node.component_name(),
        node.key(),
        hasher.props_hash(node.props()),
        &child_hashes,
    );
    out.insert(node.id(), hash);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_vdom::{DefaultHashComputer, Node};

    fn sample() -> Node {
        Node::keyed("App", "root")
            .with_child(Node::keyed("Item", "a").with_prop("n", 1))
            .with_child(Node::new("Spacer"))
    }

    #[test]
    fn test_index_matches_memoized_hashes() {
        let hashed = Tree::from_root(sample()).unwrap();
        let plain = Tree::without_hashing().with_root(sample()).unwrap();
        let index = HashIndex::build(&plain, &DefaultHashComputer);

        assert_eq!(index.len(), 3);
        let memo = hashed.lookup("a").unwrap().subtree_hash();
        assert_eq!(index.get(plain.lookup("a").unwrap().id()), memo);
    }

    #[test]
    fn test_tree_hash() {
        let hashed = Tree::from_root(sample()).unwrap();
        let plain = Tree::without_hashing().with_root(sample()).unwrap();
        assert_eq!(
            tree_hash(&hashed, &DefaultHashComputer),
            tree_hash(&plain, &DefaultHashComputer)
        );
        assert_eq!(
            tree_hash(&hashed, &DefaultHashComputer),
            sample().structural_hash(&DefaultHashComputer)
        );
        assert_eq!(tree_hash(&Tree::new(), &DefaultHashComputer), 0);
    }
}
