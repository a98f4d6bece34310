//! Owned node snapshots
//!
//! A [`Node`] is the value form of a subtree. Producers build snapshots with
//! the builder methods, [`Tree::from_root`](crate::tree::Tree::from_root)
//! loads them into an arena, and `AddNode`/`ReplaceRoot` patches carry them.

use serde::{Deserialize, Serialize};

use crate::hash::HashComputer;
use crate::value::{Props, Value};

/// Owned snapshot of a node and its descendants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Component type tag
    pub component_name: String,
    /// Stable identity among siblings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Props in key order
    #[serde(default)]
    pub props: Props,
    /// Ordered children
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    /// Create an unkeyed node with no props or children
    pub fn new(component_name: impl Into<String>) -> Self {
        Self {
            component_name: component_name.into(),
            ..Default::default()
        }
    }

    /// Create a keyed node
    pub fn keyed(component_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(component_name).with_key(key)
    }

    /// Set the key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set a prop
    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Append a child
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Append several children
    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    /// Number of nodes in this subtree, including self
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }

    /// Keys in this subtree in depth-first pre-order
    pub fn keys(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_keys(&mut out);
        out
    }

    fn collect_keys<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(key) = &self.key {
            out.push(key);
        }
        for child in &self.children {
            child.collect_keys(out);
        }
    }

    /// Recursive content hash, used when a tree has no memoized hashes
    pub fn structural_hash(&self, hasher: &dyn HashComputer) -> u64 {
        let child_hashes: Vec<u64> = self
            .children
            .iter()
            .map(|c| c.structural_hash(hasher))
            .collect();
        hasher.combine(
            &self.component_name,
            self.key.as_deref(),
            hasher.props_hash(&self.props),
            &child_hashes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::DefaultHashComputer;

    #[test]
    fn test_builder() {
        let node = Node::keyed("List", "list")
            .with_prop("gap", 4)
            .with_child(Node::keyed("Item", "a"))
            .with_child(Node::new("Divider"));

        assert_eq!(node.count(), 3);
        assert_eq!(node.keys(), vec!["list", "a"]);
        assert_eq!(node.props.get("gap"), Some(&Value::Int(4)));
    }

    #[test]
    fn test_structural_hash_tracks_order() {
        let hasher = DefaultHashComputer;
        let a = Node::new("Row").with_children([Node::keyed("A", "a"), Node::keyed("B", "b")]);
        let b = Node::new("Row").with_children([Node::keyed("B", "b"), Node::keyed("A", "a")]);

        assert_eq!(a.structural_hash(&hasher), a.clone().structural_hash(&hasher));
        assert_ne!(a.structural_hash(&hasher), b.structural_hash(&hasher));
    }

    #[test]
    fn test_json_fixture() {
        let node: Node = serde_json::from_str(
            r#"{"component_name":"Text","key":"t","props":{"value":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(node.key.as_deref(), Some("t"));
        assert!(node.children.is_empty());
    }
}
