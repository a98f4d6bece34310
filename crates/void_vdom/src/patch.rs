//! Patch types
//!
//! A patch is one structural edit against a live [`Tree`](crate::tree::Tree).
//! Ordering inside a patch list is significant: removals run before
//! additions so a key freed by one node can be taken by another.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::node::Node;
use crate::value::{Props, Value};

// ============================================================================
// Props delta
// ============================================================================

/// Change to a single prop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropChange {
    /// Prop added or changed
    Set(Value),
    /// Prop removed from a surviving node
    Remove,
}

/// Per-key prop changes carried by `UpdateProps`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropsDelta {
    entries: BTreeMap<String, PropChange>,
}

impl PropsDelta {
    /// Create an empty delta
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the changed/added keys of `new` plus the keys dropped from `old`
    pub fn between(old: &Props, new: &Props) -> Self {
        let mut delta = Self::new();
        for (name, value) in new {
            if old.get(name) != Some(value) {
                delta.set(name.clone(), value.clone());
            }
        }
        for name in old.keys() {
            if !new.contains_key(name) {
                delta.remove(name.clone());
            }
        }
        delta
    }

    /// Record a set
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.entries.insert(name.into(), PropChange::Set(value.into()));
        self
    }

    /// Record a removal
    pub fn remove(&mut self, name: impl Into<String>) -> &mut Self {
        self.entries.insert(name.into(), PropChange::Remove);
        self
    }

    /// Builder form of [`set`](Self::set)
    pub fn with_set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Builder form of [`remove`](Self::remove)
    pub fn with_remove(mut self, name: impl Into<String>) -> Self {
        self.remove(name);
        self
    }

    /// Get the change recorded for a prop
    pub fn get(&self, name: &str) -> Option<&PropChange> {
        self.entries.get(name)
    }

    /// Iterate all changes in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropChange)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate the set entries
    pub fn changed(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().filter_map(|(k, v)| match v {
            PropChange::Set(value) => Some((k.as_str(), value)),
            PropChange::Remove => None,
        })
    }

    /// Iterate the removed prop names
    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|(k, v)| match v {
            PropChange::Remove => Some(k.as_str()),
            PropChange::Set(_) => None,
        })
    }

    /// Merge a later delta into this one; later entries win
    pub fn merge(&mut self, later: PropsDelta) {
        self.entries.extend(later.entries);
    }

    /// Apply to a prop map in place
    pub fn apply_to(&self, props: &mut Props) {
        for (name, change) in &self.entries {
            match change {
                PropChange::Set(value) => {
                    props.insert(name.clone(), value.clone());
                }
                PropChange::Remove => {
                    props.remove(name);
                }
            }
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl From<Props> for PropsDelta {
    fn from(props: Props) -> Self {
        Self {
            entries: props
                .into_iter()
                .map(|(k, v)| (k, PropChange::Set(v)))
                .collect(),
        }
    }
}

// ============================================================================
// Patch
// ============================================================================

/// Kind of a patch, in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchKind {
    /// Remove a keyed subtree
    RemoveNode,
    /// Insert a subtree under a keyed parent
    AddNode,
    /// Reposition a keyed node among its siblings
    MoveNode,
    /// Merge a props delta into a keyed node
    UpdateProps,
    /// Swap the whole tree
    ReplaceRoot,
}

impl PatchKind {
    /// All kinds in application order
    pub const ALL: [PatchKind; 5] = [
        PatchKind::RemoveNode,
        PatchKind::AddNode,
        PatchKind::MoveNode,
        PatchKind::UpdateProps,
        PatchKind::ReplaceRoot,
    ];

    /// Application priority (lower applies first)
    pub fn order(self) -> u8 {
        match self {
            PatchKind::RemoveNode => 0,
            PatchKind::AddNode => 1,
            PatchKind::MoveNode => 2,
            PatchKind::UpdateProps => 3,
            PatchKind::ReplaceRoot => 4,
        }
    }

    /// Stable string name
    pub fn as_str(self) -> &'static str {
        match self {
            PatchKind::RemoveNode => "remove_node",
            PatchKind::AddNode => "add_node",
            PatchKind::MoveNode => "move_node",
            PatchKind::UpdateProps => "update_props",
            PatchKind::ReplaceRoot => "replace_root",
        }
    }

    /// Parse a stable string name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl std::fmt::Display for PatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structural edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Patch {
    /// Insert `node` as child `index` of `parent_key`
    AddNode {
        node: Node,
        parent_key: String,
        index: usize,
    },
    /// Remove the subtree rooted at `key`
    RemoveNode { key: String },
    /// Merge `delta` into the props of `key`
    UpdateProps { key: String, delta: PropsDelta },
    /// Replace the root; `None` clears the tree
    ReplaceRoot { root: Option<Node> },
    /// Move `key` to `new_index` among its siblings
    MoveNode { key: String, new_index: usize },
}

impl Patch {
    /// Create an add patch
    pub fn add_node(node: Node, parent_key: impl Into<String>, index: usize) -> Self {
        Self::AddNode {
            node,
            parent_key: parent_key.into(),
            index,
        }
    }

    /// Create a remove patch
    pub fn remove_node(key: impl Into<String>) -> Self {
        Self::RemoveNode { key: key.into() }
    }

    /// Create a props update patch
    pub fn update_props(key: impl Into<String>, delta: PropsDelta) -> Self {
        Self::UpdateProps {
            key: key.into(),
            delta,
        }
    }

    /// Create a root replacement patch
    pub fn replace_root(root: Option<Node>) -> Self {
        Self::ReplaceRoot { root }
    }

    /// Create a move patch
    pub fn move_node(key: impl Into<String>, new_index: usize) -> Self {
        Self::MoveNode {
            key: key.into(),
            new_index,
        }
    }

    /// Empty patch of the given kind, as handed out by patch pools
    pub fn blank(kind: PatchKind) -> Self {
        match kind {
            PatchKind::AddNode => Self::AddNode {
                node: Node::default(),
                parent_key: String::new(),
                index: 0,
            },
            PatchKind::RemoveNode => Self::RemoveNode { key: String::new() },
            PatchKind::UpdateProps => Self::UpdateProps {
                key: String::new(),
                delta: PropsDelta::new(),
            },
            PatchKind::ReplaceRoot => Self::ReplaceRoot { root: None },
            PatchKind::MoveNode => Self::MoveNode {
                key: String::new(),
                new_index: 0,
            },
        }
    }

    /// Reset every field to the [`blank`](Self::blank) value, keeping string capacity
    pub fn clear(&mut self) {
        match self {
            Self::AddNode {
                node,
                parent_key,
                index,
            } => {
                node.component_name.clear();
                node.key = None;
                node.props.clear();
                node.children.clear();
                parent_key.clear();
                *index = 0;
            }
            Self::RemoveNode { key } => key.clear(),
            Self::UpdateProps { key, delta } => {
                key.clear();
                delta.clear();
            }
            Self::ReplaceRoot { root } => *root = None,
            Self::MoveNode { key, new_index } => {
                key.clear();
                *new_index = 0;
            }
        }
    }

    /// Get the patch kind
    pub fn kind(&self) -> PatchKind {
        match self {
            Self::AddNode { .. } => PatchKind::AddNode,
            Self::RemoveNode { .. } => PatchKind::RemoveNode,
            Self::UpdateProps { .. } => PatchKind::UpdateProps,
            Self::ReplaceRoot { .. } => PatchKind::ReplaceRoot,
            Self::MoveNode { .. } => PatchKind::MoveNode,
        }
    }

    /// Key the patch targets (the inserted node's key for `AddNode`)
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::AddNode { node, .. } => node.key.as_deref(),
            Self::RemoveNode { key } | Self::UpdateProps { key, .. } | Self::MoveNode { key, .. } => {
                Some(key)
            }
            Self::ReplaceRoot { root } => root.as_ref().and_then(|n| n.key.as_deref()),
        }
    }
}
