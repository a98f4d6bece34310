//! # Void VDOM - Virtual DOM Tree Model
//!
//! Data contract shared by the diffing engine and the patcher.
//!
//! ## Key Concepts
//!
//! - **Node**: owned snapshot of a component subtree (name, key, props, children)
//! - **Tree**: arena-backed live tree with a key index, memoized subtree
//!   hashes and dirty tracking
//! - **Patch**: one structural edit (add, remove, update props, move, replace root)
//! - **Host bindings**: optional renderer capabilities invoked while patching

pub mod arena;
pub mod error;
pub mod hash;
pub mod host;
pub mod node;
pub mod patch;
pub mod tree;
pub mod value;

pub use arena::NodeId;
pub use error::{HostError, Result, VdomError};
pub use hash::{DefaultHashComputer, HashComputer};
pub use host::{
    BindingRegistry, BindingStats, HostBindingRegistry, HostHandle, HostHooks, HostObject,
};
pub use node::Node;
pub use patch::{Patch, PatchKind, PropChange, PropsDelta};
pub use tree::{DirtyState, NodeRef, Tree, TreeId};
pub use value::{Props, Value};
