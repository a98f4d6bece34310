//! Host binding capabilities
//!
//! A renderer backend plugs native objects into the tree through two
//! optional capabilities:
//! - [`HostHooks`]: create a native object for a node, push prop deltas to
//!   it, and reposition it
//! - [`BindingRegistry`]: remember which native object belongs to which key
//!
//! Both are optional. A tree without hooks and a patcher without a registry
//! are valid configurations; the corresponding steps are skipped.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::HostError;
use crate::patch::PropsDelta;
use crate::tree::{NodeRef, Tree};

/// Native object bound to a node
pub trait HostObject: Send + Sync + std::fmt::Debug {
    /// Release native resources. The default does nothing.
    fn destroy(&self) -> Result<(), HostError> {
        Ok(())
    }
}

/// Shared handle to a host object
pub type HostHandle = Arc<dyn HostObject>;

/// Renderer hooks carried by a tree. Every method defaults to a no-op.
pub trait HostHooks: Send + Sync {
    /// Create the native object for a freshly attached node
    fn create(&self, _node: NodeRef<'_>) -> Result<Option<HostHandle>, HostError> {
        Ok(None)
    }

    /// Push a props delta to a native object
    fn apply_props(&self, _host: &HostHandle, _delta: &PropsDelta) -> Result<(), HostError> {
        Ok(())
    }

    /// Reposition a native object among its siblings
    fn move_to(&self, _host: &HostHandle, _new_index: usize) -> Result<(), HostError> {
        Ok(())
    }
}

/// Key → host object bookkeeping used during patch application
pub trait BindingRegistry: Send + Sync {
    /// Find the host bound to `key` in `namespace`
    fn lookup_by_key(&self, namespace: &str, key: &str) -> Option<HostHandle>;

    /// A node was attached and a host created for it
    fn on_patch_add_node(&self, tree: &Tree, key: &str, host: HostHandle);

    /// A node is about to be detached
    fn on_patch_remove_node(&self, tree: &Tree, key: &str);
}

/// Binding registry statistics
#[derive(Debug, Clone, Default)]
pub struct BindingStats {
    /// Currently bound keys
    pub bound: usize,
    /// Total binds performed
    pub binds: u64,
    /// Total unbinds performed
    pub unbinds: u64,
}

type BindingKey = (String, String);

#[derive(Default)]
struct RegistryState {
    by_key: HashMap<BindingKey, HostHandle>,
    /// Host identity (allocation address) -> binding
    by_host: HashMap<usize, BindingKey>,
    stats: BindingStats,
}

/// Identity of a host object; stable while the registry holds it
fn host_id(host: &HostHandle) -> usize {
    Arc::as_ptr(host) as *const () as usize
}

impl RegistryState {
    fn forget_host(&mut self, host: &HostHandle, binding: &BindingKey) {
        let id = host_id(host);
        if self.by_host.get(&id) == Some(binding) {
            self.by_host.remove(&id);
        }
    }

    fn removed(&mut self) {
        self.stats.unbinds += 1;
        self.stats.bound = self.by_key.len();
    }
}

/// Thread-safe default [`BindingRegistry`] keyed by `(namespace, key)`
#[derive(Default)]
pub struct HostBindingRegistry {
    state: RwLock<RegistryState>,
}

impl HostBindingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a host to a key, replacing any previous binding
    pub fn register_bind(&self, namespace: &str, key: &str, host: HostHandle) {
        let binding = (namespace.to_string(), key.to_string());
        let mut state = self.state.write();
        let id = host_id(&host);
        if let Some(previous) = state.by_key.insert(binding.clone(), host) {
            log::debug!("Rebinding host for key '{}' in '{}'", key, namespace);
            state.forget_host(&previous, &binding);
        }
        state.by_host.insert(id, binding);
        state.stats.binds += 1;
        state.stats.bound = state.by_key.len();
    }

    /// Remove a binding, returning the host if one was bound
    pub fn remove_by_key(&self, namespace: &str, key: &str) -> Option<HostHandle> {
        let binding = (namespace.to_string(), key.to_string());
        let mut state = self.state.write();
        let removed = state.by_key.remove(&binding)?;
        state.forget_host(&removed, &binding);
        state.removed();
        Some(removed)
    }

    /// Reverse lookup: the `(namespace, key)` a host is bound to
    pub fn lookup_key_by_host(&self, host: &HostHandle) -> Option<(String, String)> {
        self.state.read().by_host.get(&host_id(host)).cloned()
    }

    /// Remove the binding of a host, returning true if it was bound
    pub fn remove_by_host(&self, host: &HostHandle) -> bool {
        let mut state = self.state.write();
        let Some(binding) = state.by_host.remove(&host_id(host)) else {
            return false;
        };
        if state.by_key.remove(&binding).is_some() {
            state.removed();
        }
        true
    }

    /// Keys bound in a namespace
    pub fn iter_bound_keys(&self, namespace: &str) -> Vec<String> {
        let state = self.state.read();
        let mut keys: Vec<String> = state
            .by_key
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of bindings across all namespaces
    pub fn len(&self) -> usize {
        self.state.read().by_key.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get statistics
    pub fn stats(&self) -> BindingStats {
        self.state.read().stats.clone()
    }
}

impl BindingRegistry for HostBindingRegistry {
    fn lookup_by_key(&self, namespace: &str, key: &str) -> Option<HostHandle> {
        self.state
            .read()
            .by_key
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    fn on_patch_add_node(&self, tree: &Tree, key: &str, host: HostHandle) {
        self.register_bind(tree.namespace(), key, host);
    }

    fn on_patch_remove_node(&self, tree: &Tree, key: &str) {
        self.remove_by_key(tree.namespace(), key);
    }
}
