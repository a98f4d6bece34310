//! Component lifecycle tracking
//!
//! Components are created through factories registered per component name
//! and tracked by node key. Lifecycle callbacks are never invoked directly;
//! they are queued on the [`EffectScheduler`] and run after the commit.

use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use void_vdom::{NodeRef, PropsDelta};

use crate::scheduler::{EffectResult, EffectScheduler};

/// User component bound to a keyed node
pub trait Component: Send + Sync {
    /// Node entered the live tree
    fn on_mount(&self) -> EffectResult {
        Ok(())
    }

    /// Node props changed
    fn on_update(&self, _delta: &PropsDelta) -> EffectResult {
        Ok(())
    }

    /// Node left the live tree
    fn on_unmount(&self) -> EffectResult {
        Ok(())
    }
}

/// Builds a component for a freshly attached node
pub type ComponentFactory = Arc<dyn Fn(NodeRef<'_>) -> Arc<dyn Component> + Send + Sync>;

/// Mounted components by key
#[derive(Default)]
pub struct ComponentLifecycle {
    factories: RwLock<HashMap<String, ComponentFactory>>,
    mounted: Mutex<HashMap<String, Arc<dyn Component>>>,
}

impl ComponentLifecycle {
    /// Create an empty lifecycle tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory used for nodes named `component_name`
    pub fn register<F>(&self, component_name: impl Into<String>, factory: F)
    where
        F: Fn(NodeRef<'_>) -> Arc<dyn Component> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(component_name.into(), Arc::new(factory));
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_factory<F>(self, component_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(NodeRef<'_>) -> Arc<dyn Component> + Send + Sync + 'static,
    {
        self.register(component_name, factory);
        self
    }

    /// Mount a component for `node` if it is keyed and its name has a factory
    pub fn mount(&self, node: NodeRef<'_>, scheduler: &EffectScheduler) -> bool {
        let Some(key) = node.key() else {
            return false;
        };
        let Some(factory) = self.factories.read().get(node.component_name()).cloned() else {
            return false;
        };

        if self.is_mounted(key) {
            log::warn!("Component for key '{}' is already mounted", key);
            return false;
        }

        // The factory runs unlocked and may call back into the lifecycle
        let component = factory(node);
        match self.mounted.lock().entry(key.to_string()) {
            Entry::Occupied(_) => {
                log::warn!("Component for key '{}' was mounted concurrently", key);
                return false;
            }
            Entry::Vacant(slot) => {
                slot.insert(component.clone());
            }
        }

        scheduler.on_component_mounted(key, move || component.on_mount());
        true
    }

    /// Mount every node of a subtree, parents first
    pub fn mount_subtree(&self, root: NodeRef<'_>, scheduler: &EffectScheduler) -> usize {
        let mut count = usize::from(self.mount(root, scheduler));
        for child in root.children() {
            count += self.mount_subtree(child, scheduler);
        }
        count
    }

    /// Queue an update callback for a mounted key
    pub fn update(&self, key: &str, delta: &PropsDelta, scheduler: &EffectScheduler) -> bool {
        let Some(component) = self.mounted.lock().get(key).cloned() else {
            return false;
        };
        let delta = delta.clone();
        scheduler.on_component_updated(key, move || component.on_update(&delta));
        true
    }

    /// Forget a mounted key and queue its unmount callback
    pub fn unmount(&self, key: &str, scheduler: &EffectScheduler) -> bool {
        let Some(component) = self.mounted.lock().remove(key) else {
            log::trace!("No mounted component for key '{}'", key);
            return false;
        };
        scheduler.on_component_unmounted(key, move || component.on_unmount());
        true
    }

    /// Unmount a list of keys given in pre-order, descendants first
    pub fn unmount_keys<S: AsRef<str>>(&self, keys: &[S], scheduler: &EffectScheduler) -> usize {
        keys.iter()
            .rev()
            .filter(|key| self.unmount(AsRef::<str>::as_ref(*key), scheduler))
            .count()
    }

    /// Check if a key has a mounted component
    pub fn is_mounted(&self, key: &str) -> bool {
        self.mounted.lock().contains_key(key)
    }

    /// Mounted keys, sorted
    pub fn mounted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.mounted.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of mounted components
    pub fn len(&self) -> usize {
        self.mounted.lock().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
