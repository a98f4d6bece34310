//! Generational node arena
//!
//! Tree nodes live in slots addressed by [`NodeId`]. Parent, child and key
//! map links are ids, so removing a subtree can never leave a dangling
//! reference: a stale id simply fails its generation check.

use crate::value::Props;

/// Handle to a node slot with generation tracking
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    #[inline]
    const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Get the raw slot index
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Get the generation
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Node payload stored in the arena
#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub component_name: String,
    pub key: Option<String>,
    pub props: Props,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub props_dirty: bool,
    pub structural_dirty: bool,
    /// Some descendant changed since the last reset
    pub subtree_dirty: bool,
    pub props_hash: Option<u64>,
    pub subtree_hash: Option<u64>,
}

#[derive(Debug, Clone)]
struct Slot {
    value: Option<NodeData>,
    generation: u32,
}

/// Slot storage for [`NodeData`]
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeArena {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    len: usize,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: NodeData) -> NodeId {
        self.len += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            NodeId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                value: Some(value),
                generation: 0,
            });
            NodeId::new(index, 0)
        }
    }

    pub fn remove(&mut self, id: NodeId) -> Option<NodeData> {
        let slot = self.slots.get_mut(id.index as usize)?;

        if slot.generation != id.generation || slot.value.is_none() {
            return None;
        }

        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
        self.len -= 1;

        slot.value.take()
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut NodeData> {
        self.slots.iter_mut().filter_map(|slot| slot.value.as_mut())
    }

    pub fn clear(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.is_some() {
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(i as u32);
            }
        }
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(name: &str) -> NodeData {
        NodeData {
            component_name: name.to_string(),
            key: None,
            props: Props::new(),
            children: Vec::new(),
            parent: None,
            props_dirty: false,
            structural_dirty: false,
            subtree_dirty: false,
            props_hash: None,
            subtree_hash: None,
        }
    }

    #[test]
    fn test_arena_generation() {
        let mut arena = NodeArena::new();

        let first = arena.insert(data("A"));
        assert!(arena.remove(first).is_some());

        let second = arena.insert(data("B"));

        // Same slot, new generation
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second).map(|n| n.component_name.as_str()), Some("B"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_arena_clear_invalidates_ids() {
        let mut arena = NodeArena::new();
        let id = arena.insert(data("A"));
        arena.clear();
        assert!(arena.get(id).is_none());
        assert_eq!(arena.len(), 0);
    }
}
