//! Child matching and move planning
//!
//! A [`KeyedPlanner`] decides which old child corresponds to which new
//! child under one parent, and which `MoveNode` operations turn the
//! post-insert child order into the target order.

use std::collections::HashMap;
use thiserror::Error;

/// Identity of one child as seen by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildSlot<'a> {
    pub key: Option<&'a str>,
    pub component_name: &'a str,
}

impl<'a> ChildSlot<'a> {
    /// Create a slot
    pub fn new(key: Option<&'a str>, component_name: &'a str) -> Self {
        Self {
            key,
            component_name,
        }
    }

    /// Same key and component, or both unkeyed with the same component
    pub fn same_identity(&self, other: &ChildSlot<'_>) -> bool {
        self.key == other.key && self.component_name == other.component_name
    }
}

/// Result of matching one child list against another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildMatching {
    /// For each new child, the index of its old counterpart
    pub new_to_old: Vec<Option<usize>>,
}

impl ChildMatching {
    /// Matching with every new child unmatched
    pub fn unmatched(len: usize) -> Self {
        Self {
            new_to_old: vec![None; len],
        }
    }

    /// Number of matched pairs
    pub fn matched_count(&self) -> usize {
        self.new_to_old.iter().filter(|m| m.is_some()).count()
    }
}

/// A reposition of one child within its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMove {
    /// Index of the child in the new list
    pub child: usize,
    /// Destination index at the time the move is applied
    pub to: usize,
}

/// Move planning failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Current order is not a permutation of the new children
    #[error("current order has {found} entries, expected a permutation of {expected}")]
    NotPermutation { expected: usize, found: usize },

    /// An unkeyed child would have to move
    #[error("unkeyed child at new index {0} is out of place")]
    UnkeyedMove(usize),
}

/// Strategy for matching children and planning moves
pub trait KeyedPlanner: Send + Sync {
    /// Pair old children with new children
    fn match_children(&self, old: &[ChildSlot<'_>], new: &[ChildSlot<'_>]) -> ChildMatching;

    /// Plan moves turning `current` into `0..new.len()`.
    ///
    /// `current[i]` is the new index of the child sitting at position `i`
    /// once removals and insertions have been applied.
    fn plan_moves(
        &self,
        current: &[usize],
        new: &[ChildSlot<'_>],
    ) -> Result<Vec<PlannedMove>, PlanError>;

    /// Strategy name used in logs
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Key-map matching with a positional fallback for unkeyed children
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyedPlanner;

impl DefaultKeyedPlanner {
    /// Create the default planner
    pub fn new() -> Self {
        Self
    }

    /// Match by key within `old[old_range]` / `new[new_range]`, then zip the
    /// unkeyed leftovers in order
    fn match_middle(
        old: &[ChildSlot<'_>],
        new: &[ChildSlot<'_>],
        old_range: std::ops::Range<usize>,
        new_range: std::ops::Range<usize>,
        matching: &mut ChildMatching,
    ) {
        let mut by_key: HashMap<&str, usize> = HashMap::new();
        let mut old_unkeyed = Vec::new();
        for oi in old_range {
            match old[oi].key {
                Some(key) => {
                    by_key.insert(key, oi);
                }
                None => old_unkeyed.push(oi),
            }
        }

        let mut new_unkeyed = Vec::new();
        for ni in new_range {
            match new[ni].key {
                Some(key) => {
                    if let Some(&oi) = by_key.get(key) {
                        if old[oi].component_name == new[ni].component_name {
                            matching.new_to_old[ni] = Some(oi);
                        }
                    }
                }
                None => new_unkeyed.push(ni),
            }
        }

        for (&oi, &ni) in old_unkeyed.iter().zip(new_unkeyed.iter()) {
            if old[oi].component_name == new[ni].component_name {
                matching.new_to_old[ni] = Some(oi);
            }
        }
    }
}

impl KeyedPlanner for DefaultKeyedPlanner {
    fn match_children(&self, old: &[ChildSlot<'_>], new: &[ChildSlot<'_>]) -> ChildMatching {
        let mut matching = ChildMatching::unmatched(new.len());

        let all_keyed = old.iter().chain(new.iter()).all(|slot| slot.key.is_some());
        if all_keyed {
            Self::match_middle(old, new, 0..old.len(), 0..new.len(), &mut matching);
            return matching;
        }

        // Common prefix
        let mut start = 0;
        while start < old.len() && start < new.len() && old[start].same_identity(&new[start]) {
            matching.new_to_old[start] = Some(start);
            start += 1;
        }

        // Common suffix
        let (mut old_end, mut new_end) = (old.len(), new.len());
        while old_end > start && new_end > start && old[old_end - 1].same_identity(&new[new_end - 1])
        {
            old_end -= 1;
            new_end -= 1;
            matching.new_to_old[new_end] = Some(old_end);
        }

        Self::match_middle(old, new, start..old_end, start..new_end, &mut matching);
        matching
    }

    fn plan_moves(
        &self,
        current: &[usize],
        new: &[ChildSlot<'_>],
    ) -> Result<Vec<PlannedMove>, PlanError> {
        let n = new.len();
        let mut seen = vec![false; n];
        for &c in current {
            if c >= n || std::mem::replace(&mut seen[c], true) {
                return Err(PlanError::NotPermutation {
                    expected: n,
                    found: current.len(),
                });
            }
        }
        if current.len() != n {
            return Err(PlanError::NotPermutation {
                expected: n,
                found: current.len(),
            });
        }

        let mut order = current.to_vec();
        let mut moves = Vec::new();

        for i in 0..n {
            // Each blocker pushed to the end is behind `i` for good, so at
            // most n - i rotations happen here.
            let mut rotations = 0;
            while order[i] != i {
                if new[i].key.is_some() {
                    let from = order[i + 1..]
                        .iter()
                        .position(|&c| c == i)
                        .map(|offset| i + 1 + offset)
                        .ok_or(PlanError::NotPermutation {
                            expected: n,
                            found: current.len(),
                        })?;
                    order.remove(from);
                    order.insert(i, i);
                    moves.push(PlannedMove { child: i, to: i });
                } else {
                    let blocker = order[i];
                    if new[blocker].key.is_none() || rotations > n {
                        return Err(PlanError::UnkeyedMove(i));
                    }
                    order.remove(i);
                    order.push(blocker);
                    moves.push(PlannedMove {
                        child: blocker,
                        to: n - 1,
                    });
                    rotations += 1;
                }
            }
        }

        Ok(moves)
    }

    fn name(&self) -> &'static str {
        "default"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed<'a>(keys: &[&'a str]) -> Vec<ChildSlot<'a>> {
        keys.iter().map(|k| ChildSlot::new(Some(k), "Item")).collect()
    }

    /// Apply planned moves the way a tree would
    fn apply(current: &[usize], moves: &[PlannedMove]) -> Vec<usize> {
        let mut order = current.to_vec();
        for m in moves {
            let from = order.iter().position(|&c| c == m.child).unwrap();
            let child = order.remove(from);
            order.insert(m.to.min(order.len()), child);
        }
        order
    }

    #[test]
    fn test_keyed_matching() {
        let planner = DefaultKeyedPlanner::new();
        let old = keyed(&["a", "b", "c"]);
        let new = keyed(&["c", "a", "d"]);
        let matching = planner.match_children(&old, &new);
        assert_eq!(matching.new_to_old, vec![Some(2), Some(0), None]);
        assert_eq!(matching.matched_count(), 2);
    }

    #[test]
    fn test_same_key_different_component_unmatched() {
        let planner = DefaultKeyedPlanner::new();
        let old = vec![ChildSlot::new(Some("a"), "Button")];
        let new = vec![ChildSlot::new(Some("a"), "Label")];
        assert_eq!(planner.match_children(&old, &new).new_to_old, vec![None]);
    }

    #[test]
    fn test_mixed_prefix_suffix_and_zip() {
        let planner = DefaultKeyedPlanner::new();
        let old = vec![
            ChildSlot::new(None, "Header"),
            ChildSlot::new(Some("x"), "Item"),
            ChildSlot::new(None, "Spacer"),
            ChildSlot::new(None, "Footer"),
        ];
        let new = vec![
            ChildSlot::new(None, "Header"),
            ChildSlot::new(None, "Spacer"),
            ChildSlot::new(Some("y"), "Item"),
            ChildSlot::new(Some("x"), "Item"),
            ChildSlot::new(None, "Footer"),
        ];
        let matching = planner.match_children(&old, &new);
        assert_eq!(
            matching.new_to_old,
            vec![Some(0), Some(2), None, Some(1), Some(3)]
        );
    }

    #[test]
    fn test_zip_requires_same_component() {
        let planner = DefaultKeyedPlanner::new();
        let old = vec![ChildSlot::new(None, "A"), ChildSlot::new(None, "B")];
        let new = vec![ChildSlot::new(None, "A"), ChildSlot::new(None, "C")];
        assert_eq!(
            planner.match_children(&old, &new).new_to_old,
            vec![Some(0), None]
        );
    }

    #[test]
    fn test_rotation_is_single_move() {
        let planner = DefaultKeyedPlanner::new();
        let new = keyed(&["c", "a", "b"]);
        // old [a, b, c] expressed in new indices
        let current = [1, 2, 0];
        let moves = planner.plan_moves(&current, &new).unwrap();
        assert_eq!(moves, vec![PlannedMove { child: 0, to: 0 }]);
        assert_eq!(apply(&current, &moves), vec![0, 1, 2]);
    }

    #[test]
    fn test_in_order_needs_no_moves() {
        let planner = DefaultKeyedPlanner::new();
        let new = keyed(&["a", "b", "c"]);
        assert!(planner.plan_moves(&[0, 1, 2], &new).unwrap().is_empty());
    }

    #[test]
    fn test_unkeyed_slot_moves_keyed_blocker() {
        let planner = DefaultKeyedPlanner::new();
        let new = vec![
            ChildSlot::new(None, "Spacer"),
            ChildSlot::new(Some("k"), "Item"),
        ];
        let current = [1, 0];
        let moves = planner.plan_moves(&current, &new).unwrap();
        assert_eq!(moves, vec![PlannedMove { child: 1, to: 1 }]);
        assert_eq!(apply(&current, &moves), vec![0, 1]);
    }

    #[test]
    fn test_reverse_converges() {
        let planner = DefaultKeyedPlanner::new();
        let new = keyed(&["a", "b", "c", "d", "e"]);
        let current = [4, 3, 2, 1, 0];
        let moves = planner.plan_moves(&current, &new).unwrap();
        assert_eq!(apply(&current, &moves), vec![0, 1, 2, 3, 4]);
        assert!(moves.len() <= 4);
    }

    #[test]
    fn test_rejects_non_permutation() {
        let planner = DefaultKeyedPlanner::new();
        let new = keyed(&["a", "b"]);
        assert!(matches!(
            planner.plan_moves(&[0, 0], &new),
            Err(PlanError::NotPermutation { .. })
        ));
    }
}
