//! Content hashing strategy
//!
//! Subtree hashes let the reconciler skip identical branches without a deep
//! comparison. The strategy is a trait so a backend can plug in a faster
//! routine once at startup; all trees compared with each other must use the
//! same implementation.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

use crate::value::Props;

/// Computes prop and subtree hashes
pub trait HashComputer: Send + Sync {
    /// Hash a normalized prop map
    fn props_hash(&self, props: &Props) -> u64;

    /// Combine a node's own data with its children's hashes (in order)
    fn combine(
        &self,
        component_name: &str,
        key: Option<&str>,
        props_hash: u64,
        child_hashes: &[u64],
    ) -> u64;
}

/// Pure software hasher built on `DefaultHasher`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHashComputer;

impl HashComputer for DefaultHashComputer {
    fn props_hash(&self, props: &Props) -> u64 {
        let mut hasher = DefaultHasher::new();
        hasher.write_usize(props.len());
        for (name, value) in props {
            hasher.write(name.as_bytes());
            hasher.write_u8(0xff);
            value.hash_into(&mut hasher);
        }
        hasher.finish()
    }

    fn combine(
        &self,
        component_name: &str,
        key: Option<&str>,
        props_hash: u64,
        child_hashes: &[u64],
    ) -> u64 {
        let mut hasher = DefaultHasher::new();
        hasher.write(component_name.as_bytes());
        hasher.write_u8(0xff);
        match key {
            Some(key) => {
                hasher.write_u8(1);
                hasher.write(key.as_bytes());
                hasher.write_u8(0xff);
            }
            None => hasher.write_u8(0),
        }
        hasher.write_u64(props_hash);
        hasher.write_usize(child_hashes.len());
        for child in child_hashes {
            hasher.write_u64(*child);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_props_hash_ignores_insertion_order() {
        let hasher = DefaultHashComputer;
        let mut a = Props::new();
        a.insert("w".into(), Value::from(10));
        a.insert("h".into(), Value::from(20));
        let mut b = Props::new();
        b.insert("h".into(), Value::from(20));
        b.insert("w".into(), Value::from(10));

        assert_eq!(hasher.props_hash(&a), hasher.props_hash(&b));
    }

    #[test]
    fn test_combine_distinguishes_key() {
        let hasher = DefaultHashComputer;
        let p = hasher.props_hash(&Props::new());
        assert_ne!(
            hasher.combine("Box", Some("a"), p, &[]),
            hasher.combine("Box", None, p, &[])
        );
        assert_ne!(
            hasher.combine("Box", None, p, &[1, 2]),
            hasher.combine("Box", None, p, &[2, 1])
        );
    }
}
