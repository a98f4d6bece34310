//! # void_memory - Object Pools
//!
//! Reusable-object pools for allocation-heavy hot paths:
//! - [`ObjectPool`]: generic free-list pool with reset-on-release,
//!   capacity cap and idle eviction
//! - [`PatchObjectPool`]: one pool per patch kind

pub mod patch_pool;
pub mod pool;

pub use patch_pool::{PatchObjectPool, PoolError, PooledPatch};
pub use pool::{ObjectPool, PoolConfig, PoolStats, Poolable, Pooled};

pub mod prelude {
    pub use crate::{ObjectPool, PatchObjectPool, PoolConfig, PoolStats, Poolable};
}
