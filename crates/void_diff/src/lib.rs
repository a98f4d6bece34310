//! # Void Diff - VDOM Diffing Engine
//!
//! Computes the minimal, key-addressed patch list between two trees.
//!
//! ## Pipeline
//!
//! ```text
//! DiffingEngine::diff(old, new)
//!     ├── same tree? ─────────────► []
//!     ├── DiffCache hit? ─────────► cached patches
//!     ├── select algorithm (simple / keyed / incremental)
//!     │       └── TreeReconciler + KeyedPlanner
//!     ├── PatchOptimizer (large batches)
//!     └── cache + return
//! ```
//!
//! Patches come out grouped by phase (removes, adds, moves, prop updates,
//! root replacement) so applying them in order is always valid.

pub mod algorithms;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod hash_index;
pub mod optimizer;
pub mod planner;
pub mod reconciler;

pub use algorithms::{AlgorithmKind, DiffAlgorithm, IncrementalDiff, KeyedDiff, SimpleDiff};
pub use cache::{CacheStats, DiffCache};
pub use config::DiffConfig;
pub use engine::{DiffingEngine, EngineStats};
pub use error::{DiffError, ReconcileError, Result};
pub use hash_index::HashIndex;
pub use optimizer::{OptimizerStats, PatchBatch, PatchOptimizer};
pub use planner::{ChildMatching, ChildSlot, DefaultKeyedPlanner, KeyedPlanner, PlanError, PlannedMove};
pub use reconciler::TreeReconciler;

pub mod prelude {
    pub use crate::{DiffConfig, DiffError, DiffingEngine, KeyedPlanner, TreeReconciler};
}
