//! Error types for diffing

use thiserror::Error;

/// Failure inside a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// A child id did not resolve in its tree
    #[error("stale node {0}")]
    StaleNode(String),

    /// The keyed planner produced a matching or move list that does not fit the children
    #[error("inconsistent child plan under {parent}: {reason}")]
    InconsistentPlan { parent: String, reason: String },
}

/// Diffing errors
#[derive(Debug, Error)]
pub enum DiffError {
    /// Algorithm selection or recursive comparison failed
    #[error("Tree diffing failed ({algorithm}): {source}")]
    Failed {
        algorithm: &'static str,
        #[source]
        source: ReconcileError,
    },
}

/// Result type for diffing operations
pub type Result<T> = std::result::Result<T, DiffError>;
