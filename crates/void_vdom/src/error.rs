//! Error types for tree mutation

use thiserror::Error;

/// Errors raised by [`Tree`](crate::tree::Tree) mutations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VdomError {
    /// No node carries the given key
    #[error("Node not found for key '{0}'")]
    KeyNotFound(String),

    /// A key is already present in the tree
    #[error("Duplicate node key '{0}'")]
    DuplicateKey(String),

    /// Attaching a parentless node while a root exists
    #[error("Tree already has a root")]
    RootOccupied,

    /// Node id does not resolve (removed or from another tree)
    #[error("Stale node id {0}")]
    StaleNode(String),
}

/// Result type for tree operations
pub type Result<T> = std::result::Result<T, VdomError>;

/// Error returned by renderer-supplied host hooks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Host operation '{operation}' failed: {message}")]
pub struct HostError {
    /// Hook that failed
    pub operation: &'static str,
    /// Backend message
    pub message: String,
}

impl HostError {
    /// Create a new host error
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}
