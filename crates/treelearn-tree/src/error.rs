//! Tree error types.

use crate::ids::NodeId;
use thiserror::Error;

/// Errors that can occur during tree operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Node id does not resolve
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Root creation attempted on a tree that already has one
    #[error("Root already exists: {0}")]
    RootExists(NodeId),

    /// Structural invariant violated
    #[error("Tree invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, TreeError>;
