//! Error types for context building.

use thiserror::Error;
use treelearn_tree::{NodeId, TreeError};

/// Errors that can occur while building context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// Node not found in tree
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Tree is structurally broken
    #[error("Tree error: {0}")]
    Tree(TreeError),
}

impl From<TreeError> for ContextError {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::NodeNotFound(id) => ContextError::NodeNotFound(id),
            other => ContextError::Tree(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContextError>;
