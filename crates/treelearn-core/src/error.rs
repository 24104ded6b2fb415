//! Session error types.

use thiserror::Error;
use treelearn_context::ContextError;
use treelearn_tree::{NodeId, TreeError};

/// Errors surfaced by a learning session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// An id did not resolve to an existing entity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Root creation attempted when the tree already has one
    #[error("Root already exists: {0}")]
    AlreadyExists(NodeId),

    /// A generation call is already in flight
    #[error("Busy: a generation call is already in flight")]
    Busy,

    /// The generator failed or timed out
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// The tree is structurally broken
    #[error("Tree invariant violated: {0}")]
    Invariant(String),
}

impl SessionError {
    /// Whether the same call may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Busy)
    }
}

impl From<TreeError> for SessionError {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::NodeNotFound(id) => SessionError::NotFound(format!("node {}", id)),
            TreeError::RootExists(id) => SessionError::AlreadyExists(id),
            TreeError::Invariant(msg) => SessionError::Invariant(msg),
        }
    }
}

impl From<ContextError> for SessionError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::NodeNotFound(id) => SessionError::NotFound(format!("node {}", id)),
            ContextError::Tree(inner) => inner.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
