//! Conversation messages attached to the tree.

use crate::ids::{MessageId, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,

    /// Who wrote it
    pub role: Role,

    /// Text body
    pub content: String,

    /// Creation time, non-decreasing along the transcript
    pub timestamp: DateTime<Utc>,

    /// Node whose conversation this belongs to (None for top-level chat)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,

    /// Ancestry chain (root first) captured when the message was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_node_ids: Option<Vec<NodeId>>,
}

/// A message that has not been stamped with an id and timestamp yet.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub role: Role,
    pub content: String,
    pub node_id: Option<NodeId>,
    pub context_node_ids: Option<Vec<NodeId>>,
}

impl MessageDraft {
    /// Create a draft with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            node_id: None,
            context_node_ids: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attach the draft to a node.
    pub fn with_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Record the ancestry chain used to produce this message.
    pub fn with_context(mut self, context_node_ids: Vec<NodeId>) -> Self {
        self.context_node_ids = Some(context_node_ids);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_draft_builder() {
        let node = NodeId::new();
        let draft = MessageDraft::user("hi")
            .with_node(node)
            .with_context(vec![node]);

        assert_eq!(draft.role, Role::User);
        assert_eq!(draft.content, "hi");
        assert_eq!(draft.node_id, Some(node));
        assert_eq!(draft.context_node_ids, Some(vec![node]));
    }
}
