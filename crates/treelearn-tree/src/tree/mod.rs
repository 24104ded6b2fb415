//! Tree structure for the topic hierarchy.
//!
//! Nodes live in an arena keyed by [`NodeId`]; parent and child links are
//! ids, never references. History is append-only: nodes and messages are
//! never removed or edited once created.

mod message;

pub use message::{Message, MessageDraft, Role};

use crate::error::{Result, TreeError};
use crate::ids::{MessageId, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Truncation limits applied to derived node labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeLimits {
    /// Maximum characters kept from the root question for its title
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    /// Maximum characters kept from the root answer for its summary
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
}

fn default_title_max_chars() -> usize {
    50
}

fn default_summary_max_chars() -> usize {
    100
}

impl Default for TreeLimits {
    fn default() -> Self {
        Self {
            title_max_chars: default_title_max_chars(),
            summary_max_chars: default_summary_max_chars(),
        }
    }
}

/// The topic tree plus the flat top-level transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    /// All nodes, keyed by ID
    nodes: HashMap<NodeId, Node>,

    /// Node IDs in creation order
    order: Vec<NodeId>,

    /// Root node ID, set once
    root_id: Option<NodeId>,

    /// Every message ever appended, node-bound or not
    transcript: Vec<Message>,

    /// Label truncation limits
    limits: TreeLimits,

    /// When this tree was created
    created_at: DateTime<Utc>,

    /// Last modification time
    updated_at: DateTime<Utc>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self::with_limits(TreeLimits::default())
    }

    /// Create an empty tree with custom label limits.
    pub fn with_limits(limits: TreeLimits) -> Self {
        let now = Utc::now();
        Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            root_id: None,
            transcript: Vec::new(),
            limits,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create the root node together with its first exchange.
    ///
    /// Both messages are tagged with the new node and also land in the
    /// flat transcript.
    pub fn create_root(&mut self, question: &str, answer: &str) -> Result<NodeId> {
        if let Some(existing) = self.root_id {
            return Err(TreeError::RootExists(existing));
        }

        let id = NodeId::new();
        self.insert_node(Node {
            id,
            title: truncate(question, self.limits.title_max_chars),
            summary: truncate(answer, self.limits.summary_max_chars),
            depth: 0,
            parent: None,
            children: Vec::new(),
            messages: Vec::new(),
            created_at: Utc::now(),
        });
        self.root_id = Some(id);

        self.append(MessageDraft::user(question).with_node(id).with_context(vec![id]));
        self.append(MessageDraft::assistant(answer).with_node(id).with_context(vec![id]));

        debug!(node = %id.short(), "Root created");
        Ok(id)
    }

    /// Create one child per title under `parent_id`, in order.
    ///
    /// An empty title list leaves the tree untouched.
    pub fn expand<S: AsRef<str>>(&mut self, parent_id: &NodeId, titles: &[S]) -> Result<Vec<NodeId>> {
        let parent = self
            .nodes
            .get(parent_id)
            .ok_or(TreeError::NodeNotFound(*parent_id))?;

        if titles.is_empty() {
            return Ok(Vec::new());
        }

        let depth = parent.depth + 1;
        let parent_title = parent.title.clone();
        let now = Utc::now();

        let mut child_ids = Vec::with_capacity(titles.len());
        for title in titles {
            let title = title.as_ref();
            let id = NodeId::new();
            self.insert_node(Node {
                id,
                title: title.to_string(),
                summary: format!("Learn more about {} in the context of {}", title, parent_title),
                depth,
                parent: Some(*parent_id),
                children: Vec::new(),
                messages: Vec::new(),
                created_at: now,
            });
            child_ids.push(id);
        }

        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.children.extend(child_ids.iter().copied());
        }
        self.touch();

        debug!(
            parent = %parent_id.short(),
            children = child_ids.len(),
            depth,
            "Node expanded"
        );
        Ok(child_ids)
    }

    /// Append a message to the transcript and, when `node_id` resolves, to
    /// that node's conversation.
    pub fn append_message(
        &mut self,
        role: Role,
        content: impl Into<String>,
        node_id: Option<&NodeId>,
    ) -> Message {
        let mut draft = MessageDraft::new(role, content);
        draft.node_id = node_id.copied();
        self.append(draft)
    }

    /// Stamp a draft and append it.
    ///
    /// An unknown node is tolerated: the message stays in the flat
    /// transcript only.
    pub fn append(&mut self, draft: MessageDraft) -> Message {
        let message = Message {
            id: MessageId::new(),
            role: draft.role,
            content: draft.content,
            timestamp: self.next_timestamp(),
            node_id: draft.node_id,
            context_node_ids: draft.context_node_ids,
        };

        self.transcript.push(message.clone());

        if let Some(node_id) = message.node_id {
            match self.nodes.get_mut(&node_id) {
                Some(node) => node.messages.push(message.clone()),
                None => warn!(
                    node = %node_id.short(),
                    "Message target node not found, kept in transcript only"
                ),
            }
        }

        self.touch();
        message
    }

    /// Get a node by ID.
    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get a node by ID, failing with `NodeNotFound`.
    pub fn node(&self, id: &NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or(TreeError::NodeNotFound(*id))
    }

    /// Check whether a node exists.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Root node ID, if the tree has been started.
    pub fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    /// Get the root node.
    pub fn root(&self) -> Option<&Node> {
        self.root_id.and_then(|id| self.nodes.get(&id))
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Get children of a node, in creation order.
    pub fn children(&self, id: &NodeId) -> Vec<&Node> {
        self.get(id)
            .map(|n| {
                n.children
                    .iter()
                    .filter_map(|child_id| self.get(child_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The flat transcript, in append order.
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn limits(&self) -> TreeLimits {
        self.limits
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Path from the root down to `id`, both ends included.
    pub fn ancestry(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        let mut current = self.node(id)?;
        let mut chain = vec![current.id];

        while let Some(parent_id) = current.parent {
            if chain.len() > self.nodes.len() {
                return Err(TreeError::Invariant(format!(
                    "parent chain of {} does not terminate",
                    id
                )));
            }
            current = self.nodes.get(&parent_id).ok_or_else(|| {
                TreeError::Invariant(format!(
                    "node {} has dangling parent {}",
                    current.id, parent_id
                ))
            })?;
            chain.push(current.id);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Check every structural invariant of the tree.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(TreeError::Invariant(msg));

        if self.order.len() != self.nodes.len() {
            return fail(format!(
                "creation order has {} ids for {} nodes",
                self.order.len(),
                self.nodes.len()
            ));
        }

        let roots: Vec<&Node> = self.nodes.values().filter(|n| n.parent.is_none()).collect();
        match (self.root_id, roots.as_slice()) {
            (None, []) => {}
            (Some(root_id), [root]) if root.id == root_id => {}
            _ => {
                return fail(format!(
                    "expected a single root matching {:?}, found {}",
                    self.root_id,
                    roots.len()
                ))
            }
        }

        let mut claimed = HashSet::new();
        for id in &self.order {
            let Some(node) = self.nodes.get(id) else {
                return fail(format!("creation order references missing node {}", id));
            };

            match node.parent {
                None if node.depth != 0 => {
                    return fail(format!("root {} has depth {}", node.id, node.depth));
                }
                None => {}
                Some(parent_id) => {
                    let Some(parent) = self.nodes.get(&parent_id) else {
                        return fail(format!("node {} has dangling parent {}", node.id, parent_id));
                    };
                    if node.depth != parent.depth + 1 {
                        return fail(format!(
                            "node {} at depth {} under parent at depth {}",
                            node.id, node.depth, parent.depth
                        ));
                    }
                    if !parent.children.contains(&node.id) {
                        return fail(format!(
                            "node {} missing from children of {}",
                            node.id, parent_id
                        ));
                    }
                }
            }

            for child_id in &node.children {
                if !claimed.insert(*child_id) {
                    return fail(format!("node {} listed as a child twice", child_id));
                }
                match self.nodes.get(child_id) {
                    Some(child) if child.parent == Some(node.id) => {}
                    Some(_) => {
                        return fail(format!("child {} does not point back to {}", child_id, node.id));
                    }
                    None => return fail(format!("node {} lists missing child {}", node.id, child_id)),
                }
            }

            if let Some(stray) = node.messages.iter().find(|m| m.node_id != Some(node.id)) {
                return fail(format!("message {} stored under foreign node {}", stray.id, node.id));
            }
        }

        Ok(())
    }

    /// Render an ASCII outline of the tree, marking the selected node.
    pub fn outline(&self, selected: Option<&NodeId>) -> String {
        let mut output = String::new();
        let Some(root_id) = self.root_id else {
            return output;
        };

        // (node, line prefix, last among its siblings)
        let mut stack = vec![(root_id, String::new(), true)];
        while let Some((node_id, prefix, is_last)) = stack.pop() {
            let Some(node) = self.get(&node_id) else {
                continue;
            };

            let marker = if selected == Some(&node_id) {
                " ← (selected)"
            } else {
                ""
            };

            let child_prefix = if node.parent.is_some() {
                let connector = if is_last { "└── " } else { "├── " };
                output.push_str(&format!("{}{}{}{}\n", prefix, connector, node.title, marker));
                format!("{}{}   ", prefix, if is_last { " " } else { "│" })
            } else {
                output.push_str(&format!("{}{}\n", node.title, marker));
                String::new()
            };

            let child_count = node.children.len();
            for (i, child_id) in node.children.iter().enumerate().rev() {
                stack.push((*child_id, child_prefix.clone(), i + 1 == child_count));
            }
        }
        output
    }

    fn insert_node(&mut self, node: Node) {
        self.order.push(node.id);
        self.nodes.insert(node.id, node);
    }

    /// Current time, clamped so the transcript never goes backwards.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.transcript.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A topic in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node ID
    pub id: NodeId,

    /// Short display label
    pub title: String,

    /// Short description
    pub summary: String,

    /// Distance from the root (root = 0)
    pub depth: usize,

    /// Parent node ID (None for root)
    pub parent: Option<NodeId>,

    /// Child node IDs, in creation order
    pub children: Vec<NodeId>,

    /// This node's conversation
    pub messages: Vec<Message>,

    /// When the node was created
    pub created_at: DateTime<Utc>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Keep at most `max` characters, marking the cut with `...`.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let root = tree
            .create_root("What is recursion?", "Recursion is a function calling itself.")
            .unwrap();
        (tree, root)
    }

    #[test]
    fn test_tree_new() {
        let tree = Tree::new();
        assert!(tree.is_empty());
        assert!(tree.root().is_none());
        assert!(tree.transcript().is_empty());
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_create_root() {
        let (tree, root_id) = sample_tree();
        let root = tree.root().unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(root.id, root_id);
        assert_eq!(root.depth, 0);
        assert_eq!(root.title, "What is recursion?");
        assert_eq!(root.messages.len(), 2);
        assert_eq!(root.messages[0].role, Role::User);
        assert_eq!(root.messages[1].role, Role::Assistant);
        assert!(root.messages.iter().all(|m| m.node_id == Some(root_id)));
        assert_eq!(tree.transcript().len(), 2);
    }

    #[test]
    fn test_create_root_twice_fails() {
        let (mut tree, root_id) = sample_tree();
        let err = tree.create_root("again", "no").unwrap_err();
        assert_eq!(err, TreeError::RootExists(root_id));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.transcript().len(), 2);
    }

    #[test]
    fn test_root_labels_truncated() {
        let mut tree = Tree::new();
        let question = "q".repeat(60);
        let answer = "a".repeat(150);
        tree.create_root(&question, &answer).unwrap();

        let root = tree.root().unwrap();
        assert_eq!(root.title, format!("{}...", "q".repeat(50)));
        assert_eq!(root.summary, format!("{}...", "a".repeat(100)));
        // Messages keep the full text
        assert_eq!(root.messages[0].content, question);
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("héllo wörld", 4), "héll...");
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exact", 5), "exact");
    }

    #[test]
    fn test_expand() {
        let (mut tree, root_id) = sample_tree();
        let before = tree.root().unwrap().clone();

        let ids = tree.expand(&root_id, &["Base Case", "Recursive Case"]).unwrap();

        assert_eq!(ids.len(), 2);
        let root = tree.root().unwrap();
        assert_eq!(root.children, ids);
        assert_eq!(root.messages, before.messages);
        assert_eq!(root.title, before.title);

        for (id, title) in ids.iter().zip(["Base Case", "Recursive Case"]) {
            let child = tree.get(id).unwrap();
            assert_eq!(child.depth, 1);
            assert_eq!(child.parent, Some(root_id));
            assert!(child.messages.is_empty());
            assert_eq!(child.title, title);
            assert_eq!(
                child.summary,
                format!("Learn more about {} in the context of What is recursion?", title)
            );
        }
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_expand_appends_to_existing_children() {
        let (mut tree, root_id) = sample_tree();
        let first = tree.expand(&root_id, &["A"]).unwrap();
        let second = tree.expand(&root_id, &["B", "C"]).unwrap();

        let mut expected = first.clone();
        expected.extend(second);
        assert_eq!(tree.root().unwrap().children, expected);
    }

    #[test]
    fn test_expand_empty_is_noop() {
        let (mut tree, root_id) = sample_tree();
        let updated = tree.updated_at();
        let empty: [&str; 0] = [];

        let ids = tree.expand(&root_id, &empty).unwrap();

        assert!(ids.is_empty());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.updated_at(), updated);
    }

    #[test]
    fn test_expand_missing_parent() {
        let (mut tree, _) = sample_tree();
        let missing = NodeId::new();
        let err = tree.expand(&missing, &["A"]).unwrap_err();
        assert_eq!(err, TreeError::NodeNotFound(missing));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_append_message_to_node() {
        let (mut tree, root_id) = sample_tree();
        let ids = tree.expand(&root_id, &["Base Case"]).unwrap();

        let msg = tree.append_message(Role::User, "why?", Some(&ids[0]));

        assert_eq!(msg.node_id, Some(ids[0]));
        assert_eq!(tree.get(&ids[0]).unwrap().messages, vec![msg.clone()]);
        assert_eq!(tree.transcript().last(), Some(&msg));
    }

    #[test]
    fn test_append_message_unknown_node_is_tolerated() {
        let (mut tree, root_id) = sample_tree();
        let missing = NodeId::new();

        let msg = tree.append_message(Role::User, "hi", Some(&missing));

        assert_eq!(tree.transcript().len(), 3);
        assert_eq!(tree.transcript().last(), Some(&msg));
        assert_eq!(tree.get(&root_id).unwrap().messages.len(), 2);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_append_message_without_node() {
        let mut tree = Tree::new();
        let msg = tree.append_message(Role::User, "hello", None);
        assert!(msg.node_id.is_none());
        assert_eq!(tree.transcript().len(), 1);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let (mut tree, root_id) = sample_tree();
        for i in 0..20 {
            tree.append_message(Role::User, format!("m{}", i), Some(&root_id));
        }
        let transcript = tree.transcript();
        assert!(transcript.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_ancestry() {
        let (mut tree, root_id) = sample_tree();
        let level1 = tree.expand(&root_id, &["A", "B"]).unwrap();
        let level2 = tree.expand(&level1[1], &["B1"]).unwrap();
        let level3 = tree.expand(&level2[0], &["B1a"]).unwrap();

        let chain = tree.ancestry(&level3[0]).unwrap();
        assert_eq!(chain, vec![root_id, level1[1], level2[0], level3[0]]);
        assert_eq!(chain.len(), tree.get(&level3[0]).unwrap().depth + 1);
        assert_eq!(tree.ancestry(&root_id).unwrap(), vec![root_id]);
    }

    #[test]
    fn test_ancestry_missing() {
        let tree = Tree::new();
        let missing = NodeId::new();
        assert_eq!(tree.ancestry(&missing), Err(TreeError::NodeNotFound(missing)));
    }

    #[test]
    fn test_nodes_in_creation_order() {
        let (mut tree, root_id) = sample_tree();
        let kids = tree.expand(&root_id, &["A", "B", "C"]).unwrap();
        let order: Vec<NodeId> = tree.nodes().map(|n| n.id).collect();
        assert_eq!(order[0], root_id);
        assert_eq!(&order[1..], kids.as_slice());
    }

    #[test]
    fn test_outline() {
        let (mut tree, root_id) = sample_tree();
        let kids = tree.expand(&root_id, &["Base Case", "Recursive Case"]).unwrap();
        tree.expand(&kids[0], &["Termination"]).unwrap();

        let outline = tree.outline(Some(&kids[1]));
        let expected = "What is recursion?\n\
                        ├── Base Case\n\
                        │   └── Termination\n\
                        └── Recursive Case ← (selected)\n";
        assert_eq!(outline, expected);
    }

    #[test]
    fn test_outline_deep_chain() {
        let (mut tree, root_id) = sample_tree();
        let mut tip = root_id;
        for _ in 0..3_000 {
            tip = tree.expand(&tip, &["Deeper"]).unwrap()[0];
        }

        let outline = tree.outline(Some(&tip));
        let lines: Vec<&str> = outline.lines().collect();
        assert_eq!(lines.len(), 3_001);
        assert_eq!(lines[0], "What is recursion?");
        assert_eq!(lines[1], "└── Deeper");
        let last = format!("{}└── Deeper ← (selected)", " ".repeat(4 * 2_999));
        assert_eq!(lines[3_000], last);
        assert_eq!(tree.ancestry(&tip).unwrap().len(), 3_001);
    }

    #[test]
    fn test_validate_detects_broken_depth() {
        let (mut tree, root_id) = sample_tree();
        let kids = tree.expand(&root_id, &["A"]).unwrap();
        tree.nodes.get_mut(&kids[0]).unwrap().depth = 5;
        assert!(matches!(tree.validate(), Err(TreeError::Invariant(_))));
    }

    #[test]
    fn test_validate_detects_shared_child() {
        let (mut tree, root_id) = sample_tree();
        let kids = tree.expand(&root_id, &["A", "B"]).unwrap();
        let shared = tree.expand(&kids[0], &["X"]).unwrap()[0];
        tree.nodes.get_mut(&kids[1]).unwrap().children.push(shared);
        assert!(matches!(tree.validate(), Err(TreeError::Invariant(_))));
    }

    #[test]
    fn test_tree_serialization() {
        let (mut tree, root_id) = sample_tree();
        tree.expand(&root_id, &["A", "B"]).unwrap();

        let json = serde_json::to_string(&tree).unwrap();
        let deserialized: Tree = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.len(), 3);
        assert_eq!(deserialized.root_id(), Some(root_id));
        assert!(deserialized.validate().is_ok());
    }
}
