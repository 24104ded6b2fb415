//! Render-ready projection of the tree and the intents a UI sends back.

use serde::{Deserialize, Serialize};
use treelearn_tree::{compute_layout, Bounds, Edge, LayoutConfig, Message, NodeId, Point, Tree};

/// A positioned node as a renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewNode {
    pub id: NodeId,
    pub title: String,
    pub depth: usize,
    pub position: Point,
    pub has_children: bool,
}

/// Everything needed to draw the tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeView {
    /// Nodes in breadth-first order
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<Edge>,
    pub selected_id: Option<NodeId>,
    /// Padded extent of all positions; absent for an empty tree
    pub bounds: Option<Bounds>,
}

impl TreeView {
    /// Lay out `tree` and project it.
    pub fn build(tree: &Tree, config: &LayoutConfig, selected: Option<NodeId>) -> Self {
        let layout = compute_layout(tree, config);

        let nodes = layout
            .iter()
            .filter_map(|(id, position)| {
                tree.get(&id).map(|node| ViewNode {
                    id,
                    title: node.title.clone(),
                    depth: node.depth,
                    position,
                    has_children: node.has_children(),
                })
            })
            .collect();

        Self {
            nodes,
            edges: layout.edges().to_vec(),
            selected_id: selected.filter(|id| tree.contains(id)),
            bounds: layout.bounds(&config.padding),
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<&ViewNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A user action coming from a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Change or clear the selection
    SelectNode {
        #[serde(default)]
        id: Option<NodeId>,
    },
    /// Add children; suggested topics are used when `titles` is absent
    ExpandNode {
        id: NodeId,
        #[serde(default)]
        titles: Option<Vec<String>>,
    },
    /// Send text to a node, or to the top level when no target is given
    Submit {
        text: String,
        #[serde(default, rename = "targetId")]
        target_id: Option<NodeId>,
    },
}

/// Result of a dispatched [`Intent`].
#[derive(Debug, Clone, PartialEq)]
pub enum IntentOutcome {
    Selected(Option<NodeId>),
    Expanded(Vec<NodeId>),
    RootCreated(NodeId),
    Replied(Message),
}
