//! Treelearn Tree
//!
//! In-memory topic tree with per-node conversations, plus the layout
//! engine that places the tree on a 2-D canvas.

mod error;
pub mod ids;
pub mod layout;
pub mod tree;

pub use error::{Result, TreeError};
pub use ids::{MessageId, NodeId};
pub use layout::{compute_layout, Bounds, Edge, Layout, LayoutConfig, Padding, Point};
pub use tree::{Message, MessageDraft, Node, Role, Tree, TreeLimits};
