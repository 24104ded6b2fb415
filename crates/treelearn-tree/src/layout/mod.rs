//! Layout engine for the topic tree.
//!
//! Places every node on a 2-D canvas, level by level:
//! - depth `d` sits on the horizontal band `origin_y + d * level_height`;
//! - a lone child sits straight below its parent;
//! - a sibling group is spread evenly and centered under its parent, with
//!   spacing `min(max_spacing, total_spread / (k - 1))`, widened when the
//!   siblings' own subtrees would otherwise collide.
//!
//! Subtree extents are measured bottom-up first, so any two nodes on the
//! same band end up at least `node_width` apart. The result depends only on
//! the tree topology and the config.

mod bounds;

pub use bounds::{Bounds, Padding};

use crate::ids::NodeId;
use crate::tree::Tree;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Layout constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Root anchor, horizontal
    #[serde(default = "default_origin_x")]
    pub origin_x: f64,

    /// Root anchor, vertical
    #[serde(default = "default_origin_y")]
    pub origin_y: f64,

    /// Vertical distance between depth levels
    #[serde(default = "default_level_height")]
    pub level_height: f64,

    /// Upper bound on the preferred sibling spacing
    #[serde(default = "default_max_spacing")]
    pub max_spacing: f64,

    /// Preferred total width of a sibling group
    #[serde(default = "default_total_spread")]
    pub total_spread: f64,

    /// Horizontal footprint reserved for each node
    #[serde(default = "default_node_width")]
    pub node_width: f64,

    /// Padding used for canvas bounds
    #[serde(default)]
    pub padding: Padding,

    /// Smallest canvas handed to renderers
    #[serde(default = "default_min_canvas_width")]
    pub min_canvas_width: f64,

    #[serde(default = "default_min_canvas_height")]
    pub min_canvas_height: f64,
}

fn default_origin_x() -> f64 {
    600.0
}

fn default_origin_y() -> f64 {
    100.0
}

fn default_level_height() -> f64 {
    200.0
}

fn default_max_spacing() -> f64 {
    200.0
}

fn default_total_spread() -> f64 {
    400.0
}

fn default_node_width() -> f64 {
    180.0
}

fn default_min_canvas_width() -> f64 {
    1400.0
}

fn default_min_canvas_height() -> f64 {
    1000.0
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin_x: default_origin_x(),
            origin_y: default_origin_y(),
            level_height: default_level_height(),
            max_spacing: default_max_spacing(),
            total_spread: default_total_spread(),
            node_width: default_node_width(),
            padding: Padding::default(),
            min_canvas_width: default_min_canvas_width(),
            min_canvas_height: default_min_canvas_height(),
        }
    }
}

/// A canvas coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A parent-to-child connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub from_id: NodeId,
    pub to_id: NodeId,
}

/// Computed positions for a whole tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    positions: HashMap<NodeId, Point>,
    /// Breadth-first placement order
    order: Vec<NodeId>,
    edges: Vec<Edge>,
}

impl Layout {
    /// Position of a node.
    pub fn position(&self, id: &NodeId) -> Option<Point> {
        self.positions.get(id).copied()
    }

    /// Nodes with their positions, breadth-first.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Point)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.positions.get(id).map(|p| (*id, *p)))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Min/max over all positions, grown by `padding`.
    pub fn bounds(&self, padding: &Padding) -> Option<Bounds> {
        let mut points = self.positions.values();
        let first = points.next()?;
        let raw = points.fold(
            Bounds {
                min_x: first.x,
                min_y: first.y,
                max_x: first.x,
                max_y: first.y,
            },
            |b, p| Bounds {
                min_x: b.min_x.min(p.x),
                min_y: b.min_y.min(p.y),
                max_x: b.max_x.max(p.x),
                max_y: b.max_y.max(p.y),
            },
        );
        Some(raw.padded(padding))
    }

    /// Canvas width and height, never smaller than the configured minimum.
    pub fn canvas_size(&self, config: &LayoutConfig) -> (f64, f64) {
        match self.bounds(&config.padding) {
            Some(b) => (
                b.width().max(config.min_canvas_width),
                b.height().max(config.min_canvas_height),
            ),
            None => (config.min_canvas_width, config.min_canvas_height),
        }
    }
}

/// Horizontal room a subtree needs on each side of its root's x.
#[derive(Debug, Clone, Copy)]
struct Extent {
    left: f64,
    right: f64,
}

/// Compute positions for every node reachable from the root.
pub fn compute_layout(tree: &Tree, config: &LayoutConfig) -> Layout {
    let Some(root_id) = tree.root_id() else {
        return Layout::default();
    };

    let order = breadth_first(tree, root_id);
    let spacing = measure(tree, &order, config);

    let mut layout = Layout::default();
    layout.positions.insert(
        root_id,
        Point {
            x: config.origin_x,
            y: config.origin_y,
        },
    );

    for id in &order {
        let Some(node) = tree.get(id) else {
            continue;
        };
        let Some(parent_pos) = layout.positions.get(id).copied() else {
            continue;
        };
        let gap = spacing.get(id).copied().unwrap_or(0.0);
        let count = node.children.len();

        for (i, child_id) in node.children.iter().enumerate() {
            let Some(child) = tree.get(child_id) else {
                continue;
            };
            let pos = Point {
                x: parent_pos.x + sibling_offset(i, count, gap),
                y: config.origin_y + child.depth as f64 * config.level_height,
            };
            layout.positions.insert(*child_id, pos);
            layout.edges.push(Edge {
                from_id: *id,
                to_id: *child_id,
            });
        }
    }
    layout.order = order;

    debug!(nodes = layout.len(), edges = layout.edges.len(), "Layout computed");
    layout
}

/// Ids reachable from `root_id`, parents before children.
fn breadth_first(tree: &Tree, root_id: NodeId) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(tree.len());
    let mut queue = VecDeque::from([root_id]);
    while let Some(id) = queue.pop_front() {
        let Some(node) = tree.get(&id) else {
            continue;
        };
        order.push(id);
        queue.extend(node.children.iter().copied());
    }
    order
}

/// Measure every subtree bottom-up over a breadth-first `order`, returning
/// the sibling spacing chosen for each node's children.
fn measure(tree: &Tree, order: &[NodeId], config: &LayoutConfig) -> HashMap<NodeId, f64> {
    let half = config.node_width / 2.0;
    let leaf = Extent {
        left: half,
        right: half,
    };

    let mut extents: HashMap<NodeId, Extent> = HashMap::with_capacity(order.len());
    let mut spacing = HashMap::with_capacity(order.len());

    for id in order.iter().rev() {
        let Some(node) = tree.get(id) else {
            continue;
        };

        let children: Vec<Extent> = node
            .children
            .iter()
            .map(|child| extents.get(child).copied().unwrap_or(leaf))
            .collect();
        let gap = sibling_spacing(&children, config);

        let mut extent = leaf;
        for (i, child) in children.iter().enumerate() {
            let offset = sibling_offset(i, children.len(), gap);
            extent.left = extent.left.max(child.left - offset);
            extent.right = extent.right.max(offset + child.right);
        }

        extents.insert(*id, extent);
        spacing.insert(*id, gap);
    }

    spacing
}

/// Spacing between adjacent siblings: the preferred spread, widened so
/// neighbouring subtrees never overlap.
fn sibling_spacing(children: &[Extent], config: &LayoutConfig) -> f64 {
    if children.len() < 2 {
        return 0.0;
    }
    let preferred = config
        .max_spacing
        .min(config.total_spread / (children.len() - 1) as f64);
    let required = children
        .windows(2)
        .map(|pair| pair[0].right + pair[1].left)
        .fold(0.0, f64::max);
    preferred.max(required)
}

/// Offset of sibling `i` of `count` from the parent's x, centered.
fn sibling_offset(i: usize, count: usize, spacing: f64) -> f64 {
    if count < 2 {
        return 0.0;
    }
    (i as f64 - (count - 1) as f64 / 2.0) * spacing
}
