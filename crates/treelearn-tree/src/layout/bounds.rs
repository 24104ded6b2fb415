//! Canvas bounds derived from a computed layout.

use serde::{Deserialize, Serialize};

/// Extra room around the outermost node positions.
///
/// The right and bottom sides are larger because positions mark a node's
/// top-left anchor and its label extends right and down from there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    #[serde(default = "default_left")]
    pub left: f64,
    #[serde(default = "default_right")]
    pub right: f64,
    #[serde(default = "default_top")]
    pub top: f64,
    #[serde(default = "default_bottom")]
    pub bottom: f64,
}

fn default_left() -> f64 {
    200.0
}

fn default_right() -> f64 {
    400.0
}

fn default_top() -> f64 {
    100.0
}

fn default_bottom() -> f64 {
    200.0
}

impl Default for Padding {
    fn default() -> Self {
        Self {
            left: default_left(),
            right: default_right(),
            top: default_top(),
            bottom: default_bottom(),
        }
    }
}

/// Axis-aligned rectangle covering every node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow the rectangle by the given padding.
    pub fn padded(&self, padding: &Padding) -> Self {
        Self {
            min_x: self.min_x - padding.left,
            min_y: self.min_y - padding.top,
            max_x: self.max_x + padding.right,
            max_y: self.max_y + padding.bottom,
        }
    }
}
