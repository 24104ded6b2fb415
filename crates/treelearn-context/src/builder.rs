//! Ancestry context rendering.
//!
//! Serializes the conversations along a node's root-to-node path into a
//! single string that conditions the next generated answer.

use crate::error::Result;
use std::collections::VecDeque;
use tracing::debug;
use treelearn_tree::{Message, NodeId, Tree};

/// Builder for prompt context strings.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    /// Optional size budget in bytes; oldest messages are dropped first
    max_chars: Option<usize>,
}

/// One node's share of the context.
struct Block<'a> {
    title: &'a str,
    lines: VecDeque<String>,
}

impl ContextBuilder {
    /// Create a builder without a size budget.
    pub fn new() -> Self {
        Self { max_chars: None }
    }

    /// Create a builder that keeps the context under `max_chars` bytes by
    /// dropping the oldest messages. Node titles are always kept.
    pub fn with_max_chars(max_chars: usize) -> Self {
        Self {
            max_chars: Some(max_chars),
        }
    }

    /// Root-first ids from the tree root down to `node_id`, inclusive.
    pub fn ancestry_ids(&self, tree: &Tree, node_id: &NodeId) -> Result<Vec<NodeId>> {
        Ok(tree.ancestry(node_id)?)
    }

    /// Render the ancestry of `node_id` as prompt context.
    ///
    /// Each node on the path contributes a `Node: {title}` line followed by
    /// its messages as `{role}: {content}`; blocks are separated by a blank
    /// line. Returns an empty string when nothing on the path has messages.
    pub fn build_ancestry_context(&self, tree: &Tree, node_id: &NodeId) -> Result<String> {
        let chain = self.ancestry_ids(tree, node_id)?;

        let mut blocks = Vec::with_capacity(chain.len());
        for id in &chain {
            let node = tree.node(id)?;
            blocks.push(Block {
                title: &node.title,
                lines: node.messages.iter().map(message_line).collect(),
            });
        }

        if blocks.iter().all(|b| b.lines.is_empty()) {
            return Ok(String::new());
        }

        let mut omitted = 0;
        if let Some(max) = self.max_chars {
            let mut body = rendered_len(&blocks);
            let mut cursor = 0;
            while body + notice_len(omitted) > max {
                while blocks.get(cursor).is_some_and(|b| b.lines.is_empty()) {
                    cursor += 1;
                }
                let Some(line) = blocks.get_mut(cursor).and_then(|b| b.lines.pop_front()) else {
                    break;
                };
                body -= line.len() + 1;
                omitted += 1;
            }
        }

        let context = render(&blocks, omitted);
        debug!(
            node = %node_id.short(),
            ancestors = chain.len(),
            omitted,
            bytes = context.len(),
            "Ancestry context built"
        );
        Ok(context)
    }

    /// Render the flat transcript, one `{role}: {content}` line per message.
    pub fn build_transcript_context(&self, tree: &Tree) -> String {
        tree.transcript()
            .iter()
            .map(message_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn message_line(message: &Message) -> String {
    format!("{}: {}", message.role, message.content)
}

fn omission_notice(omitted: usize) -> String {
    format!("({} earlier messages omitted)", omitted)
}

/// Bytes the notice adds to a rendering, separator included.
fn notice_len(omitted: usize) -> usize {
    if omitted == 0 {
        0
    } else {
        omission_notice(omitted).len() + 2
    }
}

/// Byte length of `render(blocks, 0)`.
fn rendered_len(blocks: &[Block<'_>]) -> usize {
    let sections: usize = blocks
        .iter()
        .map(|b| {
            let lines: usize = b.lines.iter().map(|l| l.len() + 1).sum();
            "Node: ".len() + b.title.len() + lines
        })
        .sum();
    sections + 2 * blocks.len().saturating_sub(1)
}

fn render(blocks: &[Block<'_>], omitted: usize) -> String {
    let mut sections = Vec::with_capacity(blocks.len() + 1);
    if omitted > 0 {
        sections.push(omission_notice(omitted));
    }
    for block in blocks {
        let mut section = format!("Node: {}", block.title);
        for line in &block.lines {
            section.push('\n');
            section.push_str(line);
        }
        sections.push(section);
    }
    sections.join("\n\n")
}
