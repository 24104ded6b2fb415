//! Treelearn Core Components
//!
//! This crate drives a learning session: it owns the topic tree, calls the
//! text generator with ancestry context, and exposes a render-ready view.

mod config;
mod error;
mod generator;
mod metrics;
mod session;
mod view;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use generator::{GenerationError, Generator, OfflineGenerator};
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use session::{LearningSession, Slot, SlotState};
pub use view::{Intent, IntentOutcome, TreeView, ViewNode};

pub use treelearn_context::{ContextBuilder, KeywordSuggester, TopicSuggester};
pub use treelearn_tree::{Message, NodeId, Role, Tree};
