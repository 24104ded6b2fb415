//! Treelearn Context
//!
//! Turns a node's ancestry into a prompt context string and suggests
//! follow-up topics for expanding a node.

mod builder;
mod error;
mod suggest;

pub use builder::ContextBuilder;
pub use error::{ContextError, Result};
pub use suggest::{KeywordSuggester, SubjectCategory, TopicSuggester};
