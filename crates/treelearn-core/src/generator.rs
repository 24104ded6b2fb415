//! Text generation backend contract.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a generator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The backend rejected or failed the request
    #[error("Backend error: {0}")]
    Backend(String),

    /// No answer within the allowed time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Asynchronous text generator.
///
/// `context` is the rendered ancestry of the node being discussed, or an
/// empty string for top-level questions.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, context: &str) -> Result<String, GenerationError>;
}

const OPENERS: [&str; 4] = [
    "That's a great question! Let me explain this concept in more detail...",
    "I understand what you're asking about. Here's how this works...",
    "This is an important topic. Let me break it down for you...",
    "Excellent point! This connects to several key concepts...",
];

/// Canned-response generator for demos and offline use.
///
/// Answers are picked deterministically from the prompt text.
#[derive(Debug, Clone, Default)]
pub struct OfflineGenerator {
    latency: Duration,
}

impl OfflineGenerator {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
        }
    }

    /// Simulate backend latency on every call.
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    fn respond(prompt: &str, context: &str) -> String {
        if context.is_empty() {
            return format!(
                "Great question about \"{}\"! Let me provide you with a comprehensive overview. \
                 This topic involves several key areas that we can explore together: fundamental \
                 concepts, practical applications, and advanced techniques.",
                prompt
            );
        }

        let pick = prompt.bytes().map(usize::from).sum::<usize>() % OPENERS.len();
        let topic = context
            .lines()
            .find_map(|line| line.strip_prefix("Node: "))
            .unwrap_or("this topic");

        format!(
            "{} Based on our discussion about \"{}\", here's what you should know...",
            OPENERS[pick], topic
        )
    }
}

#[async_trait]
impl Generator for OfflineGenerator {
    async fn generate(&self, prompt: &str, context: &str) -> Result<String, GenerationError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(Self::respond(prompt, context))
    }
}
