//! Learning session orchestration.
//!
//! A [`LearningSession`] owns one topic tree and mediates every change to
//! it: root creation, expansion, and per-node conversations backed by a
//! [`Generator`]. At most one generation call is in flight at a time.

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::generator::{GenerationError, Generator};
use crate::metrics::{MetricsSnapshot, SessionMetrics};
use crate::view::{Intent, IntentOutcome, TreeView};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use treelearn_context::{ContextBuilder, KeywordSuggester, TopicSuggester};
use treelearn_tree::{compute_layout, Layout, Message, MessageDraft, NodeId, Tree};

/// Where a submission goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The flat top-level transcript (also used for root creation)
    Transcript,
    /// A node's own conversation
    Node(NodeId),
}

/// Submission status of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Sending,
}

/// Interactive exploration session over a single tree.
pub struct LearningSession {
    tree: RwLock<Tree>,
    generator: Arc<dyn Generator>,
    suggester: Box<dyn TopicSuggester>,
    context: ContextBuilder,
    config: SessionConfig,
    selected: RwLock<Option<NodeId>>,
    in_flight: AtomicBool,
    sending: RwLock<Option<Slot>>,
    errors: RwLock<HashMap<Slot, String>>,
    metrics: SessionMetrics,
}

/// Clears the in-flight flag when the submission settles or is dropped.
struct FlightGuard<'a> {
    session: &'a LearningSession,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        *self.session.sending.write() = None;
        self.session.in_flight.store(false, Ordering::Release);
    }
}

impl LearningSession {
    /// Create a session with default configuration
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self::with_config(generator, SessionConfig::default())
    }

    pub fn with_config(generator: Arc<dyn Generator>, config: SessionConfig) -> Self {
        let context = match config.context_max_chars {
            Some(max) => ContextBuilder::with_max_chars(max),
            None => ContextBuilder::new(),
        };
        let suggester = KeywordSuggester::new().with_max_topics(config.max_suggestions);

        Self {
            tree: RwLock::new(Tree::with_limits(config.limits)),
            generator,
            suggester: Box::new(suggester),
            context,
            config,
            selected: RwLock::new(None),
            in_flight: AtomicBool::new(false),
            sending: RwLock::new(None),
            errors: RwLock::new(HashMap::new()),
            metrics: SessionMetrics::new(),
        }
    }

    /// Replace the topic suggester used by [`expand_node`](Self::expand_node)
    pub fn with_suggester(mut self, suggester: Box<dyn TopicSuggester>) -> Self {
        self.suggester = suggester;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // --- submissions ---

    /// Ask the first question, creating the root node from the answer.
    pub async fn submit_root(&self, question: &str) -> Result<NodeId> {
        let existing = self.tree.read().root_id();
        if let Some(root) = existing {
            return Err(SessionError::AlreadyExists(root));
        }
        let _guard = self.begin(Slot::Transcript)?;

        debug!(chars = question.len(), "Submitting root question");
        let answer = self.generate(Slot::Transcript, question, "").await?;

        let root = self.tree.write().create_root(question, &answer)?;
        *self.selected.write() = Some(root);
        info!(node = %root.short(), "Root created");
        Ok(root)
    }

    /// Continue the conversation on a node with its ancestry as context.
    ///
    /// The user message is kept even if generation fails.
    pub async fn submit_to_node(&self, node_id: &NodeId, content: &str) -> Result<Message> {
        let slot = Slot::Node(*node_id);
        let _guard = self.begin(slot)?;

        let (context_ids, context) = {
            let mut tree = self.tree.write();
            let context_ids = self.context.ancestry_ids(&tree, node_id)?;
            tree.append(
                MessageDraft::user(content)
                    .with_node(*node_id)
                    .with_context(context_ids.clone()),
            );
            let context = self.context.build_ancestry_context(&tree, node_id)?;
            (context_ids, context)
        };

        debug!(
            node = %node_id.short(),
            depth = context_ids.len() - 1,
            context_chars = context.len(),
            "Submitting to node"
        );
        let reply = self.generate(slot, content, &context).await?;

        let message = self.tree.write().append(
            MessageDraft::assistant(reply)
                .with_node(*node_id)
                .with_context(context_ids),
        );
        Ok(message)
    }

    /// Classic chat: both messages go to the flat transcript only.
    pub async fn submit_to_transcript(&self, content: &str) -> Result<Message> {
        let _guard = self.begin(Slot::Transcript)?;

        self.tree.write().append(MessageDraft::user(content));
        debug!("Submitting to transcript");
        let reply = self.generate(Slot::Transcript, content, "").await?;

        Ok(self.tree.write().append(MessageDraft::assistant(reply)))
    }

    /// Route text to a node, the root question, or the transcript.
    pub async fn submit(&self, text: &str, target: Option<NodeId>) -> Result<IntentOutcome> {
        let has_root = self.tree.read().root_id().is_some();
        match target {
            Some(node_id) => self
                .submit_to_node(&node_id, text)
                .await
                .map(IntentOutcome::Replied),
            None if !has_root => {
                self.submit_root(text).await.map(IntentOutcome::RootCreated)
            }
            None => self
                .submit_to_transcript(text)
                .await
                .map(IntentOutcome::Replied),
        }
    }

    fn begin(&self, slot: Slot) -> Result<FlightGuard<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.metrics.record_busy();
            warn!(slot = ?slot, "Submission rejected: generation in flight");
            return Err(SessionError::Busy);
        }

        *self.sending.write() = Some(slot);
        self.errors.write().remove(&slot);
        Ok(FlightGuard { session: self })
    }

    async fn generate(&self, slot: Slot, prompt: &str, context: &str) -> Result<String> {
        self.metrics.record_start();
        let started = Instant::now();

        let call = self.generator.generate(prompt, context);
        let result = match self.config.generation_timeout() {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout(limit)),
            },
            None => call.await,
        };

        match result {
            Ok(text) => {
                self.metrics.record_success(started.elapsed());
                Ok(text)
            }
            Err(e) => {
                self.metrics.record_failure(started.elapsed());
                warn!(slot = ?slot, error = %e, "Generation failed");
                self.errors.write().insert(slot, e.to_string());
                Err(SessionError::GenerationFailed(e.to_string()))
            }
        }
    }

    // --- structure ---

    /// Add child topics under a node.
    ///
    /// Explicit titles are used as given. Without them, up to
    /// `max_suggestions` topics come from the suggester.
    pub fn expand_node(&self, node_id: &NodeId, titles: Option<Vec<String>>) -> Result<Vec<NodeId>> {
        let mut tree = self.tree.write();
        let titles = match titles {
            Some(titles) => titles,
            None => {
                let node = tree.node(node_id)?;
                let mut topics = self.suggester.suggest(&node.title, &node.summary);
                topics.truncate(self.config.max_suggestions);
                topics
            }
        };

        let children = tree.expand(node_id, &titles)?;
        if !children.is_empty() {
            info!(node = %node_id.short(), children = children.len(), "Node expanded");
        }
        Ok(children)
    }

    // --- selection & status ---

    /// Select a node, or clear the selection with `None`.
    pub fn select_node(&self, node_id: Option<NodeId>) -> Result<()> {
        if let Some(id) = node_id {
            if !self.tree.read().contains(&id) {
                return Err(SessionError::NotFound(format!("node {}", id)));
            }
        }
        *self.selected.write() = node_id;
        Ok(())
    }

    pub fn selected(&self) -> Option<NodeId> {
        *self.selected.read()
    }

    /// Whether a generation call is in flight
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn state(&self, slot: Slot) -> SlotState {
        if *self.sending.read() == Some(slot) {
            SlotState::Sending
        } else {
            SlotState::Idle
        }
    }

    /// Error from the most recent failed submission on a slot
    pub fn last_error(&self, slot: Slot) -> Option<String> {
        self.errors.read().get(&slot).cloned()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // --- reads ---

    pub fn view(&self) -> TreeView {
        let tree = self.tree.read();
        TreeView::build(&tree, &self.config.layout, self.selected())
    }

    pub fn layout(&self) -> Layout {
        compute_layout(&self.tree.read(), &self.config.layout)
    }

    /// Ancestry context exactly as a submission to `node_id` would see it.
    pub fn context_for(&self, node_id: &NodeId) -> Result<String> {
        Ok(self
            .context
            .build_ancestry_context(&self.tree.read(), node_id)?)
    }

    /// Render the flat transcript.
    pub fn transcript_text(&self) -> String {
        self.context.build_transcript_context(&self.tree.read())
    }

    /// Owned copy of the current tree
    pub fn snapshot(&self) -> Tree {
        self.tree.read().clone()
    }

    /// Run a read-only closure against the tree.
    pub fn with_tree<R>(&self, f: impl FnOnce(&Tree) -> R) -> R {
        let tree = self.tree.read();
        f(&tree)
    }

    /// Apply a renderer intent.
    pub async fn dispatch(&self, intent: Intent) -> Result<IntentOutcome> {
        match intent {
            Intent::SelectNode { id } => {
                self.select_node(id)?;
                Ok(IntentOutcome::Selected(id))
            }
            Intent::ExpandNode { id, titles } => {
                self.expand_node(&id, titles).map(IntentOutcome::Expanded)
            }
            Intent::Submit { text, target_id } => self.submit(&text, target_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::OfflineGenerator;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;
    use treelearn_tree::Role;

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _prompt: &str, _context: &str) -> std::result::Result<String, GenerationError> {
            Err(GenerationError::Backend("backend down".into()))
        }
    }

    /// Blocks every call until released.
    #[derive(Default)]
    struct GatedGenerator {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Generator for GatedGenerator {
        async fn generate(&self, prompt: &str, _context: &str) -> std::result::Result<String, GenerationError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(format!("answer to {}", prompt))
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl Generator for SlowGenerator {
        async fn generate(&self, _prompt: &str, _context: &str) -> std::result::Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok("too late".into())
        }
    }

    fn offline() -> LearningSession {
        LearningSession::new(Arc::new(OfflineGenerator::new()))
    }

    #[tokio::test]
    async fn test_submit_root_selects_root() {
        let session = offline();
        let root = session.submit_root("What is recursion?").await.unwrap();

        assert_eq!(session.selected(), Some(root));
        session.with_tree(|tree| {
            let node = tree.node(&root).unwrap();
            assert_eq!(node.title, "What is recursion?");
            assert_eq!(node.messages.len(), 2);
            assert_eq!(tree.transcript().len(), 2);
        });
    }

    #[tokio::test]
    async fn test_submit_root_twice() {
        let session = offline();
        let root = session.submit_root("first").await.unwrap();
        let err = session.submit_root("second").await.unwrap_err();
        assert_eq!(err, SessionError::AlreadyExists(root));
        assert_eq!(session.metrics().generations_started, 1);
    }

    #[tokio::test]
    async fn test_submit_to_node_captures_context() {
        let session = offline();
        let root = session.submit_root("Rust").await.unwrap();
        let kids = session.expand_node(&root, Some(vec!["Ownership".into()])).unwrap();

        let reply = session.submit_to_node(&kids[0], "Who owns a value?").await.unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.context_node_ids, Some(vec![root, kids[0]]));

        session.with_tree(|tree| {
            let messages = &tree.node(&kids[0]).unwrap().messages;
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[0].role, Role::User);
            assert_eq!(messages[0].context_node_ids, Some(vec![root, kids[0]]));
        });
    }

    #[tokio::test]
    async fn test_submit_to_missing_node() {
        let session = offline();
        session.submit_root("Rust").await.unwrap();
        let err = session.submit_to_node(&NodeId::new(), "hello").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_submit_to_transcript() {
        let session = offline();
        session.submit_root("Rust").await.unwrap();
        let reply = session.submit_to_transcript("And Go?").await.unwrap();

        assert_eq!(reply.node_id, None);
        session.with_tree(|tree| {
            assert_eq!(tree.transcript().len(), 4);
            assert_eq!(tree.root().unwrap().messages.len(), 2);
        });
    }

    #[tokio::test]
    async fn test_failure_keeps_user_message() {
        let session = offline();
        let root = session.submit_root("Rust").await.unwrap();
        let snapshot = session.snapshot();

        let failing = LearningSession::new(Arc::new(FailingGenerator));
        *failing.tree.write() = snapshot;

        let err = failing.submit_to_node(&root, "why?").await.unwrap_err();
        assert!(matches!(err, SessionError::GenerationFailed(ref m) if m.contains("backend down")));
        assert!(!failing.is_busy());
        assert!(failing.last_error(Slot::Node(root)).is_some());
        assert_eq!(failing.state(Slot::Node(root)), SlotState::Idle);

        failing.with_tree(|tree| {
            let messages = &tree.node(&root).unwrap().messages;
            assert_eq!(messages.len(), 3);
            assert_eq!(messages[2].role, Role::User);
        });
        assert_eq!(failing.metrics().generations_failed, 1);
    }

    #[tokio::test]
    async fn test_failed_root_creates_nothing() {
        let session = LearningSession::new(Arc::new(FailingGenerator));
        let err = session.submit_root("Rust").await.unwrap_err();
        assert!(matches!(err, SessionError::GenerationFailed(_)));
        assert!(session.with_tree(|tree| tree.is_empty()));
        assert_eq!(session.selected(), None);
        assert!(session.last_error(Slot::Transcript).is_some());
    }

    #[tokio::test]
    async fn test_busy_rejects_second_submission() {
        let generator = Arc::new(GatedGenerator::default());
        let session = Arc::new(LearningSession::new(generator.clone()));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.submit_root("Rust").await })
        };
        generator.entered.notified().await;

        assert!(session.is_busy());
        assert_eq!(session.state(Slot::Transcript), SlotState::Sending);
        let err = session.submit_to_transcript("Go").await.unwrap_err();
        assert_eq!(err, SessionError::Busy);
        assert!(err.is_retryable());
        assert!(session.with_tree(|tree| tree.transcript().is_empty()));

        generator.release.notify_one();
        let root = first.await.unwrap().unwrap();
        assert!(!session.is_busy());
        assert_eq!(session.selected(), Some(root));
        assert_eq!(session.metrics().busy_rejections, 1);
    }

    #[tokio::test]
    async fn test_dropped_submission_releases_guard() {
        let generator = Arc::new(GatedGenerator::default());
        let session = Arc::new(LearningSession::new(generator.clone()));

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.submit_root("Rust").await })
        };
        generator.entered.notified().await;
        assert!(session.is_busy());

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        assert!(!session.is_busy());
        assert_eq!(session.state(Slot::Transcript), SlotState::Idle);
        assert!(session.with_tree(|tree| tree.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_timeout() {
        let session = LearningSession::new(Arc::new(SlowGenerator));
        let err = session.submit_root("Rust").await.unwrap_err();
        assert!(matches!(err, SessionError::GenerationFailed(ref m) if m.contains("Timed out")));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_expand_with_suggestions() {
        let session = offline();
        let root = session.submit_root("How do I learn programming?").await.unwrap();

        let kids = session.expand_node(&root, None).unwrap();
        assert!(!kids.is_empty());
        assert!(kids.len() <= 5);
        session.with_tree(|tree| {
            assert_eq!(tree.children(&root).len(), kids.len());
            assert!(tree.validate().is_ok());
        });
    }

    #[tokio::test]
    async fn test_expand_keeps_every_explicit_title() {
        let session = offline();
        let root = session.submit_root("Rust").await.unwrap();
        let titles: Vec<String> = (0..7).map(|i| format!("Topic {}", i)).collect();

        let kids = session.expand_node(&root, Some(titles.clone())).unwrap();
        assert_eq!(kids.len(), 7);
        session.with_tree(|tree| {
            let children = tree.children(&root);
            let created: Vec<&str> = children.iter().map(|n| n.title.as_str()).collect();
            assert_eq!(created, titles.iter().map(String::as_str).collect::<Vec<_>>());
        });
    }

    #[tokio::test]
    async fn test_expand_caps_custom_suggester() {
        struct Chatty;
        impl TopicSuggester for Chatty {
            fn suggest(&self, _title: &str, _text: &str) -> Vec<String> {
                (0..9).map(|i| format!("Idea {}", i)).collect()
            }
        }

        let session = offline().with_suggester(Box::new(Chatty));
        let root = session.submit_root("Rust").await.unwrap();
        let kids = session.expand_node(&root, None).unwrap();
        assert_eq!(kids.len(), session.config().max_suggestions);
    }

    #[tokio::test]
    async fn test_expand_empty_titles() {
        let session = offline();
        let root = session.submit_root("Rust").await.unwrap();
        let kids = session.expand_node(&root, Some(Vec::new())).unwrap();
        assert!(kids.is_empty());
        assert_eq!(session.with_tree(|tree| tree.len()), 1);
    }

    #[tokio::test]
    async fn test_select_unknown_node() {
        let session = offline();
        let err = session.select_node(Some(NodeId::new())).unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));

        let root = session.submit_root("Rust").await.unwrap();
        session.select_node(None).unwrap();
        assert_eq!(session.selected(), None);
        session.select_node(Some(root)).unwrap();
        assert_eq!(session.view().selected_id, Some(root));
    }

    #[tokio::test]
    async fn test_dispatch_routes_submit() {
        let session = offline();
        let outcome = session
            .dispatch(Intent::Submit {
                text: "Rust".into(),
                target_id: None,
            })
            .await
            .unwrap();
        let root = match outcome {
            IntentOutcome::RootCreated(id) => id,
            other => panic!("unexpected outcome: {:?}", other),
        };

        let outcome = session
            .dispatch(Intent::Submit {
                text: "More".into(),
                target_id: None,
            })
            .await
            .unwrap();
        assert!(matches!(outcome, IntentOutcome::Replied(ref m) if m.node_id.is_none()));

        let outcome = session
            .dispatch(Intent::ExpandNode {
                id: root,
                titles: Some(vec!["Traits".into()]),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, IntentOutcome::Expanded(ref ids) if ids.len() == 1));
    }
}
