//! Per-request flow for a swipe and for a new game.
//!
//! ```text
//! resolve_choice
//!   ├─ ending? ─────────────► return current unchanged
//!   ├─ cancel opposite branch
//!   └─ claim key
//!        ├─ Resolved ───────► node
//!        ├─ Pending ──► join ─► Resolved ─► node
//!        │                    └─ Aborted / Failed ─► claim again
//!        └─ Lead ──► generate, publish to joiners ─► node or error
//!   then arm both children of the returned node
//! ```
//!
//! Concurrent swipes on the same branch share one generation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::AppResult;
use crate::preload::{Claim, PreloadCoordinator, PreloadKey, PreloadOutcome};
use crate::story::{Direction, GenerationRequest, HistoryEntry, NodeGenerator, StoryNode};

/// Source of the node returned for a swipe, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSource {
    Joined,
    Preloaded,
    Generated,
    Terminal,
}

impl NodeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeSource::Joined => "joined",
            NodeSource::Preloaded => "preloaded",
            NodeSource::Generated => "generated",
            NodeSource::Terminal => "terminal",
        }
    }
}

/// Resolves swipes against the preload tables and keeps the next level armed.
pub struct Orchestrator {
    generator: Arc<NodeGenerator>,
    preloads: Arc<PreloadCoordinator>,
    new_game_prompt: String,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<NodeGenerator>,
        preloads: Arc<PreloadCoordinator>,
        new_game_prompt: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            preloads,
            new_game_prompt: new_game_prompt.into(),
        }
    }

    /// Produce the node the player reaches by swiping `choice` on `current`.
    ///
    /// `depth` is the depth of the node being produced. An ending `current`
    /// is returned as-is and arms nothing.
    pub async fn resolve_choice(
        &self,
        current: StoryNode,
        choice: Direction,
        history: Vec<HistoryEntry>,
        depth: u32,
    ) -> AppResult<StoryNode> {
        if current.is_ending {
            info!(
                node_id = %current.id,
                source = NodeSource::Terminal.as_str(),
                "Current node is an ending, nothing to advance"
            );
            return Ok(current);
        }

        self.preloads.cancel(&PreloadKey::new(&current.id, choice.opposite()));

        let key = PreloadKey::new(&current.id, choice);
        let (node, source) = loop {
            match self.preloads.claim(key.clone()) {
                Claim::Resolved(node) => {
                    info!(key = %key, "Using preloaded node");
                    break (node, NodeSource::Preloaded);
                }
                Claim::Pending(handle) => {
                    info!(key = %key, "Joining in-flight generation");
                    match handle.wait().await {
                        PreloadOutcome::Resolved(node) => break (node, NodeSource::Joined),
                        PreloadOutcome::Aborted => {
                            warn!(key = %key, "Joined generation was aborted");
                        }
                        PreloadOutcome::Failed(reason) => {
                            warn!(key = %key, reason = %reason, "Joined generation failed");
                        }
                    }
                }
                Claim::Lead(lease) => {
                    info!(key = %key, depth, "No preload available, generating synchronously");
                    let request = GenerationRequest::continue_from(
                        current.clone(),
                        choice,
                        history.clone(),
                        depth,
                    );
                    let result = self.generator.generate(&request, lease.cancel_token()).await;
                    lease.finish(&result);
                    match result {
                        Ok(node) => break (node, NodeSource::Generated),
                        Err(e) => {
                            error!(key = %key, error = %e, "Story generation failed");
                            return Err(e);
                        }
                    }
                }
            }
        };

        info!(
            node_id = %node.id,
            source = source.as_str(),
            is_ending = node.is_ending,
            "Resolved next node"
        );

        let mut next_history = history;
        next_history.push(HistoryEntry::from(&node));
        self.arm(&node, next_history, depth + 1);

        Ok(node)
    }

    /// Start a fresh game from the configured opening instruction.
    ///
    /// Never served from a cache or a preload.
    pub async fn new_game(&self) -> AppResult<StoryNode> {
        let request = GenerationRequest::new_game(&self.new_game_prompt);
        let node = self
            .generator
            .generate(&request, &CancellationToken::new())
            .await
            .inspect_err(|e| error!(error = %e, "New game generation failed"))?;

        info!(node_id = %node.id, "New game started");

        let history = vec![HistoryEntry::from(&node)];
        self.arm(&node, history, request.depth() + 1);

        Ok(node)
    }

    /// Schedule both children of `node` at `depth`.
    fn arm(&self, node: &StoryNode, history: Vec<HistoryEntry>, depth: u32) {
        if node.is_ending {
            return;
        }
        for direction in Direction::BOTH {
            self.preloads.schedule(node, direction, history.clone(), depth);
        }
    }
}
