//! Speculative preloading of both branches of a node.
//!
//! The [`PreloadCoordinator`] owns two tables:
//!
//! - **pending**: one entry per [`PreloadKey`] whose generation is in flight,
//!   holding its cancellation token and a joinable outcome channel
//! - **resolved**: finished nodes, kept for the preload TTL
//!
//! Checking both tables and registering a new pending entry happens under a
//! single lock, so a key never has two generations in flight. That holds for
//! background preloads started by [`PreloadCoordinator::schedule`] and for
//! foreground requests that go through [`PreloadCoordinator::claim`]: a caller
//! either gets the resolved node, joins the pending generation, or receives a
//! [`Lease`] and runs the generation itself while later callers join it.
//!
//! Every generation ends in a [`PreloadOutcome`]; only `Resolved` is ever
//! written to the resolved table.
//!
//! ```text
//! schedule / claim ─► pending ─┬─► Resolved ─► resolved table
//!                              ├─► Aborted   (cancelled, nothing written)
//!                              └─► Failed    (logged, nothing written)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::error::AppResult;
use crate::story::{Direction, GenerationRequest, HistoryEntry, NodeGenerator, StoryNode};

/// Identifies one branch: `"{nodeId}:{direction}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreloadKey(String);

impl PreloadKey {
    pub fn new(node_id: &str, direction: Direction) -> Self {
        Self(format!("{}:{}", node_id, direction))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a background preload settled.
#[derive(Debug, Clone, PartialEq)]
pub enum PreloadOutcome {
    Resolved(StoryNode),
    /// Cancelled before completion. Expected on every swipe.
    Aborted,
    Failed(String),
}

/// A joinable view of an in-flight preload.
///
/// Every handle for the same generation observes the same outcome.
#[derive(Debug, Clone)]
pub struct PendingHandle {
    outcome: watch::Receiver<Option<PreloadOutcome>>,
}

impl PendingHandle {
    /// Wait for the generation to settle.
    pub async fn wait(mut self) -> PreloadOutcome {
        match self.outcome.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome)
                .clone()
                .unwrap_or_else(|| PreloadOutcome::Failed("preload outcome missing".to_string())),
            Err(_) => PreloadOutcome::Failed("preload task ended without an outcome".to_string()),
        }
    }
}

#[derive(Debug)]
struct PendingEntry {
    /// Distinguishes this generation from a later one under the same key.
    generation: u64,
    cancel: CancellationToken,
    outcome: watch::Receiver<Option<PreloadOutcome>>,
    /// A player is waiting on this generation; `cancel` leaves it alone.
    foreground: bool,
}

/// Result of [`PreloadCoordinator::claim`].
#[derive(Debug)]
pub enum Claim {
    /// The key was already resolved.
    Resolved(StoryNode),
    /// Another generation for the key is in flight.
    Pending(PendingHandle),
    /// Nothing existed; the caller now owns the generation for the key.
    Lead(Lease),
}

/// Ownership of a foreground generation registered by [`PreloadCoordinator::claim`].
///
/// Finish it with [`Lease::finish`]. A lease dropped unfinished retires its
/// pending entry and reports `Aborted` to anyone who joined it.
pub struct Lease {
    coordinator: Arc<PreloadCoordinator>,
    key: PreloadKey,
    generation: u64,
    cancel: CancellationToken,
    tx: Option<watch::Sender<Option<PreloadOutcome>>>,
}

impl Lease {
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Publish the generation result to joiners and the resolved table.
    pub fn finish(mut self, result: &AppResult<StoryNode>) -> PreloadOutcome {
        let outcome = self
            .coordinator
            .settle(&self.key, self.generation, &self.cancel, result);
        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(outcome.clone()));
        }
        outcome
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .field("finished", &self.tx.is_none())
            .finish()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            debug!(key = %self.key, "Foreground generation dropped before finishing");
            self.coordinator.retire(&self.key, self.generation);
            tx.send_replace(Some(PreloadOutcome::Aborted));
        }
    }
}

/// Table sizes, for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadStats {
    pub pending: usize,
    pub resolved: usize,
}

/// Owner of the pending and resolved preload tables.
pub struct PreloadCoordinator {
    generator: Arc<NodeGenerator>,
    pending: Mutex<HashMap<PreloadKey, PendingEntry>>,
    resolved: TtlCache<StoryNode>,
    next_generation: AtomicU64,
}

impl PreloadCoordinator {
    pub fn new(generator: Arc<NodeGenerator>, resolved_ttl: Duration) -> Self {
        Self {
            generator,
            pending: Mutex::new(HashMap::new()),
            resolved: TtlCache::new("preload", resolved_ttl),
            next_generation: AtomicU64::new(1),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<PreloadKey, PendingEntry>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a fresh pending entry for `key`. The caller holds the pending lock.
    fn register(
        &self,
        pending: &mut HashMap<PreloadKey, PendingEntry>,
        key: PreloadKey,
        foreground: bool,
    ) -> (u64, CancellationToken, watch::Sender<Option<PreloadOutcome>>) {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(None);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        pending.insert(
            key,
            PendingEntry {
                generation,
                cancel: cancel.clone(),
                outcome: rx,
                foreground,
            },
        );
        (generation, cancel, tx)
    }

    /// Remove the pending entry for `key` if it still belongs to `generation`.
    fn retire(&self, key: &PreloadKey, generation: u64) {
        let mut pending = self.pending();
        if pending
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
        {
            pending.remove(key);
        }
    }

    /// Get the node for `key`, join its in-flight generation, or take
    /// ownership of generating it, as one atomic step.
    pub fn claim(self: &Arc<Self>, key: PreloadKey) -> Claim {
        let mut pending = self.pending();
        if let Some(entry) = pending.get(&key) {
            return Claim::Pending(PendingHandle {
                outcome: entry.outcome.clone(),
            });
        }
        if let Some(node) = self.resolved.get(key.as_str()) {
            return Claim::Resolved(node);
        }

        let (generation, cancel, tx) = self.register(&mut pending, key.clone(), true);
        Claim::Lead(Lease {
            coordinator: Arc::clone(self),
            key,
            generation,
            cancel,
            tx: Some(tx),
        })
    }

    /// Start generating the `direction` child of `node` in the background.
    ///
    /// No-op when the key is already resolved or pending, and for ending
    /// nodes (they have no children). Returns whether a task was spawned.
    /// Must be called from within a Tokio runtime.
    pub fn schedule(
        self: &Arc<Self>,
        node: &StoryNode,
        direction: Direction,
        history: Vec<HistoryEntry>,
        depth: u32,
    ) -> bool {
        if node.is_ending {
            debug!(node_id = %node.id, "Ending node has no branches to preload");
            return false;
        }

        let key = PreloadKey::new(&node.id, direction);
        let (generation, cancel, tx) = {
            let mut pending = self.pending();
            if pending.contains_key(&key) || self.resolved.contains(key.as_str()) {
                info!(key = %key, "Preload already exists or pending");
                return false;
            }
            self.register(&mut pending, key.clone(), false)
        };

        info!(key = %key, depth, "Preloading branch");

        let request = GenerationRequest::continue_from(node.clone(), direction, history, depth);
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let result = coordinator.generator.generate(&request, &cancel).await;
            let outcome = coordinator.settle(&key, generation, &cancel, &result);
            tx.send_replace(Some(outcome));
        });

        true
    }

    /// Record a finished generation and retire its pending entry.
    fn settle(
        &self,
        key: &PreloadKey,
        generation: u64,
        cancel: &CancellationToken,
        result: &AppResult<StoryNode>,
    ) -> PreloadOutcome {
        let mut pending = self.pending();

        let outcome = match result {
            Ok(_) if cancel.is_cancelled() => {
                info!(key = %key, "Preload finished after cancellation, discarding");
                PreloadOutcome::Aborted
            }
            Ok(node) => {
                self.resolved.set(key.as_str(), node.clone());
                info!(key = %key, node_id = %node.id, "Preloaded node stored");
                PreloadOutcome::Resolved(node.clone())
            }
            Err(e) if e.is_cancelled() || cancel.is_cancelled() => {
                info!(key = %key, "Preload aborted");
                PreloadOutcome::Aborted
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Preload failed");
                PreloadOutcome::Failed(e.to_string())
            }
        };

        if pending
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
        {
            pending.remove(key);
        }

        outcome
    }

    /// Cancel the in-flight background preload for `key`, if any.
    ///
    /// The pending entry is retired immediately; its task settles as
    /// `Aborted` and writes nothing. Foreground generations are never
    /// cancelled. Returns whether anything was cancelled.
    pub fn cancel(&self, key: &PreloadKey) -> bool {
        let entry = {
            let mut pending = self.pending();
            match pending.get(key) {
                Some(entry) if !entry.foreground => pending.remove(key),
                _ => None,
            }
        };
        match entry {
            Some(entry) => {
                info!(key = %key, "Cancelling unchosen preload");
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn peek_resolved(&self, key: &PreloadKey) -> Option<StoryNode> {
        self.resolved.get(key.as_str())
    }

    pub fn peek_pending(&self, key: &PreloadKey) -> Option<PendingHandle> {
        self.pending().get(key).map(|entry| PendingHandle {
            outcome: entry.outcome.clone(),
        })
    }

    pub fn is_pending(&self, key: &PreloadKey) -> bool {
        self.pending().contains_key(key)
    }

    pub fn stats(&self) -> PreloadStats {
        PreloadStats {
            pending: self.pending().len(),
            resolved: self.resolved.len(),
        }
    }

    /// Drop expired resolved entries.
    pub fn purge_expired(&self) -> usize {
        self.resolved.purge_expired()
    }
}
