//! The thought process: ordered stages a message passes through.
//!
//! Receiving runs hear, listen, understand, serve, act, respond and
//! remember in that order. Dispatching an outgoing envelope runs only
//! respond and remember. Every stage gates itself: branch-bearing stages
//! skip when they have no branches or the state is done, understand skips
//! without an NLU adapter or analyzable text, respond skips with nothing
//! pending, remember skips without storage. One stage failing is logged
//! and never takes the others down.

use std::sync::Arc;

use serde::Serialize;

use crate::bot::Bot;
use crate::branch::Branch;
use crate::middleware::Completion;
use crate::path::Path;
use crate::state::SharedState;

/// Collection name states are kept under by the remember stage.
pub const STATES_COLLECTION: &str = "states";

/// A stage of the thought process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Decide whether to pay attention at all.
    Hear,
    /// Match text branches.
    Listen,
    /// Fetch NLU results and match NLU branches.
    Understand,
    /// Match server payload branches.
    Serve,
    /// Catch messages nothing else handled.
    Act,
    /// Hand pending envelopes to the message adapter.
    Respond,
    /// Persist the state through the storage adapter.
    Remember,
}

impl Stage {
    /// The stage's key, as used in logs and persisted state.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Hear => "hear",
            Self::Listen => "listen",
            Self::Understand => "understand",
            Self::Serve => "serve",
            Self::Act => "act",
            Self::Respond => "respond",
            Self::Remember => "remember",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// One run of the thought process over one state.
///
/// Built fresh per inbound message or outbound envelope; holds a working
/// copy of the resolved path so registries stay clean across runs.
#[derive(Debug)]
pub struct Thoughts {
    bot: Arc<Bot>,
    state: SharedState,
    path: Path,
}

impl Thoughts {
    /// Prepare a run against a state and the path resolved for it.
    #[must_use]
    pub fn new(bot: &Arc<Bot>, state: SharedState, path: Path) -> Self {
        Self {
            bot: Arc::clone(bot),
            state,
            path,
        }
    }

    /// Run the full receive sequence and hand the state back.
    pub async fn receive(self) -> SharedState {
        self.hear().await;
        self.listen().await;
        self.understand().await;
        self.serve().await;
        self.act().await;
        self.respond().await;
        self.remember().await;
        self.state
    }

    /// Run the dispatch sequence for an outgoing envelope.
    pub async fn dispatch(self) -> SharedState {
        self.respond().await;
        self.remember().await;
        self.state
    }

    /// Run the hear middleware. Interruption or failure finishes the state
    /// so no branch-bearing stage touches the message.
    async fn hear(&self) {
        let middleware = self.bot.middleware(Stage::Hear);
        let outcome = middleware
            .execute(&self.state, |_state| async { Ok(()) })
            .await;
        match outcome {
            Ok(Completion::Completed) => self.state.lock().await.stamp(Stage::Hear),
            Ok(Completion::Stopped) => {
                tracing::debug!("hearing interrupted");
                self.state.lock().await.finish();
            }
            Err(error) => {
                tracing::warn!(%error, "hear stage failed");
                self.state.lock().await.finish();
            }
        }
    }

    async fn listen(&self) {
        self.run_branches(Stage::Listen, self.path.branches(Stage::Listen))
            .await;
    }

    /// Attach NLU results, then match understand branches.
    ///
    /// The adapter is consulted at most once per run, and only when the
    /// message carries text and no results yet. An already-matched state
    /// skips the stage entirely unless a forced branch still wants it.
    async fn understand(&self) {
        let branches = self.path.branches(Stage::Understand);
        if branches.is_empty() {
            return;
        }
        let Some(adapter) = self.bot.nlu() else {
            return;
        };
        let message = { self.state.lock().await.message().cloned() };
        let Some(message) = message else {
            return;
        };
        if !message
            .text_content()
            .is_some_and(|text| !text.trim().is_empty())
        {
            return;
        }
        if self.state.lock().await.matched() && !self.path.has_forced(Stage::Understand) {
            return;
        }
        if message.nlu().is_none() {
            match adapter.process(&message).await {
                Ok(Some(results)) => self.state.lock().await.attach_nlu(results),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(adapter = %adapter.name(), %error, "NLU processing failed");
                    return;
                }
            }
        }
        self.run_branches(Stage::Understand, branches).await;
    }

    async fn serve(&self) {
        let is_server = self
            .state
            .lock()
            .await
            .message()
            .is_some_and(|message| message.server_data().is_some());
        if !is_server {
            return;
        }
        self.run_branches(Stage::Serve, self.path.branches(Stage::Serve))
            .await;
    }

    /// Wrap the unhandled message and give catch-all branches a shot.
    async fn act(&self) {
        let branches = self.path.branches(Stage::Act);
        if branches.is_empty() {
            return;
        }
        {
            let mut locked = self.state.lock().await;
            if locked.matched() || locked.done() {
                return;
            }
            locked.wrap_catch_all();
        }
        self.run_branches(Stage::Act, branches).await;
    }

    /// Hand every pending envelope to the message adapter, in order.
    async fn respond(&self) {
        let Some(adapter) = self.bot.messenger() else {
            return;
        };
        if !self.state.lock().await.pending() {
            return;
        }
        let middleware = self.bot.middleware(Stage::Respond);
        let outcome = middleware
            .execute(&self.state, |state| {
                let adapter = Arc::clone(adapter);
                async move {
                    loop {
                        let next = { state.lock().await.next_unsent() };
                        let Some(envelope) = next else { break };
                        adapter.dispatch(&envelope).await?;
                        tracing::debug!(envelope = %envelope.id, adapter = %adapter.name(), "responded");
                        state.lock().await.mark_sent(&envelope.id);
                    }
                    Ok(())
                }
            })
            .await;
        match outcome {
            Ok(Completion::Completed) => self.state.lock().await.stamp(Stage::Respond),
            Ok(Completion::Stopped) => tracing::debug!("responding interrupted"),
            Err(error) => tracing::warn!(%error, "respond stage failed"),
        }
    }

    /// Keep a snapshot of the state through the storage adapter.
    async fn remember(&self) {
        let Some(storage) = self.bot.storage() else {
            return;
        };
        let middleware = self.bot.middleware(Stage::Remember);
        let outcome = middleware
            .execute(&self.state, |state| {
                let storage = Arc::clone(storage);
                async move {
                    let snapshot = { state.lock().await.snapshot()? };
                    storage.keep(STATES_COLLECTION, snapshot).await
                }
            })
            .await;
        match outcome {
            Ok(Completion::Completed) => self.state.lock().await.stamp(Stage::Remember),
            Ok(Completion::Stopped) => tracing::debug!("remembering interrupted"),
            Err(error) => tracing::warn!(%error, "remember stage failed"),
        }
    }

    /// Process a stage's working branches against the state.
    ///
    /// Skips on an empty collection or a done state. Once the state has
    /// matched, only forced branches still process. Returns whether the
    /// state had matched by the time the stage concluded, stamping the
    /// stage when it had.
    async fn run_branches(&self, stage: Stage, mut branches: Vec<Branch>) -> bool {
        if branches.is_empty() {
            return false;
        }
        if self.state.lock().await.done() {
            tracing::debug!(stage = %stage, "state is done, skipping");
            return false;
        }
        let middleware = self.bot.middleware(stage);
        for branch in &mut branches {
            let (done, matched) = {
                let locked = self.state.lock().await;
                (locked.done(), locked.matched())
            };
            if done {
                break;
            }
            if matched && !branch.is_forced() {
                continue;
            }
            branch
                .process(&self.state, &middleware, self.bot.bits(), self.bot.identity())
                .await;
        }
        let mut locked = self.state.lock().await;
        let success = locked.matched();
        if success {
            locked.stamp(stage);
        }
        success
    }
}
