//! Per-message processing state.
//!
//! Every inbound message (and every outbound dispatch) gets one [`State`],
//! shared behind an async mutex so middleware pieces, matchers and callbacks
//! can all see what happened before them: which branches matched, what the
//! last match value was, which stages have run, and which replies are queued.
//! The whole record serializes for the remember stage's persistence.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::branch::BranchMatch;
use crate::condition::Captured;
use crate::dialogue::Dialogue;
use crate::envelope::Envelope;
use crate::error::Result;
use crate::message::Message;
use crate::nlu::NluResults;
use crate::thought::Stage;

/// Shared handle to a state, cloned into every piece and callback.
pub type SharedState = Arc<Mutex<State>>;

/// A branch id paired with the match value its matcher produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedBranch {
    /// The branch's id.
    pub id: String,
    /// The value the matcher returned.
    pub value: BranchMatch,
}

/// The record of one pipeline run.
#[derive(Debug, Default, Serialize)]
pub struct State {
    message: Option<Message>,
    branches: Vec<MatchedBranch>,
    last_match: Option<BranchMatch>,
    matched: bool,
    done: bool,
    processed: HashMap<Stage, DateTime<Utc>>,
    envelopes: Vec<Envelope>,
    #[serde(skip)]
    dialogue: Option<Weak<Dialogue>>,
}

impl State {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state for an inbound message.
    #[must_use]
    pub fn with_message(message: Message) -> Self {
        Self {
            message: Some(message),
            ..Self::default()
        }
    }

    /// Create a state for an outbound envelope.
    #[must_use]
    pub fn with_envelope(envelope: Envelope) -> Self {
        Self {
            envelopes: vec![envelope],
            ..Self::default()
        }
    }

    /// Wrap the state for sharing across pieces and callbacks.
    #[must_use]
    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    /// The message being processed, if this is an inbound run.
    #[must_use]
    pub const fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Record a branch match: appends to the match list, updates the last
    /// match value and flips the matched flag.
    pub fn record_match(&mut self, id: impl Into<String>, value: BranchMatch) {
        self.last_match = Some(value.clone());
        self.branches.push(MatchedBranch {
            id: id.into(),
            value,
        });
        self.matched = true;
    }

    /// True once any branch has matched.
    #[must_use]
    pub const fn matched(&self) -> bool {
        self.matched
    }

    /// True once processing has been halted.
    #[must_use]
    pub const fn done(&self) -> bool {
        self.done
    }

    /// Halt branch processing for every later stage.
    pub fn finish(&mut self) {
        self.done = true;
    }

    /// The most recent match value.
    #[must_use]
    pub const fn last_match(&self) -> Option<&BranchMatch> {
        self.last_match.as_ref()
    }

    /// Every branch that matched, in order.
    #[must_use]
    pub fn branches(&self) -> &[MatchedBranch] {
        &self.branches
    }

    /// The capture view of the last text match, if there was one.
    #[must_use]
    pub fn captured(&self) -> Option<&Captured> {
        match self.last_match.as_ref()? {
            BranchMatch::Conditions { captured, .. } => Some(captured),
            _ => None,
        }
    }

    /// Queue a reply addressed back at the inbound message.
    pub fn respond<I, S>(&mut self, strings: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let envelope = self.reply_envelope();
        self.envelopes.push(envelope.compose(strings));
    }

    /// Queue a reply dispatched with a specific envelope method.
    pub fn respond_via<I, S>(&mut self, method: impl Into<String>, strings: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let envelope = self.reply_envelope();
        self.envelopes.push(envelope.compose(strings).via(method));
    }

    /// Queue a pre-built envelope.
    pub fn queue(&mut self, envelope: Envelope) {
        self.envelopes.push(envelope);
    }

    /// Every queued envelope, sent or not.
    #[must_use]
    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    /// True when a queued envelope has not been handed to the adapter yet.
    #[must_use]
    pub fn pending(&self) -> bool {
        self.envelopes.iter().any(|envelope| !envelope.is_sent())
    }

    /// The first envelope still waiting to be dispatched.
    #[must_use]
    pub fn next_unsent(&self) -> Option<Envelope> {
        self.envelopes
            .iter()
            .find(|envelope| !envelope.is_sent())
            .cloned()
    }

    /// Mark a queued envelope as handed to the adapter.
    pub fn mark_sent(&mut self, id: &str) {
        if let Some(envelope) = self.envelopes.iter_mut().find(|envelope| envelope.id == id) {
            envelope.mark_sent();
        }
    }

    /// Record the time a stage completed.
    pub fn stamp(&mut self, stage: Stage) {
        self.processed.insert(stage, Utc::now());
    }

    /// When a stage completed, if it has.
    #[must_use]
    pub fn processed_at(&self, stage: Stage) -> Option<DateTime<Utc>> {
        self.processed.get(&stage).copied()
    }

    /// Replace the message with its catch-all wrapper.
    pub fn wrap_catch_all(&mut self) {
        if let Some(message) = self.message.take() {
            self.message = Some(message.into_catch_all());
        }
    }

    /// Attach NLU results to the message.
    pub fn attach_nlu(&mut self, results: NluResults) {
        if let Some(message) = &mut self.message {
            message.set_nlu(results);
        }
    }

    /// Tie the state to the dialogue currently engaged for its audience.
    pub fn set_dialogue(&mut self, dialogue: &Arc<Dialogue>) {
        self.dialogue = Some(Arc::downgrade(dialogue));
    }

    /// The engaged dialogue, while it is still alive.
    #[must_use]
    pub fn dialogue(&self) -> Option<Arc<Dialogue>> {
        self.dialogue.as_ref().and_then(Weak::upgrade)
    }

    /// Serialize the full record for persistence.
    pub fn snapshot(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn reply_envelope(&self) -> Envelope {
        match &self.message {
            Some(message) => Envelope::reply_to(message),
            None => Envelope::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionMatch;
    use crate::user::{Room, User};

    fn text_state(text: &str) -> State {
        let user = User::new("u1").room(Room::new("r1"));
        State::with_message(Message::text(user, text))
    }

    #[test]
    fn record_match_updates_flags_and_history() {
        let mut state = text_state("hi");
        assert!(!state.matched());

        state.record_match("listen_0", BranchMatch::CatchAll);
        state.record_match("listen_1", BranchMatch::Value(serde_json::json!(42)));

        assert!(state.matched());
        assert_eq!(state.branches().len(), 2);
        assert_eq!(
            state.last_match(),
            Some(&BranchMatch::Value(serde_json::json!(42)))
        );
    }

    #[test]
    fn respond_addresses_the_sender() {
        let mut state = text_state("hi");
        state.respond(["hello there"]);

        let envelope = state.next_unsent().unwrap();
        assert_eq!(envelope.user.as_ref().unwrap().id, "u1");
        assert_eq!(envelope.room.as_ref().unwrap().id, "r1");
        assert_eq!(envelope.strings, vec!["hello there"]);
        assert!(state.pending());
    }

    #[test]
    fn respond_via_sets_the_method() {
        let mut state = text_state("hi");
        state.respond_via("emote", ["waves"]);
        assert_eq!(state.next_unsent().unwrap().method, "emote");
    }

    #[test]
    fn mark_sent_clears_pending() {
        let mut state = text_state("hi");
        state.respond(["one"]);
        state.respond(["two"]);

        let first = state.next_unsent().unwrap();
        state.mark_sent(&first.id);

        let second = state.next_unsent().unwrap();
        assert_ne!(second.id, first.id);
        state.mark_sent(&second.id);
        assert!(!state.pending());
    }

    #[test]
    fn stamps_are_ordered_by_stage_sequence() {
        let mut state = text_state("hi");
        state.stamp(Stage::Hear);
        state.stamp(Stage::Listen);

        let heard = state.processed_at(Stage::Hear).unwrap();
        let listened = state.processed_at(Stage::Listen).unwrap();
        assert!(heard <= listened);
        assert!(state.processed_at(Stage::Act).is_none());
    }

    #[test]
    fn wrap_catch_all_preserves_the_original() {
        let mut state = text_state("lost words");
        state.wrap_catch_all();

        let message = state.message().unwrap();
        assert!(message.is_catch_all());
        assert_eq!(
            message.catch_all_inner().unwrap().text_content(),
            Some("lost words")
        );
    }

    #[test]
    fn snapshot_serializes_the_record() {
        let mut state = text_state("hi");
        state.record_match(
            "listen_0",
            BranchMatch::Conditions {
                matched: ConditionMatch::Success(true),
                captured: Captured::Single(None),
            },
        );
        state.respond(["ok"]);
        state.stamp(Stage::Listen);

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot["matched"], serde_json::json!(true));
        assert_eq!(snapshot["branches"][0]["id"], serde_json::json!("listen_0"));
        assert!(snapshot["processed"]["listen"].is_string());
    }
}
