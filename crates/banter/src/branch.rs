//! Branches: one match rule paired with one callback.
//!
//! Every variant satisfies the same contract: a matcher looks at the inbound
//! message and produces a match value whose truthiness decides whether the
//! branch matched. Direct variants gate on the bot being addressed by name
//! before delegating to their base matcher. Matcher failures are logged and
//! count as no match; they never take the pipeline down.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bit::Bits;
use crate::condition::{Captured, ConditionMatch, ConditionSet, Expression};
use crate::config::Identity;
use crate::error::{BanterError, CompileError, Result};
use crate::message::Message;
use crate::middleware::{callback, Callback, Middleware};
use crate::nlu::{NluCriteriaSet, NluResult};
use crate::state::SharedState;

/// What a branch does when it matches.
#[derive(Clone)]
pub enum Action {
    /// Run a stored callback with the shared state.
    Func(Callback),
    /// Run a bit from the bit registry, by id.
    Bit(String),
}

impl Action {
    /// Box an async closure into a callback action.
    pub fn func<F, Fut>(f: F) -> Self
    where
        F: Fn(SharedState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::Func(callback(f))
    }

    /// Refer to a registered bit by id.
    pub fn bit(id: impl Into<String>) -> Self {
        Self::Bit(id.into())
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Func(_) => write!(f, "Action::Func"),
            Self::Bit(id) => write!(f, "Action::Bit({id})"),
        }
    }
}

/// A stored custom matcher: any async predicate over the message.
///
/// The returned value's truthiness is the match signal: `null`, `false`,
/// `0` and `""` count as no match, everything else (arrays and objects
/// included) counts as a match and becomes the match value.
pub type CustomMatcher = Arc<dyn Fn(Message) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Box an async closure into a [`CustomMatcher`].
pub fn custom_matcher<F, Fut>(f: F) -> CustomMatcher
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |message| Box::pin(f(message)))
}

/// The value a branch's matcher produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchMatch {
    /// A text branch's condition results.
    Conditions {
        /// The condition set's match view.
        matched: ConditionMatch,
        /// The condition set's capture view.
        captured: Captured,
    },
    /// An NLU branch's matching result subsets, per key.
    Nlu(HashMap<String, Vec<NluResult>>),
    /// A custom matcher's returned value.
    Value(Value),
    /// A catch-all branch saw an unhandled message.
    CatchAll,
    /// A server branch's matched payload.
    Data(Value),
}

impl BranchMatch {
    /// Whether this value counts as a match.
    #[must_use]
    pub fn matched(&self) -> bool {
        match self {
            Self::Conditions { matched, .. } => matched.matched(),
            Self::Value(value) => value_truthy(value),
            Self::Nlu(_) | Self::CatchAll | Self::Data(_) => true,
        }
    }
}

fn value_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Criteria a server branch checks against a server message's payload.
///
/// Keys are dot-separated paths into the payload. String values in
/// `/pattern/flags` form match against the found value's string form;
/// everything else compares by JSON equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerCriteria {
    entries: Vec<(String, Value)>,
}

impl ServerCriteria {
    /// Create empty criteria, matching any payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the value at a dot-separated path.
    #[must_use]
    pub fn field(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((path.into(), value.into()));
        self
    }

    /// True when no fields are required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compile pattern-literal values now, so bad patterns fail at
    /// registration rather than at match time.
    pub fn compile(self) -> std::result::Result<ServerMatcher, CompileError> {
        let mut tests = Vec::with_capacity(self.entries.len());
        for (path, value) in self.entries {
            let test = match &value {
                Value::String(s) if crate::condition::expression::is_pattern_literal(s) => {
                    ServerTest::Matches(Expression::from_literal(s)?)
                }
                _ => ServerTest::Equals(value),
            };
            tests.push((path, test));
        }
        Ok(ServerMatcher { tests })
    }
}

/// Compiled server criteria, ready to test payloads.
#[derive(Debug, Clone)]
pub struct ServerMatcher {
    tests: Vec<(String, ServerTest)>,
}

#[derive(Debug, Clone)]
enum ServerTest {
    Equals(Value),
    Matches(Expression),
}

impl ServerMatcher {
    fn test(&self, message: &Message, branch_id: &str) -> Result<Option<BranchMatch>> {
        let data = message.server_data();
        if self.tests.is_empty() {
            return Ok(Some(BranchMatch::Data(data.cloned().unwrap_or(Value::Null))));
        }
        let Some(data) = data else {
            return Err(BanterError::matcher(
                branch_id,
                "server criteria need message data",
            ));
        };
        for (path, test) in &self.tests {
            let passes = match (test, lookup(data, path)) {
                (ServerTest::Equals(expected), Some(found)) => found == expected,
                (ServerTest::Matches(expression), Some(found)) => {
                    let text = match found {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    expression.is_match(&text)
                }
                (_, None) => false,
            };
            if !passes {
                return Ok(None);
            }
        }
        Ok(Some(BranchMatch::Data(data.clone())))
    }
}

/// Walk a dot-separated path through objects and array indexes.
fn lookup<'v>(data: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = data;
    for part in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// How a branch decides whether a message is for it.
#[derive(Clone)]
pub enum BranchMatcher {
    /// Conditions against the message text.
    Text(ConditionSet),
    /// Conditions against the text after the bot-address prefix.
    DirectText(ConditionSet),
    /// An arbitrary async predicate.
    Custom(CustomMatcher),
    /// NLU criteria against the message's attached results.
    Nlu(NluCriteriaSet),
    /// NLU criteria, gated on the bot being addressed.
    DirectNlu(NluCriteriaSet),
    /// Matches the catch-all wrapper around unhandled messages.
    CatchAll,
    /// Criteria against a server message's payload.
    Server(ServerMatcher),
}

impl BranchMatcher {
    /// The matcher kind, for ids and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::DirectText(_) => "direct_text",
            Self::Custom(_) => "custom",
            Self::Nlu(_) => "nlu",
            Self::DirectNlu(_) => "direct_nlu",
            Self::CatchAll => "catch_all",
            Self::Server(_) => "server",
        }
    }
}

impl fmt::Debug for BranchMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BranchMatcher::{}", self.kind())
    }
}

/// One registered match rule plus its callback.
#[derive(Clone)]
pub struct Branch {
    id: String,
    matcher: BranchMatcher,
    action: Action,
    force: bool,
    matched: bool,
    match_value: Option<BranchMatch>,
}

impl Branch {
    /// Create a branch.
    #[must_use]
    pub fn new(id: impl Into<String>, matcher: BranchMatcher, action: Action) -> Self {
        Self {
            id: id.into(),
            matcher,
            action,
            force: false,
            matched: false,
            match_value: None,
        }
    }

    /// Set whether the branch keeps processing after the state has matched.
    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// The branch's id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True when the branch processes even after an earlier match.
    #[must_use]
    pub const fn is_forced(&self) -> bool {
        self.force
    }

    /// True once this branch has matched in the current run.
    #[must_use]
    pub const fn has_matched(&self) -> bool {
        self.matched
    }

    /// The value the matcher last produced.
    #[must_use]
    pub const fn match_value(&self) -> Option<&BranchMatch> {
        self.match_value.as_ref()
    }

    /// Test the message against the matcher, recording the result.
    ///
    /// A branch that already matched and is not forced reports false without
    /// re-invoking its matcher. Matcher errors are logged and count as no
    /// match.
    pub async fn test(&mut self, message: &Message, identity: &Identity) -> bool {
        if self.matched && !self.force {
            return false;
        }
        match self.run_matcher(message, identity).await {
            Ok(value) => {
                self.matched = value.as_ref().is_some_and(BranchMatch::matched);
                self.match_value = value;
            }
            Err(error) => {
                tracing::warn!(branch = %self.id, %error, "matcher failed");
                self.matched = false;
                self.match_value = None;
            }
        }
        self.matched
    }

    /// Test the state's message and, on a match, record it and run the
    /// stage middleware with the branch callback as its terminal action.
    ///
    /// Middleware or callback failures are logged and reported as false;
    /// the rest of the pipeline stays alive.
    pub async fn process(
        &mut self,
        state: &SharedState,
        middleware: &Middleware,
        bits: &Bits,
        identity: &Identity,
    ) -> bool {
        let message = { state.lock().await.message().cloned() };
        let Some(message) = message else {
            return false;
        };
        if !self.test(&message, identity).await {
            return false;
        }
        if let Some(value) = self.match_value.clone() {
            state.lock().await.record_match(self.id.clone(), value);
        }
        tracing::debug!(branch = %self.id, "branch matched");

        let action = self.action.clone();
        let outcome = middleware
            .execute(state, |state| async move {
                match &action {
                    Action::Func(callback) => callback(state).await,
                    Action::Bit(id) => bits.run(id, &state).await,
                }
            })
            .await;
        match outcome {
            Ok(_) => true,
            Err(error) => {
                tracing::warn!(branch = %self.id, %error, "branch processing failed");
                false
            }
        }
    }

    async fn run_matcher(
        &mut self,
        message: &Message,
        identity: &Identity,
    ) -> Result<Option<BranchMatch>> {
        match &mut self.matcher {
            BranchMatcher::Text(conditions) => {
                Ok(exec_conditions(conditions, message.text_content()))
            }
            BranchMatcher::DirectText(conditions) => {
                let stripped = message
                    .text_content()
                    .and_then(|text| identity.strip_prefix(text));
                Ok(exec_conditions(conditions, stripped))
            }
            BranchMatcher::Custom(matcher) => {
                let value = matcher(message.clone())
                    .await
                    .map_err(|error| BanterError::matcher(&self.id, error.to_string()))?;
                Ok(Some(BranchMatch::Value(value)))
            }
            BranchMatcher::Nlu(criteria) => Ok(message
                .nlu()
                .and_then(|results| results.match_criteria(criteria))
                .map(BranchMatch::Nlu)),
            BranchMatcher::DirectNlu(criteria) => {
                let addressed = message
                    .text_content()
                    .is_some_and(|text| identity.strip_prefix(text).is_some());
                if !addressed {
                    return Ok(None);
                }
                Ok(message
                    .nlu()
                    .and_then(|results| results.match_criteria(criteria))
                    .map(BranchMatch::Nlu))
            }
            BranchMatcher::CatchAll => {
                Ok(message.is_catch_all().then_some(BranchMatch::CatchAll))
            }
            BranchMatcher::Server(matcher) => matcher.test(message, &self.id),
        }
    }
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch")
            .field("id", &self.id)
            .field("matcher", &self.matcher)
            .field("force", &self.force)
            .field("matched", &self.matched)
            .finish()
    }
}

fn exec_conditions(conditions: &mut ConditionSet, text: Option<&str>) -> Option<BranchMatch> {
    let text = text?;
    conditions.exec(text);
    Some(BranchMatch::Conditions {
        matched: conditions.match_view(),
        captured: conditions.captured(),
    })
}
