//! Paths collect branches and hand the right ones to each thought stage.
//!
//! A path is just a registry: branches land in the partition for the stage
//! that will run them (listen, understand, serve or act), with ids issued
//! from one shared counter so registration order stays visible in logs.
//! Bad conditions and bad server patterns fail here, at registration,
//! rather than at match time.

use std::future::Future;

use serde_json::Value;

use crate::branch::{custom_matcher, Action, Branch, BranchMatcher, ServerCriteria};
use crate::condition::{Condition, ConditionSet};
use crate::error::{CompileError, Result};
use crate::message::Message;
use crate::nlu::NluCriteriaSet;
use crate::thought::Stage;

/// Per-branch registration options.
#[derive(Debug, Clone, Default)]
pub struct BranchOptions {
    key: Option<String>,
    force: bool,
}

impl BranchOptions {
    /// Default options: generated id, not forced.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-chosen id instead of a generated one. Registering a
    /// second branch under the same key replaces the first.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Keep processing this branch even after the state has matched.
    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// A registry of branches, partitioned by the stage that runs them.
#[derive(Debug, Clone, Default)]
pub struct Path {
    listen: Vec<Branch>,
    understand: Vec<Branch>,
    serve: Vec<Branch>,
    act: Vec<Branch>,
    counter: usize,
}

impl Path {
    /// Create an empty path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a text branch against a condition in any accepted form.
    pub fn text(
        &mut self,
        condition: impl Into<Condition>,
        action: Action,
        options: BranchOptions,
    ) -> std::result::Result<String, CompileError> {
        let conditions = ConditionSet::from_condition(condition)?;
        Ok(self.text_set(conditions, action, options))
    }

    /// Register a text branch against a prebuilt condition set.
    pub fn text_set(
        &mut self,
        conditions: ConditionSet,
        action: Action,
        options: BranchOptions,
    ) -> String {
        insert(
            &mut self.listen,
            &mut self.counter,
            Stage::Listen.key(),
            BranchMatcher::Text(conditions),
            action,
            options,
        )
    }

    /// Register a text branch that only fires when the bot is addressed.
    pub fn direct(
        &mut self,
        condition: impl Into<Condition>,
        action: Action,
        options: BranchOptions,
    ) -> std::result::Result<String, CompileError> {
        let conditions = ConditionSet::from_condition(condition)?;
        Ok(self.direct_set(conditions, action, options))
    }

    /// Register a direct branch against a prebuilt condition set.
    pub fn direct_set(
        &mut self,
        conditions: ConditionSet,
        action: Action,
        options: BranchOptions,
    ) -> String {
        insert(
            &mut self.listen,
            &mut self.counter,
            Stage::Listen.key(),
            BranchMatcher::DirectText(conditions),
            action,
            options,
        )
    }

    /// Register a branch with an arbitrary async matcher.
    pub fn custom<F, Fut>(&mut self, matcher: F, action: Action, options: BranchOptions) -> String
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        insert(
            &mut self.listen,
            &mut self.counter,
            Stage::Listen.key(),
            BranchMatcher::Custom(custom_matcher(matcher)),
            action,
            options,
        )
    }

    /// Register an NLU branch against criteria for attached results.
    pub fn nlu(
        &mut self,
        criteria: NluCriteriaSet,
        action: Action,
        options: BranchOptions,
    ) -> String {
        insert(
            &mut self.understand,
            &mut self.counter,
            Stage::Understand.key(),
            BranchMatcher::Nlu(criteria),
            action,
            options,
        )
    }

    /// Register an NLU branch that only fires when the bot is addressed.
    pub fn direct_nlu(
        &mut self,
        criteria: NluCriteriaSet,
        action: Action,
        options: BranchOptions,
    ) -> String {
        insert(
            &mut self.understand,
            &mut self.counter,
            Stage::Understand.key(),
            BranchMatcher::DirectNlu(criteria),
            action,
            options,
        )
    }

    /// Register a custom matcher that runs in the understand stage, after
    /// NLU results are attached.
    pub fn custom_nlu<F, Fut>(
        &mut self,
        matcher: F,
        action: Action,
        options: BranchOptions,
    ) -> String
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        insert(
            &mut self.understand,
            &mut self.counter,
            Stage::Understand.key(),
            BranchMatcher::Custom(custom_matcher(matcher)),
            action,
            options,
        )
    }

    /// Register a branch against server message payloads.
    pub fn server(
        &mut self,
        criteria: ServerCriteria,
        action: Action,
        options: BranchOptions,
    ) -> std::result::Result<String, CompileError> {
        let matcher = criteria.compile()?;
        Ok(insert(
            &mut self.serve,
            &mut self.counter,
            Stage::Serve.key(),
            BranchMatcher::Server(matcher),
            action,
            options,
        ))
    }

    /// Register a branch for messages nothing else handled.
    pub fn catch_all(&mut self, action: Action, options: BranchOptions) -> String {
        insert(
            &mut self.act,
            &mut self.counter,
            Stage::Act.key(),
            BranchMatcher::CatchAll,
            action,
            options,
        )
    }

    /// Register a branch for users entering a room.
    pub fn enter(&mut self, action: Action, options: BranchOptions) -> String {
        self.kind_branch("enter", action, options)
    }

    /// Register a branch for users leaving a room.
    pub fn leave(&mut self, action: Action, options: BranchOptions) -> String {
        self.kind_branch("leave", action, options)
    }

    /// Register a branch for topic changes.
    pub fn topic(&mut self, action: Action, options: BranchOptions) -> String {
        self.kind_branch("topic", action, options)
    }

    fn kind_branch(&mut self, kind: &'static str, action: Action, options: BranchOptions) -> String {
        let matcher = custom_matcher(move |message| async move {
            Ok(Value::Bool(message.kind() == kind))
        });
        insert(
            &mut self.listen,
            &mut self.counter,
            Stage::Listen.key(),
            BranchMatcher::Custom(matcher),
            action,
            options,
        )
    }

    /// A working copy of the branches a stage should process.
    #[must_use]
    pub fn branches(&self, stage: Stage) -> Vec<Branch> {
        match stage {
            Stage::Listen => self.listen.clone(),
            Stage::Understand => self.understand.clone(),
            Stage::Serve => self.serve.clone(),
            Stage::Act => self.act.clone(),
            Stage::Hear | Stage::Respond | Stage::Remember => Vec::new(),
        }
    }

    /// Whether a stage's partition holds any forced branches.
    #[must_use]
    pub fn has_forced(&self, stage: Stage) -> bool {
        let partition = match stage {
            Stage::Listen => &self.listen,
            Stage::Understand => &self.understand,
            Stage::Serve => &self.serve,
            Stage::Act => &self.act,
            Stage::Hear | Stage::Respond | Stage::Remember => return false,
        };
        partition.iter().any(Branch::is_forced)
    }

    /// Total number of registered branches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listen.len() + self.understand.len() + self.serve.len() + self.act.len()
    }

    /// True when nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn insert(
    collection: &mut Vec<Branch>,
    counter: &mut usize,
    prefix: &str,
    matcher: BranchMatcher,
    action: Action,
    options: BranchOptions,
) -> String {
    let id = options.key.unwrap_or_else(|| {
        let id = format!("{prefix}_{counter}");
        *counter += 1;
        id
    });
    let branch = Branch::new(&id, matcher, action).force(options.force);
    if let Some(existing) = collection.iter_mut().find(|b| b.id() == id) {
        *existing = branch;
    } else {
        collection.push(branch);
    }
    id
}
