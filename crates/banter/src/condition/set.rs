//! Ordered, keyed collections of compiled expressions.
//!
//! A [`ConditionSet`] accepts raw strings, pre-built patterns, expressions
//! or criteria, compiles each at add time, and keeps the match and capture
//! results of the most recent [`exec`](ConditionSet::exec). Text branches
//! hold one; scripts can use them standalone to pull captures out of text.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CompileError;

use super::expression::{is_pattern_literal, CompileOptions, Criteria, Expression, TextMatch};

/// Characters stripped from the edges of captured text.
const CAPTURE_TRIM: &[char] = &[',', ':', '-', ' '];

/// Input forms accepted by [`ConditionSet::add`].
#[derive(Debug, Clone)]
pub enum Condition {
    /// A raw string: a `/pattern/flags` literal, or plain text treated as
    /// a `contains` criterion.
    Text(String),
    /// A pre-built regular expression.
    Pattern(Regex),
    /// An already-compiled expression.
    Expression(Expression),
    /// Semantic criteria, compiled with the set's options.
    Criteria(Criteria),
}

impl From<&str> for Condition {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Condition {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Regex> for Condition {
    fn from(regex: Regex) -> Self {
        Self::Pattern(regex)
    }
}

impl From<Expression> for Condition {
    fn from(expression: Expression) -> Self {
        Self::Expression(expression)
    }
}

impl From<Criteria> for Condition {
    fn from(criteria: Criteria) -> Self {
        Self::Criteria(criteria)
    }
}

impl Condition {
    fn into_expression(self, options: &CompileOptions) -> Result<Expression, CompileError> {
        match self {
            Self::Text(text) if is_pattern_literal(&text) => Expression::from_literal(&text),
            Self::Text(text) => Expression::compile(&Criteria::new().contains(text), options),
            Self::Pattern(regex) => Ok(Expression::from_regex(regex)),
            Self::Expression(expression) => Ok(expression),
            Self::Criteria(criteria) => Expression::compile(&criteria, options),
        }
    }
}

/// The match view of a whole set, shaped by how many expressions it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionMatch {
    /// A single expression: its match result, if any.
    Match(Option<TextMatch>),
    /// Several expressions: whether every one of them matched.
    Success(bool),
}

impl ConditionMatch {
    /// True when the view counts as a match.
    #[must_use]
    pub const fn matched(&self) -> bool {
        match self {
            Self::Match(result) => result.is_some(),
            Self::Success(success) => *success,
        }
    }
}

/// The capture view of a whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Captured {
    /// A single keyless expression: its cleaned capture, if any.
    Single(Option<String>),
    /// Keyed or multiple expressions: cleaned captures per key.
    Map(HashMap<String, Option<String>>),
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    auto: bool,
    expression: Expression,
}

/// An ordered, keyed set of expressions with the results of the last run.
///
/// Keys are auto-assigned (`"0"`, `"1"`, ...) when not given. Re-running
/// [`exec`](ConditionSet::exec) overwrites results but never the compiled
/// expressions, so executing twice with the same text yields the same
/// matches and captures.
#[derive(Debug, Clone, Default)]
pub struct ConditionSet {
    options: CompileOptions,
    entries: Vec<Entry>,
    matches: HashMap<String, Option<TextMatch>>,
    captures: HashMap<String, Option<String>>,
    executed: bool,
    next_key: usize,
}

impl ConditionSet {
    /// Create an empty set with default compile options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty set with the given compile options.
    #[must_use]
    pub fn with_options(options: CompileOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Create a set holding a single keyless condition.
    pub fn from_condition(condition: impl Into<Condition>) -> Result<Self, CompileError> {
        let mut set = Self::new();
        set.add(condition, None)?;
        Ok(set)
    }

    /// Add a condition, compiling it now. Returns the assigned key.
    ///
    /// A duplicate key replaces the earlier expression in place.
    pub fn add(
        &mut self,
        condition: impl Into<Condition>,
        key: Option<&str>,
    ) -> Result<String, CompileError> {
        let expression = condition.into().into_expression(&self.options)?;
        let (key, auto) = match key {
            Some(key) => (key.to_string(), false),
            None => {
                let key = self.next_key.to_string();
                self.next_key += 1;
                (key, true)
            }
        };
        let entry = Entry {
            key: key.clone(),
            auto,
            expression,
        };
        match self.entries.iter_mut().find(|existing| existing.key == key) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        Ok(key)
    }

    /// Run every expression against the text, storing matches and captures.
    pub fn exec(&mut self, text: &str) {
        for entry in &self.entries {
            let result = entry.expression.exec(text);
            let capture = result
                .as_ref()
                .and_then(TextMatch::first_capture)
                .map(|capture| capture.trim_matches(CAPTURE_TRIM).to_string());
            self.matches.insert(entry.key.clone(), result);
            self.captures.insert(entry.key.clone(), capture);
        }
        self.executed = true;
    }

    /// True when the set has been executed and every key matched.
    #[must_use]
    pub fn success(&self) -> bool {
        self.executed
            && self
                .entries
                .iter()
                .all(|entry| matches!(self.matches.get(&entry.key), Some(Some(_))))
    }

    /// The set's match view: a single expression's result, or the overall
    /// success flag when the set holds several.
    #[must_use]
    pub fn match_view(&self) -> ConditionMatch {
        if let [entry] = self.entries.as_slice() {
            ConditionMatch::Match(self.matches.get(&entry.key).cloned().flatten())
        } else {
            ConditionMatch::Success(self.success())
        }
    }

    /// The set's capture view: the lone capture for a single keyless
    /// expression, otherwise the full per-key capture map.
    #[must_use]
    pub fn captured(&self) -> Captured {
        match self.entries.as_slice() {
            [entry] if entry.auto => {
                Captured::Single(self.captures.get(&entry.key).cloned().flatten())
            }
            _ => Captured::Map(self.captures.clone()),
        }
    }

    /// The stored match for a key, if the key matched on the last run.
    #[must_use]
    pub fn match_for(&self, key: &str) -> Option<&TextMatch> {
        self.matches.get(key).and_then(Option::as_ref)
    }

    /// The cleaned capture for a key, if one was taken on the last run.
    #[must_use]
    pub fn capture_for(&self, key: &str) -> Option<&str> {
        self.captures
            .get(key)
            .and_then(Option::as_deref)
    }

    /// Number of expressions in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the set holds no expressions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop results from the last run, keeping the compiled expressions.
    pub fn clear(&mut self) {
        self.matches.clear();
        self.captures.clear();
        self.executed = false;
    }

    /// Drop results and expressions both.
    pub fn clear_all(&mut self) {
        self.clear();
        self.entries.clear();
        self.next_key = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_assigns_numeric_keys() {
        let mut set = ConditionSet::new();
        assert_eq!(set.add("hello", None).unwrap(), "0");
        assert_eq!(set.add("goodbye", None).unwrap(), "1");
        assert_eq!(set.add(Criteria::new().is("hi"), Some("greet")).unwrap(), "greet");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn duplicate_key_replaces() {
        let mut set = ConditionSet::new();
        set.add(Criteria::new().is("old"), Some("k")).unwrap();
        set.add(Criteria::new().is("new"), Some("k")).unwrap();
        assert_eq!(set.len(), 1);

        set.exec("new");
        assert!(set.success());
    }

    #[test]
    fn raw_string_is_contains() {
        let mut set = ConditionSet::new();
        set.add("pizza", None).unwrap();
        set.exec("order a pizza now");
        assert!(set.success());

        set.exec("order a salad");
        assert!(!set.success());
    }

    #[test]
    fn raw_string_literal_form_is_pattern() {
        let mut set = ConditionSet::new();
        set.add("/^ping$/i", None).unwrap();
        set.exec("PING");
        assert!(set.success());
    }

    #[test]
    fn invalid_literal_fails_at_add_time() {
        let mut set = ConditionSet::new();
        assert!(set.add("/ping/z", None).is_err());
    }

    #[test]
    fn exec_is_idempotent() {
        let mut set = ConditionSet::new();
        set.add(Criteria::new().after("my name is"), None).unwrap();
        set.exec("my name is roboto");
        let first_match = set.match_for("0").cloned();
        let first_capture = set.capture_for("0").map(str::to_string);

        set.exec("my name is roboto");
        assert_eq!(set.match_for("0").cloned(), first_match);
        assert_eq!(set.capture_for("0").map(str::to_string), first_capture);
    }

    #[test]
    fn captures_are_cleaned() {
        let mut set = ConditionSet::new();
        set.add(Criteria::new().after("call me"), None).unwrap();
        set.exec("call me -maybe- ");
        assert_eq!(set.capture_for("0"), Some("maybe"));
    }

    #[test]
    fn door_number_scenario() {
        let mut set = ConditionSet::new();
        set.add(
            Criteria::new().after("door number").range("1-3"),
            Some("door"),
        )
        .unwrap();
        set.exec("Door number 3");

        assert!(set.success());
        assert_eq!(set.capture_for("door"), Some("3"));
        match set.captured() {
            Captured::Map(map) => assert_eq!(map["door"], Some("3".to_string())),
            Captured::Single(_) => panic!("keyed capture should be a map"),
        }
    }

    #[test]
    fn single_keyless_capture_is_single() {
        let mut set = ConditionSet::new();
        set.add(Criteria::new().after("my name is"), None).unwrap();
        set.exec("my name is roboto");
        assert_eq!(set.captured(), Captured::Single(Some("roboto".to_string())));
    }

    #[test]
    fn match_view_for_single_and_many() {
        let mut one = ConditionSet::new();
        one.add("/foo/", None).unwrap();
        one.exec("foo");
        match one.match_view() {
            ConditionMatch::Match(Some(m)) => assert_eq!(m.matched, "foo"),
            other => panic!("expected a match, got {other:?}"),
        }

        let mut many = ConditionSet::new();
        many.add("foo", None).unwrap();
        many.add("bar", None).unwrap();
        many.exec("foo and bar");
        assert_eq!(many.match_view(), ConditionMatch::Success(true));

        many.exec("foo only");
        assert_eq!(many.match_view(), ConditionMatch::Success(false));
    }

    #[test]
    fn unexecuted_set_reports_no_success() {
        let mut set = ConditionSet::new();
        set.add("foo", None).unwrap();
        assert!(!set.success());
        assert_eq!(set.match_view(), ConditionMatch::Match(None));
    }

    #[test]
    fn clear_keeps_expressions() {
        let mut set = ConditionSet::new();
        set.add("foo", None).unwrap();
        set.exec("foo");
        assert!(set.success());

        set.clear();
        assert!(!set.success());
        assert_eq!(set.len(), 1);

        set.clear_all();
        assert!(set.is_empty());
    }
}
