//! Natural-language result matching.
//!
//! The engine never produces NLU data. An [`NluAdapter`](crate::adapter::NluAdapter)
//! attaches a keyed map of result sets to a message (`intent`, `entities`,
//! `sentiment`, ...) and branches query it with [`NluCriteriaSet`]s. The
//! matching vocabulary is small: field equality on `id`/`name`, score
//! comparisons, and `max`/`min` over the sorted set.
//!
//! `None`, not an empty collection, is the no-match sentinel everywhere here;
//! the branch layer relies on that distinction.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One result item from a natural-language provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NluResult {
    /// Provider-assigned id (e.g. an intent id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Human-readable name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Confidence score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl NluResult {
    /// Create an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the id.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the score.
    #[must_use]
    pub const fn score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// True when this item satisfies the id/name fields of a criterion.
    ///
    /// Unset criterion fields match anything; set fields require equality.
    fn satisfies_fields(&self, criterion: &NluCriterion) -> bool {
        if let Some(id) = &criterion.id {
            if self.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if let Some(name) = &criterion.name {
            if self.name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Comparison applied by a criterion to a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NluOperator {
    /// Any item whose id/name (or score, when neither is given) equals the
    /// criterion.
    In,
    /// Exactly one item exists and it matches.
    Is,
    /// Only the highest-scored item, which must also satisfy id/name.
    Max,
    /// Only the lowest-scored item, which must also satisfy id/name.
    Min,
    /// Score equality (exact, like the source comparison it replaces).
    Eq,
    /// Score greater than or equal.
    Gte,
    /// Score strictly greater.
    Gt,
    /// Score less than or equal.
    Lte,
    /// Score strictly less.
    Lt,
}

/// A query against one keyed result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NluCriterion {
    /// Required id, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Required name, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Score operand for comparison operators.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Explicit operator; when unset, `gte` if a score is given, else `in`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<NluOperator>,
}

impl NluCriterion {
    /// Create an empty criterion.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require an id.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Require a name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the score operand.
    #[must_use]
    pub const fn score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Set the operator.
    #[must_use]
    pub const fn operator(mut self, operator: NluOperator) -> Self {
        self.operator = Some(operator);
        self
    }

    /// The operator in effect after defaulting.
    #[must_use]
    pub fn effective_operator(&self) -> NluOperator {
        self.operator.unwrap_or(if self.score.is_some() {
            NluOperator::Gte
        } else {
            NluOperator::In
        })
    }
}

/// An ordered list of results for one key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NluResultSet(Vec<NluResult>);

impl NluResultSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a result.
    #[must_use]
    pub fn add(mut self, result: NluResult) -> Self {
        self.0.push(result);
        self
    }

    /// Number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the set has no results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the results in order.
    pub fn iter(&self) -> std::slice::Iter<'_, NluResult> {
        self.0.iter()
    }

    /// Sort descending by score, unscored items first, stable among equals.
    pub fn sort_by_score(&mut self) {
        self.0.sort_by(|a, b| match (a.score, b.score) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        });
    }

    /// Match this set against a criterion.
    ///
    /// Returns the matching subset, or `None` when nothing matched.
    #[must_use]
    pub fn match_criterion(&self, criterion: &NluCriterion) -> Option<Vec<NluResult>> {
        let matched: Vec<NluResult> = match criterion.effective_operator() {
            NluOperator::In => self
                .0
                .iter()
                .filter(|item| {
                    if criterion.id.is_none() && criterion.name.is_none() {
                        item.score == criterion.score
                    } else {
                        item.satisfies_fields(criterion)
                    }
                })
                .cloned()
                .collect(),
            NluOperator::Is => {
                if self.0.len() == 1 && self.0[0].satisfies_fields(criterion) {
                    vec![self.0[0].clone()]
                } else {
                    Vec::new()
                }
            }
            NluOperator::Max => self.extremum(criterion, true),
            NluOperator::Min => self.extremum(criterion, false),
            NluOperator::Eq => self.compare_scores(criterion, |item, wanted| item == wanted),
            NluOperator::Gte => self.compare_scores(criterion, |item, wanted| item >= wanted),
            NluOperator::Gt => self.compare_scores(criterion, |item, wanted| item > wanted),
            NluOperator::Lte => self.compare_scores(criterion, |item, wanted| item <= wanted),
            NluOperator::Lt => self.compare_scores(criterion, |item, wanted| item < wanted),
        };

        if matched.is_empty() { None } else { Some(matched) }
    }

    /// The globally highest- or lowest-scored item, if it satisfies the
    /// criterion's fields.
    fn extremum(&self, criterion: &NluCriterion, highest: bool) -> Vec<NluResult> {
        let mut sorted = self.clone();
        sorted.sort_by_score();
        let candidate = if highest {
            sorted.0.iter().find(|r| r.score.is_some())
        } else {
            sorted.0.iter().rev().find(|r| r.score.is_some())
        };
        candidate
            .filter(|item| item.satisfies_fields(criterion))
            .map(|item| vec![item.clone()])
            .unwrap_or_default()
    }

    /// Items satisfying the criterion fields whose score passes `cmp`.
    ///
    /// Unscored items never satisfy a comparison, and a comparison without a
    /// score operand matches nothing.
    fn compare_scores(
        &self,
        criterion: &NluCriterion,
        cmp: impl Fn(f64, f64) -> bool,
    ) -> Vec<NluResult> {
        let Some(wanted) = criterion.score else {
            return Vec::new();
        };
        self.0
            .iter()
            .filter(|item| item.satisfies_fields(criterion))
            .filter(|item| item.score.is_some_and(|s| cmp(s, wanted)))
            .cloned()
            .collect()
    }
}

impl FromIterator<NluResult> for NluResultSet {
    fn from_iter<T: IntoIterator<Item = NluResult>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for NluResultSet {
    type Item = NluResult;
    type IntoIter = std::vec::IntoIter<NluResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Everything a provider said about one message, keyed by attribute.
///
/// Conventional keys are `intent`, `entities`, `sentiment`, `tone`,
/// `phrases`, `act` and `language`, but keys are free-form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NluResults(HashMap<String, NluResultSet>);

impl NluResults {
    /// Create an empty result map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result set under a key.
    #[must_use]
    pub fn insert(mut self, key: impl Into<String>, set: NluResultSet) -> Self {
        self.0.insert(key.into(), set);
        self
    }

    /// Get the result set for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&NluResultSet> {
        self.0.get(key)
    }

    /// True when no keys are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Match every criterion in the set against its keyed results.
    ///
    /// All keys must match; the result maps each key to its matching subset.
    /// A criterion keyed to an absent result set fails the whole match.
    #[must_use]
    pub fn match_criteria(
        &self,
        criteria: &NluCriteriaSet,
    ) -> Option<HashMap<String, Vec<NluResult>>> {
        let mut matched = HashMap::new();
        for (key, criterion) in &criteria.0 {
            let subset = self.get(key)?.match_criterion(criterion)?;
            matched.insert(key.clone(), subset);
        }
        Some(matched)
    }
}

impl FromIterator<(String, NluResultSet)> for NluResults {
    fn from_iter<T: IntoIterator<Item = (String, NluResultSet)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Per-key criteria a branch matches against attached results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NluCriteriaSet(HashMap<String, NluCriterion>);

impl NluCriteriaSet {
    /// Create an empty criteria set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion for a key.
    #[must_use]
    pub fn add(mut self, key: impl Into<String>, criterion: NluCriterion) -> Self {
        self.0.insert(key.into(), criterion);
        self
    }

    /// Shorthand for an intent criterion.
    #[must_use]
    pub fn intent(criterion: NluCriterion) -> Self {
        Self::new().add("intent", criterion)
    }

    /// True when no criteria are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[(&str, Option<f64>)]) -> NluResultSet {
        items
            .iter()
            .map(|(id, score)| {
                let mut r = NluResult::new().id(*id);
                if let Some(s) = score {
                    r = r.score(*s);
                }
                r
            })
            .collect()
    }

    #[test]
    fn sort_unscored_first_then_descending() {
        let mut results = set(&[("a", Some(0.2)), ("b", None), ("c", Some(0.9)), ("d", None)]);
        results.sort_by_score();
        let ids: Vec<_> = results.iter().map(|r| r.id.clone().unwrap()).collect();
        assert_eq!(ids, ["b", "d", "c", "a"]);
    }

    #[test]
    fn in_matches_by_id() {
        let results = set(&[("foo", Some(0.1)), ("bar", Some(0.2))]);
        let criterion = NluCriterion::new().id("bar").operator(NluOperator::In);
        let matched = results.match_criterion(&criterion).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id.as_deref(), Some("bar"));
    }

    #[test]
    fn in_without_fields_compares_score() {
        let results = set(&[("foo", Some(0.5)), ("bar", Some(0.2))]);
        let criterion = NluCriterion::new().score(0.2).operator(NluOperator::In);
        let matched = results.match_criterion(&criterion).unwrap();
        assert_eq!(matched[0].id.as_deref(), Some("bar"));
    }

    #[test]
    fn is_requires_a_single_item() {
        let one = set(&[("foo", Some(0.5))]);
        let criterion = NluCriterion::new().id("foo").operator(NluOperator::Is);
        assert!(one.match_criterion(&criterion).is_some());

        let two = set(&[("foo", Some(0.5)), ("foo", Some(0.6))]);
        assert!(two.match_criterion(&criterion).is_none());
    }

    #[test]
    fn max_returns_highest_scored_item_satisfying_fields() {
        let results = set(&[("foo", Some(0.1)), ("bar", Some(0.2)), ("foo", Some(0.3))]);

        let max_foo = NluCriterion::new().id("foo").operator(NluOperator::Max);
        let matched = results.match_criterion(&max_foo).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id.as_deref(), Some("foo"));
        assert_eq!(matched[0].score, Some(0.3));

        let max_bar = NluCriterion::new().id("bar").operator(NluOperator::Max);
        assert!(results.match_criterion(&max_bar).is_none());
    }

    #[test]
    fn min_returns_lowest_scored_item() {
        let results = set(&[("foo", Some(0.1)), ("bar", Some(0.2))]);
        let criterion = NluCriterion::new().id("foo").operator(NluOperator::Min);
        let matched = results.match_criterion(&criterion).unwrap();
        assert_eq!(matched[0].score, Some(0.1));
    }

    #[test]
    fn comparisons_skip_unscored_items() {
        let results = set(&[("foo", None), ("foo", Some(0.8))]);
        let criterion = NluCriterion::new().id("foo").score(0.5);
        // gte is the default when a score is given
        assert_eq!(criterion.effective_operator(), NluOperator::Gte);
        let matched = results.match_criterion(&criterion).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].score, Some(0.8));
    }

    #[test]
    fn comparison_filters_by_fields_first() {
        let results = set(&[("foo", Some(0.9)), ("bar", Some(0.9))]);
        let criterion = NluCriterion::new()
            .id("bar")
            .score(0.9)
            .operator(NluOperator::Eq);
        let matched = results.match_criterion(&criterion).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id.as_deref(), Some("bar"));
    }

    #[test]
    fn default_operator_is_in_without_score() {
        let criterion = NluCriterion::new().id("foo");
        assert_eq!(criterion.effective_operator(), NluOperator::In);
    }

    #[test]
    fn criteria_set_requires_every_key() {
        let results = NluResults::new()
            .insert("intent", set(&[("greet", Some(0.9))]))
            .insert("sentiment", set(&[("positive", Some(0.7))]));

        let both = NluCriteriaSet::new()
            .add("intent", NluCriterion::new().id("greet"))
            .add("sentiment", NluCriterion::new().id("positive"));
        let matched = results.match_criteria(&both).unwrap();
        assert_eq!(matched.len(), 2);

        let missing_key = NluCriteriaSet::new().add("tone", NluCriterion::new().id("calm"));
        assert!(results.match_criteria(&missing_key).is_none());

        let failing = NluCriteriaSet::new()
            .add("intent", NluCriterion::new().id("greet"))
            .add("sentiment", NluCriterion::new().id("negative"));
        assert!(results.match_criteria(&failing).is_none());
    }

    #[test]
    fn no_match_is_none_never_empty() {
        let results = set(&[("foo", Some(0.1))]);
        let criterion = NluCriterion::new().id("nope");
        assert!(results.match_criterion(&criterion).is_none());
    }
}
