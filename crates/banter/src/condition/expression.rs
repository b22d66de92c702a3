//! Compiling semantic criteria into regular expressions.
//!
//! A [`Criteria`] value pairs operators (`is`, `starts`, `contains`, ...)
//! with literal values. [`Expression::compile`] turns it into one merged,
//! case-insensitive-by-default pattern, keeping exactly one meaningful
//! capture group so callers can pull the interesting text back out.
//!
//! `excludes` is the odd one out: the regex engine has no lookaround, so
//! exclusions compile into separate negative patterns carried alongside the
//! positive one. A text matches the expression when the positive pattern
//! matches and no negative pattern does.

use std::ops::Range;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CompileError;

use super::range::range_pattern;

/// Characters made optional by [`CompileOptions::ignore_punctuation`].
const PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '\'', '"', '-'];

/// A condition operator, pairing with one or more values in a [`Criteria`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Match the whole text exactly.
    Is,
    /// Match at the start of the text.
    Starts,
    /// Match at the end of the text.
    Ends,
    /// Match anywhere in the text.
    Contains,
    /// Reject the text when the value appears anywhere in it.
    Excludes,
    /// Capture the words following the value.
    After,
    /// Capture the words preceding the value.
    Before,
    /// Match a number in an inclusive `N-M` range.
    Range,
}

impl Operator {
    /// The operator's key as written in scripts, for error messages.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::Starts => "starts",
            Self::Ends => "ends",
            Self::Contains => "contains",
            Self::Excludes => "excludes",
            Self::After => "after",
            Self::Before => "before",
            Self::Range => "range",
        }
    }

    /// Parse an operator from its script key.
    pub fn from_key(key: &str) -> Result<Self, CompileError> {
        match key {
            "is" => Ok(Self::Is),
            "starts" => Ok(Self::Starts),
            "ends" => Ok(Self::Ends),
            "contains" => Ok(Self::Contains),
            "excludes" => Ok(Self::Excludes),
            "after" => Ok(Self::After),
            "before" => Ok(Self::Before),
            "range" => Ok(Self::Range),
            _ => Err(CompileError::unknown_operator(key)),
        }
    }
}

/// An ordered operator→values map, built up through the builder methods.
///
/// Repeated calls to the same operator extend its value list, which compiles
/// to an alternation. Operators keep the order of their first use; that
/// order decides how sub-patterns merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    entries: Vec<(Operator, Vec<String>)>,
}

impl Criteria {
    /// Create an empty criteria map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the text to equal the value.
    #[must_use]
    pub fn is(self, value: impl Into<String>) -> Self {
        self.push(Operator::Is, value)
    }

    /// Require the text to start with the value.
    #[must_use]
    pub fn starts(self, value: impl Into<String>) -> Self {
        self.push(Operator::Starts, value)
    }

    /// Require the text to end with the value.
    #[must_use]
    pub fn ends(self, value: impl Into<String>) -> Self {
        self.push(Operator::Ends, value)
    }

    /// Require the text to contain the value.
    #[must_use]
    pub fn contains(self, value: impl Into<String>) -> Self {
        self.push(Operator::Contains, value)
    }

    /// Reject texts containing the value.
    #[must_use]
    pub fn excludes(self, value: impl Into<String>) -> Self {
        self.push(Operator::Excludes, value)
    }

    /// Capture the words following the value.
    #[must_use]
    pub fn after(self, value: impl Into<String>) -> Self {
        self.push(Operator::After, value)
    }

    /// Capture the words preceding the value.
    #[must_use]
    pub fn before(self, value: impl Into<String>) -> Self {
        self.push(Operator::Before, value)
    }

    /// Match a number inside an inclusive range given as `"N-M"`.
    #[must_use]
    pub fn range(self, value: impl Into<String>) -> Self {
        self.push(Operator::Range, value)
    }

    /// Add a value under an operator given by its script key.
    ///
    /// Map-shaped conditions come through here; an unknown key fails at
    /// registration rather than at match time.
    pub fn insert(self, key: &str, value: impl Into<String>) -> Result<Self, CompileError> {
        Ok(self.push(Operator::from_key(key)?, value))
    }

    /// True when no operator has been given a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(mut self, operator: Operator, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(op, _)| *op == operator) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((operator, vec![value])),
        }
        self
    }
}

/// Options controlling how criteria compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Wrap values in word boundaries so `door` does not match `doors`.
    pub match_word: bool,

    /// Compile the final pattern case-insensitively.
    pub ignore_case: bool,

    /// Make punctuation inside values optional, so `it's` matches `its`.
    pub ignore_punctuation: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            match_word: true,
            ignore_case: true,
            ignore_punctuation: false,
        }
    }
}

impl CompileOptions {
    /// Create the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether values are wrapped in word boundaries.
    #[must_use]
    pub const fn match_word(mut self, on: bool) -> Self {
        self.match_word = on;
        self
    }

    /// Set whether the pattern is case-insensitive.
    #[must_use]
    pub const fn ignore_case(mut self, on: bool) -> Self {
        self.ignore_case = on;
        self
    }

    /// Set whether punctuation inside values is optional.
    #[must_use]
    pub const fn ignore_punctuation(mut self, on: bool) -> Self {
        self.ignore_punctuation = on;
        self
    }
}

/// The result of executing an expression against a text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMatch {
    /// The full matched text.
    pub matched: String,

    /// Byte offset of the match within the input.
    pub start: usize,

    /// Capture groups in order; `None` for groups that did not participate.
    pub captures: Vec<Option<String>>,
}

impl TextMatch {
    /// The first capture group that matched non-empty text.
    #[must_use]
    pub fn first_capture(&self) -> Option<&str> {
        self.captures
            .iter()
            .flatten()
            .map(String::as_str)
            .find(|capture| !capture.is_empty())
    }

    fn from_captures(caps: &regex::Captures<'_>) -> Self {
        let overall = caps.get(0);
        Self {
            matched: overall.map(|m| m.as_str().to_string()).unwrap_or_default(),
            start: overall.map_or(0, |m| m.start()),
            captures: caps
                .iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect(),
        }
    }
}

/// A compiled expression: one positive pattern and zero or more negatives.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    positive: Option<Regex>,
    negatives: Vec<Regex>,
}

impl Expression {
    /// Compile criteria into an expression.
    ///
    /// Sub-patterns are built per operator in first-use order, then merged:
    /// a trailing capture group duplicated at the next sub-pattern's head is
    /// elided (so `after X` and `before Y` compose into a single capture),
    /// every capture group except the last sub-pattern's is converted to
    /// non-capturing, and the survivors are joined with `\s?`.
    pub fn compile(criteria: &Criteria, options: &CompileOptions) -> Result<Self, CompileError> {
        let mut positives = Vec::new();
        let mut negatives = Vec::new();

        for (operator, values) in &criteria.entries {
            if values.is_empty() {
                return Err(CompileError::empty_value(operator.key()));
            }
            let joined = if *operator == Operator::Range {
                let mut parts = Vec::with_capacity(values.len());
                for value in values {
                    parts.push(range_pattern(value)?);
                }
                word_bound(parts.join("|"), options.match_word)
            } else {
                alternates(values, options)?
            };
            let sub = match operator {
                Operator::Is => format!("^({joined})$"),
                Operator::Starts => format!("^({joined})"),
                Operator::Ends => format!("({joined})$"),
                Operator::Contains | Operator::Excludes | Operator::Range => {
                    format!("({joined})")
                }
                Operator::After => format!(r"(?:{joined}\s?)([\w\-\s]+)"),
                Operator::Before => format!(r"([\w\-\s]+)(?:\s?{joined})"),
            };
            if *operator == Operator::Excludes {
                negatives.push(sub);
            } else {
                positives.push(sub);
            }
        }

        let prefix = if options.ignore_case { "(?i)" } else { "" };
        let positive = if positives.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("{prefix}{}", merge_patterns(positives)))?)
        };
        let negatives = negatives
            .into_iter()
            .map(|sub| Regex::new(&format!("{prefix}{sub}")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: positive.as_ref().map(|re| re.as_str().to_string()).unwrap_or_default(),
            positive,
            negatives,
        })
    }

    /// Parse a `/pattern/flags` string literal.
    ///
    /// Supported flags are `i`, `m`, `s` and `x`, mapped to the engine's
    /// inline flags. Anything else fails with [`CompileError::Conversion`].
    pub fn from_literal(input: &str) -> Result<Self, CompileError> {
        let Some((body, flags)) = split_literal(input) else {
            return Err(CompileError::conversion(input, "expected /pattern/flags form"));
        };
        for flag in flags.chars() {
            if !matches!(flag, 'i' | 'm' | 's' | 'x') {
                return Err(CompileError::conversion(
                    input,
                    format!("unsupported flag '{flag}'"),
                ));
            }
        }
        let source = if flags.is_empty() {
            body.to_string()
        } else {
            format!("(?{flags}){body}")
        };
        let regex = Regex::new(&source)?;
        Ok(Self {
            source,
            positive: Some(regex),
            negatives: Vec::new(),
        })
    }

    /// Wrap an already-built regex.
    #[must_use]
    pub fn from_regex(regex: Regex) -> Self {
        Self {
            source: regex.as_str().to_string(),
            positive: Some(regex),
            negatives: Vec::new(),
        }
    }

    /// The merged positive pattern source. Empty for excludes-only criteria.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.source
    }

    /// Test the text without recording captures.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        if self.negatives.iter().any(|negative| negative.is_match(text)) {
            return false;
        }
        self.positive.as_ref().is_none_or(|positive| positive.is_match(text))
    }

    /// Execute against a text, returning the match and its captures.
    ///
    /// Excludes-only expressions have no positive pattern; when no negative
    /// pattern rejects the text the whole input counts as the match.
    #[must_use]
    pub fn exec(&self, text: &str) -> Option<TextMatch> {
        if self.negatives.iter().any(|negative| negative.is_match(text)) {
            return None;
        }
        match &self.positive {
            Some(positive) => positive.captures(text).map(|caps| TextMatch::from_captures(&caps)),
            None => Some(TextMatch {
                matched: text.to_string(),
                start: 0,
                captures: Vec::new(),
            }),
        }
    }
}

/// Escape a literal so every character matches itself.
#[must_use]
pub fn escape(text: &str) -> String {
    regex::escape(text)
}

/// Escape or inline each value and join with `|`, applying word boundaries.
fn alternates(values: &[String], options: &CompileOptions) -> Result<String, CompileError> {
    let mut parts = Vec::with_capacity(values.len());
    for value in values {
        parts.push(value_pattern(value, options)?);
    }
    Ok(word_bound(parts.join("|"), options.match_word))
}

fn word_bound(joined: String, match_word: bool) -> String {
    if match_word {
        format!(r"\b(?:{joined})\b")
    } else {
        joined
    }
}

/// A single value's pattern: escaped text, or the inlined body of a
/// `/pattern/flags` literal (flags become a scoped inline group).
fn value_pattern(value: &str, options: &CompileOptions) -> Result<String, CompileError> {
    if let Some((body, flags)) = split_literal(value) {
        for flag in flags.chars() {
            if !matches!(flag, 'i' | 'm' | 's' | 'x') {
                return Err(CompileError::conversion(
                    value,
                    format!("unsupported flag '{flag}'"),
                ));
            }
        }
        Regex::new(body).map_err(|err| CompileError::conversion(value, err.to_string()))?;
        return Ok(if flags.is_empty() {
            body.to_string()
        } else {
            format!("(?{flags}:{body})")
        });
    }
    let escaped = escape(value);
    Ok(if options.ignore_punctuation {
        optional_punctuation(&escaped)
    } else {
        escaped
    })
}

/// True when the input is in `/pattern/flags` literal form.
pub(crate) fn is_pattern_literal(input: &str) -> bool {
    split_literal(input).is_some()
}

/// Split `/pattern/flags` into its body and flags, if it has that shape.
fn split_literal(input: &str) -> Option<(&str, &str)> {
    let rest = input.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    Some((&rest[..end], &rest[end + 1..]))
}

/// Append `?` after every punctuation character in an escaped pattern,
/// keeping escape pairs together.
fn optional_punctuation(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len() + 4);
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        out.push(c);
        let literal = if c == '\\' {
            match chars.next() {
                Some(next) => {
                    out.push(next);
                    next
                }
                None => break,
            }
        } else {
            c
        };
        if PUNCTUATION.contains(&literal) {
            out.push('?');
        }
    }
    out
}

/// Merge sub-patterns left to right.
fn merge_patterns(mut patterns: Vec<String>) -> String {
    if patterns.len() > 1 {
        for i in 1..patterns.len() {
            let Some(head) = capture_spans(&patterns[i]).into_iter().next() else {
                continue;
            };
            let Some(tail) = capture_spans(&patterns[i - 1]).into_iter().next_back() else {
                continue;
            };
            if patterns[i][head.clone()] == patterns[i - 1][tail.clone()] {
                patterns[i - 1].replace_range(tail, "");
            }
        }
        let last = patterns.len() - 1;
        for pattern in &mut patterns[..last] {
            *pattern = to_non_capturing(pattern);
        }
    }
    patterns.join(r"\s?")
}

/// Byte ranges of capture groups, in order of their opening parenthesis.
fn capture_spans(pattern: &str) -> Vec<Range<usize>> {
    let bytes = pattern.as_bytes();
    let mut spans = Vec::new();
    let mut stack = Vec::new();
    let mut escaped = false;
    let mut in_class = false;
    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b'[' if !in_class => in_class = true,
            b']' if in_class => in_class = false,
            b'(' if !in_class => stack.push((i, bytes.get(i + 1) != Some(&b'?'))),
            b')' if !in_class => {
                if let Some((start, is_capture)) = stack.pop() {
                    if is_capture {
                        spans.push(start..i + 1);
                    }
                }
            }
            _ => {}
        }
    }
    spans.sort_by_key(|span| span.start);
    spans
}

/// Rewrite capture groups as non-capturing, leaving classes and escapes alone.
fn to_non_capturing(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut escaped = false;
    let mut in_class = false;
    while let Some(c) = chars.next() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                out.push(c);
                escaped = true;
            }
            '[' if !in_class => {
                in_class = true;
                out.push(c);
            }
            ']' if in_class => {
                in_class = false;
                out.push(c);
            }
            '(' if !in_class => {
                out.push(c);
                if chars.peek() != Some(&'?') {
                    out.push_str("?:");
                }
            }
            _ => out.push(c),
        }
    }
    out
}
