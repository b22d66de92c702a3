//! Condition compilation and matching.
//!
//! Semantic criteria ([`Criteria`]) compile into regular expressions
//! ([`Expression`]), and a [`ConditionSet`] holds an ordered, keyed group of
//! them with the match and capture results of the last execution. Branches
//! use condition sets to test inbound text; scripts use them directly when
//! they need captures without a branch.

pub mod expression;
pub mod range;
pub mod set;

pub use expression::{escape, CompileOptions, Criteria, Expression, Operator, TextMatch};
pub use range::range_pattern;
pub use set::{Captured, Condition, ConditionMatch, ConditionSet};
