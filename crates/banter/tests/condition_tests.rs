//! Integration tests for condition compilation and matching.

use banter::{
    Captured, CompileOptions, ConditionMatch, ConditionSet, Criteria, Expression, escape,
};
use proptest::prelude::*;
use regex::Regex;

#[test]
fn plain_text_matches_anywhere_in_a_line() {
    let mut set = ConditionSet::new();
    set.add("deploy", None).unwrap();

    set.exec("please deploy the build");
    assert!(set.success());

    set.exec("hold the release");
    assert!(!set.success());
}

#[test]
fn pattern_literals_carry_their_flags() {
    let mut set = ConditionSet::new();
    let key = set.add(r"/^ok (\d+)$/i", None).unwrap();
    assert_eq!(key, "0");

    set.exec("OK 42");
    assert!(set.success());
    assert_eq!(set.capture_for("0"), Some("42"));
}

#[test]
fn word_matching_rejects_embedded_hits() {
    let mut set = ConditionSet::new();
    set.add(Criteria::new().contains("art"), None).unwrap();
    set.exec("start the show");
    assert!(!set.success());

    let mut loose = ConditionSet::with_options(CompileOptions::new().match_word(false));
    loose.add(Criteria::new().contains("art"), None).unwrap();
    loose.exec("start the show");
    assert!(loose.success());
}

#[test]
fn case_sensitivity_is_opt_in() {
    let mut set = ConditionSet::with_options(CompileOptions::new().ignore_case(false));
    set.add(Criteria::new().is("Hey"), None).unwrap();

    set.exec("hey");
    assert!(!set.success());

    set.exec("Hey");
    assert!(set.success());
}

#[test]
fn repeated_operators_alternate() {
    let mut set = ConditionSet::new();
    set.add(Criteria::new().is("hi").is("hello"), None).unwrap();

    set.exec("HELLO");
    assert!(set.success());

    set.exec("hi");
    assert!(set.success());

    set.exec("hiya");
    assert!(!set.success());
}

#[test]
fn after_captures_a_cleaned_tail() {
    let mut set = ConditionSet::new();
    set.add(Criteria::new().after("remind me to"), None).unwrap();

    set.exec("remind me to wash up - ");
    assert!(set.success());
    assert_eq!(set.capture_for("0"), Some("wash up"));
}

#[test]
fn after_and_before_share_one_capture() {
    let mut set = ConditionSet::new();
    set.add(Criteria::new().after("my name is").before("nice to meet"), None)
        .unwrap();

    set.exec("my name is leela nice to meet you");
    assert!(set.success());
    assert_eq!(set.capture_for("0"), Some("leela"));
}

#[test]
fn excludes_vetoes_an_otherwise_matching_line() {
    let mut set = ConditionSet::new();
    set.add(Criteria::new().contains("deploy").excludes("dry run"), None)
        .unwrap();

    set.exec("deploy to staging");
    assert!(set.success());

    set.exec("deploy dry run");
    assert!(!set.success());
}

#[test]
fn ranges_match_whole_numbers_only() {
    let mut set = ConditionSet::new();
    set.add(Criteria::new().range("10-15"), None).unwrap();

    set.exec("we need 12 units");
    assert!(set.success());

    set.exec("we need 16 units");
    assert!(!set.success());

    set.exec("we need 120 units");
    assert!(!set.success());
}

#[test]
fn keyed_entries_report_captures_by_key() {
    let mut set = ConditionSet::new();
    set.add(Criteria::new().after("name is"), Some("name")).unwrap();
    set.add(Criteria::new().after("city is"), Some("city")).unwrap();

    set.exec("name is fry, city is boston");
    assert!(set.success());
    assert_eq!(set.capture_for("name"), Some("fry"));
    assert_eq!(set.capture_for("city"), Some("boston"));

    match set.captured() {
        Captured::Map(map) => {
            assert_eq!(map.len(), 2);
            assert_eq!(map["name"].as_deref(), Some("fry"));
        }
        Captured::Single(_) => panic!("keyed entries report a capture map"),
    }
}

#[test]
fn a_single_keyless_entry_is_a_single_match() {
    let mut set = ConditionSet::new();
    set.add(Criteria::new().after("remind me to"), None).unwrap();
    set.exec("remind me to feed the cat");

    match set.match_view() {
        ConditionMatch::Match(Some(found)) => {
            assert_eq!(found.first_capture(), Some("feed the cat"));
        }
        _ => panic!("single entries report the match itself"),
    }
    match set.captured() {
        Captured::Single(capture) => assert_eq!(capture.as_deref(), Some("feed the cat")),
        Captured::Map(_) => panic!("single keyless entries stay a single capture"),
    }
}

#[test]
fn cleared_sets_keep_their_expressions() {
    let mut set = ConditionSet::new();
    set.add("ping", None).unwrap();

    set.exec("ping");
    assert!(set.success());

    set.clear();
    assert!(!set.success());

    set.exec("ping");
    assert!(set.success());

    set.clear_all();
    assert!(set.is_empty());
}

#[test]
fn bad_literals_and_ranges_fail_to_compile() {
    let mut set = ConditionSet::new();
    assert!(set.add("/maybe/z", None).is_err());
    assert!(set.add(Criteria::new().range("9-1"), None).is_err());
    assert!(set.is_empty());
}

#[test]
fn compiled_expressions_expose_their_pattern() {
    let criteria = Criteria::new().contains("hi");
    let expression = Expression::compile(&criteria, &CompileOptions::new()).unwrap();
    assert!(expression.pattern().starts_with("(?i)"));
    assert!(expression.is_match("hi there"));
}

proptest! {
    #[test]
    fn is_criteria_match_their_own_phrase(phrase in "[a-z]{1,10}( [a-z]{1,10}){0,2}") {
        let criteria = Criteria::new().is(phrase.as_str());
        let expression = Expression::compile(&criteria, &CompileOptions::new()).unwrap();
        prop_assert!(expression.is_match(&phrase));
    }

    #[test]
    fn ranges_accept_exactly_their_bounds(lo in 0u64..400, span in 0u64..400, pick in 0u64..1000) {
        let hi = lo + span;
        let criteria = Criteria::new().range(format!("{lo}-{hi}"));
        let expression = Expression::compile(&criteria, &CompileOptions::new()).unwrap();

        let inside = lo + pick % (span + 1);
        prop_assert!(expression.is_match(&inside.to_string()));
        prop_assert!(!expression.is_match(&(hi + 1).to_string()));
        if lo > 0 {
            prop_assert!(!expression.is_match(&(lo - 1).to_string()));
        }
    }

    #[test]
    fn escaped_text_is_inert_in_patterns(text in "[ -~]{1,30}") {
        let regex = Regex::new(&format!("^{}$", escape(&text))).unwrap();
        let expression = Expression::from_regex(regex);
        prop_assert!(expression.is_match(&text));
    }
}
