#![forbid(unsafe_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use kubedeck_core::{field, Item, ObjectMeta, ResourceItem};
use kubedeck_search::FilterEngine;
use smallvec::smallvec;

fn item(name: &str, ns: &str, age_mins: Option<i64>) -> Item {
    Arc::new(ResourceItem {
        kind: "Pod".into(),
        meta: ObjectMeta {
            namespace: Some(ns.into()),
            name: name.into(),
            created: age_mins.map(|m| Utc::now() - Duration::minutes(m)),
            ..Default::default()
        },
        columns: smallvec![("Status".to_string(), "Running".to_string())],
        extra: Default::default(),
    })
}

fn names(items: &[Item]) -> Vec<String> {
    items.iter().map(|i| field::get_string(i.as_ref(), "Name")).collect()
}

fn fields() -> Vec<String> { vec!["Name".to_string(), "Namespace".to_string()] }

fn clusters() -> Vec<Item> {
    vec![
        item("my-production-cluster", "default", Some(30)),
        item("staging-environment", "default", Some(20)),
        item("dev-local", "default", Some(10)),
        item("production-backup", "default", Some(5)),
    ]
}

#[test]
fn prod_matches_substring_anywhere() {
    let engine = FilterEngine::new();
    let out = engine.filter(&clusters(), &["Name".to_string()], "prod");
    let mut got = names(&out);
    got.sort();
    assert_eq!(got, vec!["my-production-cluster", "production-backup"]);
}

#[test]
fn empty_filter_keeps_input_order() {
    let engine = FilterEngine::new();
    let items = clusters();
    let once = engine.filter(&items, &fields(), "");
    let twice = engine.filter(&once, &fields(), "");
    assert_eq!(names(&once), names(&items));
    assert_eq!(names(&twice), names(&items));
}

#[test]
fn filtering_is_idempotent() {
    let engine = FilterEngine::new();
    let items = clusters();
    let a = engine.filter(&items, &fields(), "de");
    let b = engine.filter(&items, &fields(), "de");
    assert_eq!(names(&a), names(&b));
}

#[test]
fn negation_is_the_complement() {
    let engine = FilterEngine::new();
    let items = clusters();
    for pattern in ["prod", "dev", "zzz", "", "default"] {
        let pos = engine.hits(&items, &fields(), pattern);
        let neg = engine.hits(&items, &fields(), &format!("!{}", pattern));
        let mut all: Vec<usize> = pos.iter().chain(neg.iter()).map(|h| h.index).collect();
        all.sort_unstable();
        assert_eq!(all, (0..items.len()).collect::<Vec<_>>(), "pattern {pattern:?}");
    }
}

#[test]
fn negation_orders_newest_first() {
    let engine = FilterEngine::new();
    let out = engine.filter(&clusters(), &["Name".to_string()], "!prod");
    assert_eq!(names(&out), vec!["dev-local", "staging-environment"]);
}

#[test]
fn negation_without_timestamps_orders_by_name() {
    let engine = FilterEngine::new();
    let items = vec![item("Zeta", "a", None), item("alpha", "a", None), item("beta-x", "a", None)];
    let out = engine.filter(&items, &["Name".to_string()], "!x");
    assert_eq!(names(&out), vec!["alpha", "Zeta"]);
}

#[test]
fn score_ties_break_by_age_then_name() {
    let engine = FilterEngine::new();
    let items = vec![
        item("web-b", "shop", Some(60)),
        item("web-a", "shop", Some(60)),
        item("web-c", "shop", Some(1)),
    ];
    let out = engine.filter(&items, &["Name".to_string()], "web");
    assert_eq!(names(&out), vec!["web-c", "web-a", "web-b"]);
}

#[test]
fn matching_is_case_insensitive_and_reads_search_fields() {
    let engine = FilterEngine::new();
    let items = vec![item("api", "Payments", Some(1)), item("web", "shop", Some(1))];
    assert_eq!(names(&engine.filter(&items, &fields(), "PAY")), vec!["api"]);
    // Namespace is not searched when only Name is configured.
    assert!(engine.filter(&items, &["Name".to_string()], "pay").is_empty());
    assert_eq!(names(&engine.filter(&items, &["Status".to_string()], "running")).len(), 2);
}
