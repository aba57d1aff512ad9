#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;

use credguard_core::error::ErrorCode;
use credguard_core::{Rule, RuleSet};
use credguard_engine::config::rules::{rule_set_from_str, rule_set_to_string};
use credguard_engine::policy::{
    evaluate, InMemoryRuleSetProvider, PolicyDecision, RuleSetProvider, RuleStore,
    YamlFileRuleSetProvider,
};

fn deploy_rules(restrict: bool) -> RuleSet {
    RuleSet::new(
        vec![
            Rule::new("deploy", "deploy-.*", "release/.*").unwrap(),
            Rule::new("docs", "docs-token", "docs").unwrap(),
        ],
        restrict,
    )
    .unwrap()
}

#[test]
fn replace_publishes_new_rules() {
    let store = RuleStore::open(Arc::new(InMemoryRuleSetProvider::new(RuleSet::empty(false)))).unwrap();
    assert!(evaluate("deploy-prod", "feature/x", &store.snapshot()).is_allowed());

    store.replace(deploy_rules(true)).unwrap();

    assert!(!evaluate("deploy-prod", "feature/x", &store.snapshot()).is_allowed());
    assert_eq!(store.rule_set(), deploy_rules(true));
}

#[test]
fn held_snapshot_is_unaffected_by_replace() {
    let store = RuleStore::open(Arc::new(InMemoryRuleSetProvider::new(RuleSet::empty(false)))).unwrap();
    let before = store.snapshot();

    store.replace(deploy_rules(true)).unwrap();

    assert_eq!(evaluate("ssh", "anything", &before), PolicyDecision::Allow);
    assert!(!evaluate("ssh", "anything", &store.snapshot()).is_allowed());
}

#[test]
fn invalid_replacement_keeps_previous_rules() {
    let store = RuleStore::open(Arc::new(InMemoryRuleSetProvider::new(deploy_rules(true)))).unwrap();
    let bad = RuleSet::new(vec![Rule::new("broken", "deploy-(", ".*").unwrap()], false).unwrap();

    let err = store.replace(bad).unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidPattern);
    assert_eq!(store.rule_set(), deploy_rules(true));
}

#[test]
fn yaml_provider_round_trips_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.yaml");

    let provider = Arc::new(YamlFileRuleSetProvider::new(path.clone()));
    let store = RuleStore::open(provider.clone()).unwrap();
    // missing file: empty and permissive
    assert_eq!(store.rule_set(), RuleSet::empty(false));

    store.replace(deploy_rules(true)).unwrap();
    assert!(path.exists());

    let reopened = RuleStore::open(Arc::new(YamlFileRuleSetProvider::new(path.clone()))).unwrap();
    assert_eq!(reopened.rule_set(), deploy_rules(true));
    assert_eq!(provider.load_rule_set().unwrap().rules()[1].name(), "docs");
}

#[test]
fn reload_picks_up_external_edit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.yaml");
    std::fs::write(&path, "restrictNotMatching: false\n").unwrap();

    let store = RuleStore::open(Arc::new(YamlFileRuleSetProvider::new(path.clone()))).unwrap();
    assert!(evaluate("ssh", "x", &store.snapshot()).is_allowed());

    std::fs::write(
        &path,
        "restrictNotMatching: true\nonly-docs:\n  credentialPattern: docs-token\n  itemPattern: docs\n",
    )
    .unwrap();
    store.reload().unwrap();

    assert!(!evaluate("ssh", "x", &store.snapshot()).is_allowed());
    assert!(evaluate("docs-token", "docs", &store.snapshot()).is_allowed());
}

#[test]
fn reload_of_broken_file_keeps_previous_rules() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.yaml");
    std::fs::write(&path, "restrictNotMatching: true\n").unwrap();
    let store = RuleStore::open(Arc::new(YamlFileRuleSetProvider::new(path.clone()))).unwrap();

    std::fs::write(&path, "half:\n  credentialPattern: x\n").unwrap();
    let err = store.reload().unwrap_err();

    assert!(err.to_string().contains("missing credentialPattern/itemPattern key for half"));
    assert!(store.rule_set().restrict_by_default());
}

#[test]
fn structured_format_round_trip_preserves_order() {
    let text = rule_set_to_string(&deploy_rules(false)).unwrap();
    assert!(text.contains("restrictNotMatching: false"));

    let back = rule_set_from_str(&text).unwrap();
    let names: Vec<&str> = back.rules().iter().map(|r| r.name()).collect();
    assert_eq!(names, ["deploy", "docs"]);
}

#[test]
fn reserved_rule_name_cannot_be_saved() {
    let set = RuleSet::new(vec![Rule::new("restrictNotMatching", "a", "b").unwrap()], false).unwrap();
    let err = rule_set_to_string(&set).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidConfig);
}

#[test]
fn reserved_rule_name_cannot_be_published() {
    let store = RuleStore::open(Arc::new(InMemoryRuleSetProvider::new(deploy_rules(true)))).unwrap();
    let set = RuleSet::new(vec![Rule::new("restrictNotMatching", "a", "b").unwrap()], false).unwrap();

    let err = store.replace(set).unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidConfig);
    assert_eq!(store.rule_set(), deploy_rules(true));
}
