//! Usage record counter tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use credguard_core::{ConsumerDimension, UsageRecord};

#[test]
fn items_and_nodes_sum_into_total() {
    let mut rec = UsageRecord::new("credential1");
    rec.increment(&ConsumerDimension::Item("jobA".into()));
    rec.increment(&ConsumerDimension::Item("jobA".into()));
    rec.increment(&ConsumerDimension::Node("n1".into()));

    assert_eq!(rec.total_count(), 3);
    assert_eq!(rec.item_count("jobA"), 2);
    assert_eq!(rec.node_count("n1"), 1);
    assert_eq!(rec.item_count("n1"), 0, "node keys never leak into item counts");
}

#[test]
fn same_key_in_both_dimensions_is_counted_separately() {
    let mut rec = UsageRecord::new("c");
    rec.increment(&ConsumerDimension::Item("shared".into()));
    rec.increment(&ConsumerDimension::Node("shared".into()));

    assert_eq!(rec.item_count("shared"), 1);
    assert_eq!(rec.node_count("shared"), 1);
    assert_eq!(rec.total_count(), 2);
}

#[test]
fn persisted_total_is_recomputed_on_load() {
    let s = r#"{
        "credentialId": "c1",
        "itemUsage": { "a": 2, "b": 1 },
        "nodeUsage": { "n": 4 },
        "totalCount": 999
    }"#;
    let rec: UsageRecord = serde_json::from_str(s).unwrap();
    assert_eq!(rec.credential_id(), "c1");
    assert_eq!(rec.total_count(), 7);
}

#[test]
fn missing_maps_default_to_empty() {
    let rec: UsageRecord = serde_json::from_str(r#"{ "credentialId": "c2" }"#).unwrap();
    assert_eq!(rec.total_count(), 0);
    assert!(rec.item_usage().is_empty());
    assert!(rec.node_usage().is_empty());
}

#[test]
fn serialized_form_uses_camel_case_keys() {
    let mut rec = UsageRecord::new("c3");
    rec.increment(&ConsumerDimension::Node("n1".into()));
    let v = serde_json::to_value(&rec).unwrap();
    assert_eq!(v["credentialId"], "c3");
    assert_eq!(v["nodeUsage"]["n1"], 1);
    assert_eq!(v["totalCount"], 1);
}
