//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zi.
//! The Zi project belongs to the Dunimd project team.

use proptest::prelude::*;
use serde_json::{json, Value};
use ziflow::operators::collection::{
    json_aggregate_factory, json_split_factory, ZiAggregateStrategy, ZiJsonAggregator,
    ZiJsonSplitter,
};
use ziflow::{record_from_value, ZiCapability, ZiData, ZiError, ZiOperator, ZiRecord};

fn rec(value: Value) -> ZiRecord {
    record_from_value(value).unwrap()
}

fn batch(values: Vec<Value>) -> ZiData {
    ZiData::Batch(values.into_iter().map(rec).collect())
}

#[test]
fn test_split_simple() {
    let splitter = ZiJsonSplitter::new("items").unwrap();
    let out = splitter
        .process(rec(json!({"id": "t1", "items": ["a", "b", "c"]})).into())
        .unwrap();
    assert_eq!(
        out,
        batch(vec![
            json!({"id": "t1", "items": "a"}),
            json!({"id": "t1", "items": "b"}),
            json!({"id": "t1", "items": "c"}),
        ])
    );
}

#[test]
fn test_split_missing_or_scalar_field_is_noop() {
    let splitter = ZiJsonSplitter::new("x").unwrap();
    let out = splitter.process(rec(json!({"id": 1, "y": 2})).into()).unwrap();
    assert_eq!(out, batch(vec![json!({"id": 1, "y": 2})]));

    let splitter = ZiJsonSplitter::new("items").unwrap();
    let out = splitter
        .process(rec(json!({"id": "t1", "items": "not-a-list"})).into())
        .unwrap();
    assert_eq!(out, batch(vec![json!({"id": "t1", "items": "not-a-list"})]));
}

#[test]
fn test_split_with_output_mapping_drops_unmapped_fields() {
    let splitter = ZiJsonSplitter::new("items")
        .unwrap()
        .with_output_key_map([("id", "original_id"), ("items", "content"), ("category", "type")])
        .with_keep_original(false);
    let out = splitter
        .process(
            rec(json!({"id": "t1", "items": ["i1", "i2"], "category": "test", "extra": 0})).into(),
        )
        .unwrap();
    let leaves = out.into_leaves();
    assert_eq!(leaves.len(), 2);
    assert_eq!(
        leaves[0],
        rec(json!({"content": "i1", "original_id": "t1", "type": "test"}))
    );
    assert!(!leaves[1].contains_key("items"));
    assert!(!leaves[1].contains_key("extra"));
}

#[test]
fn test_split_object_elements_are_lifted() {
    let splitter = ZiJsonSplitter::new("items").unwrap();
    let out = splitter
        .process(rec(json!({"id": "t1", "items": [{"text": "A"}]})).into())
        .unwrap();
    let child = &out.into_leaves()[0];
    assert_eq!(child["items"], json!({"text": "A"}));
    assert_eq!(child["text"], json!("A"));

    let plain = ZiJsonSplitter::new("items").unwrap().with_lift_objects(false);
    let out = plain
        .process(rec(json!({"items": [{"text": "A"}]})).into())
        .unwrap();
    assert!(!out.into_leaves()[0].contains_key("text"));
}

#[test]
fn test_split_factory() {
    let op = json_split_factory(&json!({
        "split_field": "items",
        "output_key_map": {"items": "item"},
        "keep_original": false
    }))
    .unwrap();
    assert_eq!(op.capability(), ZiCapability::FanOut);
    let out = op.process(rec(json!({"id": 1, "items": [7]})).into()).unwrap();
    assert_eq!(out, batch(vec![json!({"item": 7})]));

    assert!(matches!(
        json_split_factory(&json!({"split_field": ""})),
        Err(ZiError::Validation { .. })
    ));
}

#[test]
fn test_aggregate_list_strategy() {
    let aggregator = ZiJsonAggregator::list("items");
    let out = aggregator
        .process(batch(vec![
            json!({"id": "1", "text": "first"}),
            json!({"id": "2", "text": "second"}),
        ]))
        .unwrap();
    assert_eq!(
        out.to_value(),
        json!({"items": [{"id": "1", "text": "first"}, {"id": "2", "text": "second"}]})
    );
}

#[test]
fn test_aggregate_list_without_field_returns_batch() {
    let aggregator = ZiJsonAggregator::new(ZiAggregateStrategy::List);
    let input = batch(vec![json!({"id": "1"}), json!({"id": "2"})]);
    assert_eq!(aggregator.process(input.clone()).unwrap(), input);
}

#[test]
fn test_aggregate_merge_strategy() {
    let aggregator = ZiJsonAggregator::merge();
    let out = aggregator
        .process(batch(vec![
            json!({"id": "1", "name": "t1"}),
            json!({"count": 5, "active": true}),
            json!({"tags": ["a", "b"]}),
        ]))
        .unwrap();
    assert_eq!(
        out.to_value(),
        json!({"id": "1", "name": "t1", "count": 5, "active": true, "tags": ["a", "b"]})
    );
}

#[test]
fn test_aggregate_merge_last_write_wins() {
    let out = ZiJsonAggregator::merge()
        .process(batch(vec![json!({"k": 1, "a": true}), json!({"k": 2})]))
        .unwrap();
    assert_eq!(out.to_value(), json!({"k": 2, "a": true}));
}

#[test]
fn test_aggregate_with_condition() {
    let aggregator = ZiJsonAggregator::list("active_items").with_condition(|record: &ZiRecord| {
        record.get("active").and_then(Value::as_bool).unwrap_or(false)
    });
    let out = aggregator
        .process(batch(vec![
            json!({"id": "1", "active": true}),
            json!({"id": "2", "active": false}),
            json!({"id": "3", "active": true}),
        ]))
        .unwrap();
    let items = out.as_record().unwrap()["active_items"].as_array().unwrap().clone();
    let ids: Vec<_> = items.iter().map(|item| item["id"].clone()).collect();
    assert_eq!(ids, vec![json!("1"), json!("3")]);
}

#[test]
fn test_aggregate_empty_and_single() {
    let aggregator = ZiJsonAggregator::list("items");
    assert_eq!(
        aggregator.process(ZiData::empty()).unwrap(),
        ZiData::Record(ZiRecord::new())
    );

    let single = rec(json!({"id": "1", "text": "single"}));
    assert_eq!(
        ZiJsonAggregator::new(ZiAggregateStrategy::List)
            .process(single.clone().into())
            .unwrap(),
        ZiData::Record(single)
    );
}

#[test]
fn test_aggregate_factory() {
    let op = json_aggregate_factory(&json!({
        "strategy": "list",
        "aggregate_field": "kept",
        "condition": {"op": "gt", "path": "score", "value": 0.5}
    }))
    .unwrap();
    let out = op
        .process(batch(vec![json!({"score": 0.9}), json!({"score": 0.1})]))
        .unwrap();
    assert_eq!(out.to_value(), json!({"kept": [{"score": 0.9}]}));

    assert!(json_aggregate_factory(&Value::Null).is_ok());
    assert!(matches!(
        json_aggregate_factory(&json!({"strategy": "sum"})),
        Err(ZiError::Validation { .. })
    ));
}

proptest! {
    #[test]
    fn prop_split_yields_one_child_per_element(
        elements in proptest::collection::vec(any::<i64>(), 0..20),
    ) {
        let splitter = ZiJsonSplitter::new("items").unwrap();
        let parent = rec(json!({"id": "p", "items": elements.clone()}));
        let children = splitter.process(parent.into()).unwrap().into_leaves();

        prop_assert_eq!(children.len(), elements.len());
        for (child, element) in children.iter().zip(&elements) {
            prop_assert_eq!(&child["items"], &json!(element));
            prop_assert_eq!(&child["id"], &json!("p"));
        }
    }
}
