//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zi.
//! The Zi project belongs to the Dunimd project team.

use proptest::prelude::*;
use serde_json::{json, Value};
use ziflow::errors::{Result, ZiError};
use ziflow::operators::collection::{ZiAggregateStrategy, ZiJsonAggregator, ZiJsonSplitter};
use ziflow::operators::filter::ZiJsonFilter;
use ziflow::operators::transform::{ZiJsonTransformer, ZiTextNormalizeConfig, ZiTextNormalizer};
use ziflow::{record_from_value, ZiCollectionMode, ZiData, ZiOperator, ZiPipeline, ZiRecord};

fn rec(value: Value) -> ZiRecord {
    record_from_value(value).unwrap()
}

fn lower_normalizer() -> ZiTextNormalizer {
    ZiTextNormalizer::new(ZiTextNormalizeConfig {
        lower_case: true,
        ..ZiTextNormalizeConfig::default()
    })
    .unwrap()
}

#[derive(Debug)]
struct Overwrite {
    field: &'static str,
}

impl ZiOperator for Overwrite {
    fn name(&self) -> &str {
        "overwrite"
    }

    fn process_record(&self, mut record: ZiRecord) -> Result<ZiData> {
        if record.contains_key(self.field) {
            record.insert(self.field.to_string(), json!("clobbered"));
        }
        Ok(record.into())
    }
}

#[derive(Debug)]
struct Failing;

impl ZiOperator for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn process_record(&self, _record: ZiRecord) -> Result<ZiData> {
        Err(ZiError::schema("bad field"))
    }
}

#[test]
fn test_flatten_split_then_normalize() {
    let mut pipeline = ZiPipeline::default();
    pipeline
        .add(ZiJsonSplitter::new("items").unwrap())
        .add(lower_normalizer())
        .set_passthrough_fields(["id"]);

    let out = pipeline
        .process(rec(json!({
            "id": "test-1",
            "items": [{"text": "ITEM  ONE"}, {"text": "ITEM TWO"}]
        })))
        .unwrap();

    let batch = out.as_batch().unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0]["text"], "item one");
    assert_eq!(batch[1]["text"], "item two");
    assert!(batch.iter().all(|record| record["id"] == "test-1"));
}

#[test]
fn test_nested_split_then_aggregate_drops_passthrough() {
    let mut pipeline = ZiPipeline::default();
    pipeline
        .add(ZiJsonSplitter::new("items").unwrap())
        .add(ZiJsonAggregator::list("processed"))
        .set_collection_mode(ZiCollectionMode::Nested)
        .set_passthrough_fields(["id"]);

    let out = pipeline
        .process(rec(json!({"id": "test-1", "items": ["a", "b", "c"]})))
        .unwrap();

    let record = out.as_record().unwrap();
    assert_eq!(record["processed"].as_array().unwrap().len(), 3);
    assert!(!record.contains_key("id"));
}

#[test]
fn test_nested_batch_into_per_record_operator_is_contract_violation() {
    let mut pipeline = ZiPipeline::default();
    pipeline
        .add(ZiJsonSplitter::new("items").unwrap())
        .add(lower_normalizer())
        .set_collection_mode(ZiCollectionMode::Nested);

    let err = pipeline
        .process(rec(json!({"items": ["A", "B"]})))
        .unwrap_err();
    assert!(matches!(err, ZiError::Contract { .. }));
}

#[test]
fn test_nested_single_record_reaches_per_record_operator() {
    let mut pipeline = ZiPipeline::default();
    pipeline
        .add(lower_normalizer())
        .set_collection_mode(ZiCollectionMode::Nested);

    let out = pipeline.process(rec(json!({"text": "ABC"}))).unwrap();
    assert_eq!(out, ZiData::Record(rec(json!({"text": "abc"}))));
}

#[test]
fn test_list_input_is_mapped_in_flatten_mode() {
    let mut pipeline = ZiPipeline::default();
    pipeline.add(lower_normalizer());

    let input = vec![
        rec(json!({"text": "ITEM ONE"})),
        rec(json!({"text": "ITEM TWO"})),
        rec(json!({"text": "ITEM THREE"})),
    ];
    let out = pipeline.process(input).unwrap();
    let texts: Vec<_> = out
        .leaves()
        .into_iter()
        .map(|record| record["text"].clone())
        .collect();
    assert_eq!(texts, vec![json!("item one"), json!("item two"), json!("item three")]);
}

#[test]
fn test_complex_pipeline() {
    let mut pipeline = ZiPipeline::default();
    pipeline
        .add(ZiJsonSplitter::new("items").unwrap())
        .add(lower_normalizer())
        .add(
            ZiJsonSplitter::new("tags")
                .unwrap()
                .with_output_key_map([("tags", "tag")]),
        )
        .add(ZiJsonAggregator::list("all_results"));

    let out = pipeline
        .process(rec(json!({
            "id": "test-complex",
            "items": [
                {"text": "ITEM ONE", "tags": ["tag1", "tag2"]},
                {"text": "ITEM TWO", "tags": ["tag3"]}
            ]
        })))
        .unwrap();

    let results = out.as_record().unwrap()["all_results"].as_array().unwrap().clone();
    assert_eq!(results.len(), 3);
    assert!(results.iter().any(|item| item["text"] == "item one"));
    assert!(results.iter().any(|item| item["text"] == "item two"));
    assert!(results.iter().any(|item| item["tag"] == "tag1"));
    assert!(results.iter().any(|item| item["tag"] == "tag3"));
}

#[test]
fn test_passthrough_restores_overwritten_field() {
    let mut pipeline = ZiPipeline::default();
    pipeline
        .add(Overwrite { field: "id" })
        .set_passthrough_fields(["id", "missing"]);

    let out = pipeline.process(rec(json!({"id": "keep", "x": 1}))).unwrap();
    assert_eq!(out, ZiData::Record(rec(json!({"id": "keep", "x": 1}))));
}

#[test]
fn test_passthrough_follows_batch_lineage() {
    let mut pipeline = ZiPipeline::default();
    pipeline
        .add(ZiJsonSplitter::new("items").unwrap())
        .add(Overwrite { field: "id" })
        .set_passthrough_fields(["id"]);

    let out = pipeline
        .process(vec![
            rec(json!({"id": "a", "items": [1, 2]})),
            rec(json!({"id": "b", "items": [3]})),
        ])
        .unwrap();
    let ids: Vec<_> = out.leaves().into_iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!("a"), json!("a"), json!("b")]);
}

#[test]
fn test_nested_filter_rejection_skips_later_stages() {
    let mut pipeline = ZiPipeline::default();
    pipeline
        .add(ZiJsonFilter::new(|record: &ZiRecord| {
            record["text"].as_str().map_or(false, |text| text.contains("keep"))
        }))
        .add(lower_normalizer())
        .set_collection_mode(ZiCollectionMode::Nested);

    let dropped = pipeline.process(rec(json!({"text": " A "}))).unwrap();
    assert_eq!(dropped, ZiData::empty());

    let kept = pipeline.process(rec(json!({"text": " keep   ME "}))).unwrap();
    assert_eq!(kept, ZiData::Record(rec(json!({"text": "keep me"}))));
}

#[test]
fn test_passthrough_survives_fieldless_list_aggregate() {
    let mut pipeline = ZiPipeline::default();
    pipeline
        .add(Overwrite { field: "id" })
        .add(
            ZiJsonAggregator::new(ZiAggregateStrategy::List)
                .with_condition(|record: &ZiRecord| record["keep"] == json!(true)),
        )
        .set_passthrough_fields(["id"]);

    let out = pipeline
        .process(vec![
            rec(json!({"id": "a", "keep": true})),
            rec(json!({"id": "b", "keep": false})),
            rec(json!({"id": "c", "keep": true})),
        ])
        .unwrap();
    assert_eq!(
        out,
        ZiData::Batch(vec![
            rec(json!({"id": "a", "keep": true})),
            rec(json!({"id": "c", "keep": true})),
        ])
    );
}

#[test]
fn test_operator_error_propagates_and_aborts() {
    let mut pipeline = ZiPipeline::default();
    pipeline.add(Failing).add(lower_normalizer());

    let err = pipeline.process(rec(json!({"a": 1}))).unwrap_err();
    match err {
        ZiError::Operator { operator, message } => {
            assert_eq!(operator, "failing");
            assert!(message.contains("bad field"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_progress_reports_each_stage() {
    let mut pipeline = ZiPipeline::default();
    pipeline
        .add(ZiJsonSplitter::new("items").unwrap())
        .add(ZiJsonAggregator::merge());

    let seen = std::sync::Mutex::new(Vec::new());
    pipeline
        .process_with_progress(rec(json!({"items": [{"a": 1}, {"b": 2}]})), |name, before, after| {
            seen.lock().unwrap().push((name.to_string(), before, after));
        })
        .unwrap();
    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!((seen[0].1, seen[0].2), (1, 2));
    assert_eq!((seen[1].1, seen[1].2), (2, 1));
}

#[test]
fn test_rerunning_no_op_pipeline_is_idempotent() {
    let mut pipeline = ZiPipeline::default();
    pipeline.add(ZiJsonSplitter::new("absent").unwrap());

    let input = rec(json!({"id": 1, "y": 2}));
    let once = pipeline.process(input.clone()).unwrap();
    let twice = pipeline.process(once.clone()).unwrap();
    assert_eq!(once, ZiData::Batch(vec![input]));
    assert_eq!(once, twice);
}

proptest! {
    #[test]
    fn prop_passthrough_fields_survive_mutation(
        id in "[a-z0-9]{1,12}",
        items in proptest::collection::vec("[a-zA-Z ]{0,10}", 0..6),
    ) {
        let mut pipeline = ZiPipeline::default();
        pipeline
            .add(ZiJsonSplitter::new("items").unwrap())
            .add(ZiJsonTransformer::new().add("id", json!("mutated")).unwrap())
            .add(lower_normalizer())
            .set_passthrough_fields(["id"]);

        let out = pipeline
            .process(rec(json!({"id": id.clone(), "items": items.clone()})))
            .unwrap();
        let leaves = out.leaves();
        prop_assert_eq!(leaves.len(), items.len());
        for leaf in leaves {
            prop_assert_eq!(&leaf["id"], &json!(id.clone()));
        }
    }
}
