//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zi.
//! The Zi project belongs to the Dunimd project team.

use serde_json::{json, Value};
use ziflow::operators::filter::{json_filter_factory, ZiCondition, ZiFieldPath, ZiJsonFilter};
use ziflow::operators::system::{ZiIdAdder, ZiTimestampAdder};
use ziflow::operators::transform::{
    text_normalize_factory, ZiJsonTransformer, ZiTextNormalizeConfig, ZiTextNormalizer,
};
use ziflow::operators::structure::{ZiJsonStructureExtractor, ZiStructureConfig};
use ziflow::{record_from_value, ZiData, ZiOperator, ZiPipeline, ZiPipelineBuilder, ZiRecord};

fn rec(value: Value) -> ZiRecord {
    record_from_value(value).unwrap()
}

#[test]
fn test_normalizer_defaults_touch_all_strings() {
    let op = ZiTextNormalizer::new(ZiTextNormalizeConfig::default()).unwrap();
    let out = op
        .process_record(rec(json!({
            "title": "  Hello   World  ",
            "nested": {"inner": " a\tb "},
            "list": [" x ", 3],
            "n": 1
        })))
        .unwrap();
    assert_eq!(
        out.to_value(),
        json!({
            "title": "Hello World",
            "nested": {"inner": "a b"},
            "list": ["x", 3],
            "n": 1
        })
    );
}

#[test]
fn test_normalizer_selected_fields_only() {
    let op = ZiTextNormalizer::new(ZiTextNormalizeConfig {
        text_fields: Some(vec!["title".into(), "nested.inner".into(), "absent".into()]),
        upper_case: true,
        ..ZiTextNormalizeConfig::default()
    })
    .unwrap();
    let out = op
        .process_record(rec(json!({
            "title": "abc",
            "body": " untouched ",
            "nested": {"inner": "def"}
        })))
        .unwrap();
    assert_eq!(
        out.to_value(),
        json!({"title": "ABC", "body": " untouched ", "nested": {"inner": "DEF"}})
    );
}

#[test]
fn test_normalizer_custom_function_and_empty_record() {
    let op = ZiTextNormalizer::new(ZiTextNormalizeConfig::default())
        .unwrap()
        .with_normalize_fn(|text: &str| text.replace('-', "_"));
    let out = op.process_record(rec(json!({"k": " a-b "}))).unwrap();
    assert_eq!(out.to_value(), json!({"k": " a_b "}));

    let out = op.process_record(ZiRecord::new()).unwrap();
    assert_eq!(out, ZiData::Record(ZiRecord::new()));
}

#[test]
fn test_normalizer_is_idempotent() {
    let op = text_normalize_factory(&json!({"lower_case": true})).unwrap();
    let input = rec(json!({"text": "  Mixed   CASE  text "}));
    let once = op.process_record(input).unwrap();
    let twice = op.process_record(once.as_record().unwrap().clone()).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_field_path_set_and_remove() {
    let path = ZiFieldPath::parse("a.b.c").unwrap();
    let mut record = ZiRecord::new();
    assert!(path.set_value(&mut record, json!(1)));
    assert_eq!(Value::Object(record.clone()), json!({"a": {"b": {"c": 1}}}));
    assert_eq!(path.resolve(&record), Some(&json!(1)));
    assert_eq!(path.remove(&mut record), Some(json!(1)));
    assert_eq!(path.resolve(&record), None);
}

#[test]
fn test_filter_conditions_drop_records_in_pipeline() {
    let condition = ZiCondition::from_value(&json!({
        "op": "all",
        "conditions": [
            {"op": "exists", "path": "text"},
            {"op": "not", "condition": {"op": "matches", "path": "text", "pattern": "^spam"}},
            {"op": "any", "conditions": [
                {"op": "equals", "path": "lang", "value": "en"},
                {"op": "contains", "path": "tags", "value": "keep"}
            ]}
        ]
    }))
    .unwrap();
    let mut pipeline = ZiPipeline::default();
    pipeline.add(ZiJsonFilter::from_condition(&condition).unwrap());

    let out = pipeline
        .process(vec![
            rec(json!({"text": "hello", "lang": "en"})),
            rec(json!({"text": "spam offer", "lang": "en"})),
            rec(json!({"text": "hola", "lang": "es", "tags": ["keep"]})),
            rec(json!({"lang": "en"})),
            rec(json!({"text": "bonjour", "lang": "fr"})),
        ])
        .unwrap();
    let texts: Vec<_> = out.leaves().into_iter().map(|r| r["text"].clone()).collect();
    assert_eq!(texts, vec![json!("hello"), json!("hola")]);
}

#[test]
fn test_filter_closure_and_factory() {
    let filter = ZiJsonFilter::new(|record: &ZiRecord| record.len() > 1);
    assert_eq!(
        filter.process_record(rec(json!({"a": 1}))).unwrap(),
        ZiData::empty()
    );

    let op = json_filter_factory(&json!({
        "condition": {"op": "lt", "path": "meta.score", "value": 10}
    }))
    .unwrap();
    let kept = op.process_record(rec(json!({"meta": {"score": 3}}))).unwrap();
    assert!(!kept.is_batch());
    assert!(json_filter_factory(&json!({})).is_err());
}

#[test]
fn test_transformer_with_system_fields() {
    let mut pipeline = ZiPipeline::default();
    pipeline
        .add(
            ZiJsonTransformer::new()
                .rename("q", "prompt")
                .unwrap()
                .remove("debug")
                .unwrap()
                .add("meta.source", json!("import"))
                .unwrap(),
        )
        .add(ZiIdAdder::default())
        .add(ZiTimestampAdder::default());

    let out = pipeline
        .process(rec(json!({"q": "hi", "debug": true})))
        .unwrap();
    let record = out.as_record().unwrap();
    assert_eq!(record["prompt"], json!("hi"));
    assert_eq!(record["meta"], json!({"source": "import"}));
    assert!(!record.contains_key("debug"));
    assert!(record["id"].is_string());
    assert!(record["timestamp"].is_string());
}

#[test]
fn test_structure_extractor_from_config() {
    let pipeline = ZiPipelineBuilder::with_defaults()
        .build_from_config(&[json!({
            "operator": "json.structure",
            "config": {"output_field": "schema", "include_original": false}
        })])
        .unwrap();
    let out = pipeline
        .process(rec(json!({
            "id": 7,
            "tags": ["a", "b"],
            "meta": {"score": 0.5, "note": null}
        })))
        .unwrap();
    assert_eq!(
        out.to_value(),
        json!({"schema": {
            "id": {"path": "id", "types": ["integer"]},
            "tags": {"path": "tags", "types": ["array", "string_array"]},
            "meta": {"path": "meta", "types": ["object"]},
            "meta.score": {"path": "meta.score", "types": ["number"]},
            "meta.note": {"path": "meta.note", "types": ["null"]}
        }})
    );
}

#[test]
fn test_structure_extractor_keeps_original_and_handles_empty() {
    let op = ZiJsonStructureExtractor::new(ZiStructureConfig::default()).unwrap();
    let out = op.process_record(rec(json!({"text": "hi"}))).unwrap();
    let record = out.as_record().unwrap();
    assert_eq!(record["text"], json!("hi"));
    assert_eq!(record["structure"]["text"]["types"], json!(["string"]));

    let out = op.process_record(ZiRecord::new()).unwrap();
    assert_eq!(out.to_value(), json!({"structure": {}}));
}
