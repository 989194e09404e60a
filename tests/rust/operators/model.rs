//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zi.
//! The Zi project belongs to the Dunimd project team.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use ziflow::errors::{Result, ZiError};
use ziflow::operators::model::{
    model_invoke_factory, model_multimodal_factory, ZiMessage, ZiModelClient, ZiModelConfig,
    ZiModelInvoker, ZiMultimodalInvoker,
};
use ziflow::{record_from_value, ZiConcurrentExecutor, ZiOperator, ZiPipeline, ZiRecord};

/// Echoes the last user message and records every conversation it receives.
#[derive(Debug, Default)]
struct EchoClient {
    calls: Mutex<Vec<Vec<ZiMessage>>>,
}

impl ZiModelClient for EchoClient {
    fn call(&self, messages: &[ZiMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let last = match messages.last() {
            Some(message) => match message.text() {
                Some(text) => text.to_string(),
                None => message.content.to_string(),
            },
            None => String::new(),
        };
        Ok(format!("echo: {last}"))
    }
}

#[derive(Debug)]
struct DownClient;

impl ZiModelClient for DownClient {
    fn call(&self, _messages: &[ZiMessage]) -> Result<String> {
        Err(ZiError::model("down", "connection refused"))
    }
}

fn rec(value: Value) -> ZiRecord {
    record_from_value(value).unwrap()
}

#[test]
fn test_invoker_writes_response_field() {
    let client = Arc::new(EchoClient::default());
    let invoker = ZiModelInvoker::new(client.clone())
        .with_prompt_field("question")
        .with_response_field("answer")
        .with_system_prompt("be brief");

    let out = invoker
        .process_record(rec(json!({"question": "2+2?", "id": 7})))
        .unwrap();
    assert_eq!(out.to_value(), json!({"question": "2+2?", "id": 7, "answer": "echo: 2+2?"}));

    let calls = client.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0],
        vec![ZiMessage::system("be brief"), ZiMessage::user("2+2?")]
    );
}

#[test]
fn test_missing_prompt_is_soft_noop() {
    let client = Arc::new(EchoClient::default());
    let invoker = ZiModelInvoker::new(client.clone());

    let input = rec(json!({"text": "no prompt here"}));
    let out = invoker.process_record(input.clone()).unwrap();
    assert_eq!(out.as_record(), Some(&input));
    assert!(client.calls.lock().unwrap().is_empty());
}

#[test]
fn test_non_string_prompt_is_schema_error() {
    let invoker = ZiModelInvoker::new(Arc::new(EchoClient::default()));
    let err = invoker
        .process_record(rec(json!({"prompt": ["not", "text"]})))
        .unwrap_err();
    assert!(matches!(err, ZiError::Schema { .. }));
}

#[test]
fn test_client_failure_propagates_through_pipeline() {
    let mut pipeline = ZiPipeline::default();
    pipeline.add(ZiModelInvoker::new(Arc::new(DownClient)));

    let err = pipeline.process(rec(json!({"prompt": "hi"}))).unwrap_err();
    assert_eq!(err, ZiError::model("down", "connection refused"));
}

#[test]
fn test_invoker_runs_once_per_record_on_executor() {
    let client = Arc::new(EchoClient::default());
    let mut pipeline = ZiPipeline::default();
    pipeline.add(ZiModelInvoker::new(client.clone()));
    let executor = ZiConcurrentExecutor::new(pipeline, 3).unwrap();

    let records: Vec<ZiRecord> = (0..9)
        .map(|n| rec(json!({"prompt": format!("p{n}")})))
        .collect();
    let outputs = executor.execute_all_strict(records).unwrap();

    assert_eq!(client.calls.lock().unwrap().len(), 9);
    for (n, output) in outputs.iter().enumerate() {
        assert_eq!(output.as_record().unwrap()["response"], json!(format!("echo: p{n}")));
    }
}

#[test]
fn test_factory_builds_openai_invoker() {
    let op = model_invoke_factory(&json!({
        "model": "gpt-test",
        "base_url": "http://localhost:9/v1",
        "api_key": "sk-test",
        "timeout_secs": 1,
        "prompt_field": "q",
        "name": "ask"
    }))
    .unwrap();
    assert_eq!(op.name(), "ask");

    // Records without the prompt field never reach the network.
    let out = op.process_record(rec(json!({"other": 1}))).unwrap();
    assert_eq!(out.to_value(), json!({"other": 1}));
}

#[test]
fn test_model_config_api_key_resolution() {
    let mut config = ZiModelConfig::new("gpt-test");
    config.api_key = Some("explicit".into());
    assert_eq!(config.resolved_api_key().as_deref(), Some("explicit"));
    assert_eq!(config.timeout_secs, 60);
}

#[test]
fn test_multimodal_invoker_sends_message_parts() {
    let client = Arc::new(EchoClient::default());
    let invoker = ZiMultimodalInvoker::new(client.clone()).with_response_field("caption");

    let message = json!({
        "role": "user",
        "content": [
            {"type": "text", "text": "describe"},
            {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}}
        ]
    });
    let out = invoker
        .process_record(rec(json!({"id": 1, "message": message.clone()})))
        .unwrap();
    let record = out.as_record().unwrap();
    assert!(record["caption"].as_str().unwrap().starts_with("echo: [{"));

    let calls = client.calls.lock().unwrap();
    assert_eq!(calls[0], vec![ZiMessage::new("user", message["content"].clone())]);
}

#[test]
fn test_multimodal_invoker_accepts_json_text_and_arrays() {
    let client = Arc::new(EchoClient::default());
    let invoker = ZiMultimodalInvoker::new(client.clone()).with_message_field("msg");

    let out = invoker
        .process_record(rec(json!({"msg": r#"{"role": "user", "content": "hello"}"#})))
        .unwrap();
    assert_eq!(out.as_record().unwrap()["response"], json!("echo: hello"));

    let out = invoker
        .process_record(rec(json!({"msg": [
            {"role": "system", "content": "terse"},
            {"role": "user", "content": "again"}
        ]})))
        .unwrap();
    assert_eq!(out.as_record().unwrap()["response"], json!("echo: again"));
    assert_eq!(client.calls.lock().unwrap()[1].len(), 2);

    let untouched = rec(json!({"other": true}));
    assert_eq!(
        invoker.process_record(untouched.clone()).unwrap().as_record(),
        Some(&untouched)
    );
}

#[test]
fn test_multimodal_invoker_rejects_malformed_messages() {
    let invoker = ZiMultimodalInvoker::new(Arc::new(EchoClient::default()));
    for bad in [json!("not json"), json!(42), json!({"content": "no role"})] {
        let err = invoker.process_record(rec(json!({"message": bad}))).unwrap_err();
        assert!(matches!(err, ZiError::Schema { .. }), "unexpected {err:?}");
    }
}

#[test]
fn test_multimodal_factory() {
    let op = model_multimodal_factory(&json!({
        "model": "gpt-4o",
        "api_key": "sk-test",
        "message_field": "payload",
        "name": "vision"
    }))
    .unwrap();
    assert_eq!(op.name(), "vision");
    let out = op.process_record(rec(json!({"message": "ignored"}))).unwrap();
    assert_eq!(out.to_value(), json!({"message": "ignored"}));
}
