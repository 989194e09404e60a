//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zi.
//! The Zi project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Model Invocation
//!
//! Operators that send a record field to a chat-completion model and store the
//! reply. The HTTP transport is behind [`ZiModelClient`] so tests and callers
//! can substitute their own.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, ZiError};
use crate::operator::ZiOperator;
use crate::record::{type_name, ZiData, ZiRecord};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// A single chat message.
///
/// `content` is plain text for ordinary prompts, or an array of content parts
/// (`{"type": "text", ..}`, `{"type": "image_url", ..}`) for multimodal input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZiMessage {
    pub role: String,
    pub content: Value,
}

impl ZiMessage {
    pub fn new(role: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content.into())
    }

    /// The content when it is plain text.
    pub fn text(&self) -> Option<&str> {
        self.content.as_str()
    }
}

/// Chat-completion backend.
pub trait ZiModelClient: fmt::Debug + Send + Sync {
    /// Sends the conversation and returns the text of the first choice.
    fn call(&self, messages: &[ZiMessage]) -> Result<String>;
}

/// Connection and sampling settings for [`ZiOpenAiClient`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZiModelConfig {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: f64,
    pub timeout_secs: u64,
    /// Extra request body parameters, passed through unchanged.
    pub params: Map<String, Value>,
}

impl Default for ZiModelConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            base_url: None,
            api_key: None,
            max_tokens: None,
            temperature: 0.7,
            timeout_secs: 60,
            params: Map::new(),
        }
    }
}

impl ZiModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Explicit key, otherwise the `OPENAI_API_KEY` environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
    }

    pub fn endpoint(&self) -> String {
        let base = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }
}

/// Blocking client for OpenAI-compatible `/chat/completions` endpoints.
pub struct ZiOpenAiClient {
    config: ZiModelConfig,
    api_key: Option<String>,
    http: reqwest::blocking::Client,
}

impl ZiOpenAiClient {
    pub fn new(config: ZiModelConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(ZiError::validation("model name must not be empty"));
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ZiError::model(&config.model, format!("failed to build HTTP client: {e}")))?;
        let api_key = config.resolved_api_key();
        Ok(Self {
            config,
            api_key,
            http,
        })
    }

    pub fn config(&self) -> &ZiModelConfig {
        &self.config
    }

    fn request_body(&self, messages: &[ZiMessage]) -> Value {
        let mut body = self.config.params.clone();
        body.insert("model".to_string(), Value::String(self.config.model.clone()));
        body.insert(
            "messages".to_string(),
            serde_json::to_value(messages).unwrap_or(Value::Array(Vec::new())),
        );
        if let Some(max_tokens) = self.config.max_tokens {
            body.insert("max_tokens".to_string(), Value::from(max_tokens));
        }
        body.insert(
            "temperature".to_string(),
            serde_json::Number::from_f64(self.config.temperature)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        );
        Value::Object(body)
    }

    fn parse_response(&self, json: &Value) -> Result<String> {
        json.get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ZiError::model(&self.config.model, "response has no choices[0].message.content")
            })
    }
}

impl fmt::Debug for ZiOpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiOpenAiClient")
            .field("model", &self.config.model)
            .field("endpoint", &self.config.endpoint())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ZiModelClient for ZiOpenAiClient {
    fn call(&self, messages: &[ZiMessage]) -> Result<String> {
        let model = &self.config.model;
        let mut request = self
            .http
            .post(self.config.endpoint())
            .json(&self.request_body(messages));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .map_err(|e| ZiError::model(model, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(ZiError::model(
                model,
                format!("API returned error {status}: {body}"),
            ));
        }

        let json: Value = response
            .json()
            .map_err(|e| ZiError::model(model, format!("failed to parse response: {e}")))?;
        self.parse_response(&json)
    }
}

/// Sends `prompt_field` to a model and writes the reply to `response_field`.
///
/// Records without the prompt field pass through unchanged. Each record costs
/// exactly one call; failures are not retried.
#[derive(Clone)]
pub struct ZiModelInvoker {
    name: String,
    description: String,
    client: Arc<dyn ZiModelClient>,
    prompt_field: String,
    response_field: String,
    system_prompt: Option<String>,
}

impl ZiModelInvoker {
    pub fn new(client: Arc<dyn ZiModelClient>) -> Self {
        Self {
            name: "ModelInvoker".to_string(),
            description: "Invokes a chat model".to_string(),
            client,
            prompt_field: "prompt".to_string(),
            response_field: "response".to_string(),
            system_prompt: None,
        }
    }

    /// Invoker backed by [`ZiOpenAiClient`].
    pub fn openai(config: ZiModelConfig) -> Result<Self> {
        let description = format!("Invokes {} model", config.model);
        let client = ZiOpenAiClient::new(config)?;
        Ok(Self::new(Arc::new(client)).with_description(description))
    }

    pub fn with_prompt_field(mut self, field: impl Into<String>) -> Self {
        self.prompt_field = field.into();
        self
    }

    pub fn with_response_field(mut self, field: impl Into<String>) -> Self {
        self.response_field = field.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn messages(&self, prompt: &str) -> Vec<ZiMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(ZiMessage::system(system.clone()));
        }
        messages.push(ZiMessage::user(prompt));
        messages
    }
}

impl fmt::Debug for ZiModelInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiModelInvoker")
            .field("name", &self.name)
            .field("client", &self.client)
            .field("prompt_field", &self.prompt_field)
            .field("response_field", &self.response_field)
            .finish()
    }
}

impl ZiOperator for ZiModelInvoker {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn process_record(&self, mut record: ZiRecord) -> Result<ZiData> {
        let prompt = match record.get(&self.prompt_field) {
            None => return Ok(ZiData::Record(record)),
            Some(Value::String(prompt)) => prompt.clone(),
            Some(other) => {
                return Err(ZiError::schema(format!(
                    "prompt field '{}' must be a string, got {}",
                    self.prompt_field,
                    type_name(other)
                )))
            }
        };
        log::debug!("{}: invoking model ({} prompt chars)", self.name, prompt.chars().count());
        let reply = self.client.call(&self.messages(&prompt))?;
        record.insert(self.response_field.clone(), Value::String(reply));
        Ok(ZiData::Record(record))
    }
}

/// Sends a complete chat message taken from `message_field`.
///
/// The field holds one OpenAI-format message object, an array of them, or a
/// string containing either as JSON. Content parts such as images are passed
/// through untouched. Records without the field pass through unchanged.
#[derive(Clone)]
pub struct ZiMultimodalInvoker {
    name: String,
    description: String,
    client: Arc<dyn ZiModelClient>,
    message_field: String,
    response_field: String,
}

impl ZiMultimodalInvoker {
    pub fn new(client: Arc<dyn ZiModelClient>) -> Self {
        Self {
            name: "MultimodalInvoker".to_string(),
            description: "Invokes a chat model with multimodal input".to_string(),
            client,
            message_field: "message".to_string(),
            response_field: "response".to_string(),
        }
    }

    /// Invoker backed by [`ZiOpenAiClient`].
    pub fn openai(config: ZiModelConfig) -> Result<Self> {
        let description = format!("Invokes {} model with multimodal input", config.model);
        let client = ZiOpenAiClient::new(config)?;
        Ok(Self::new(Arc::new(client)).with_description(description))
    }

    pub fn with_message_field(mut self, field: impl Into<String>) -> Self {
        self.message_field = field.into();
        self
    }

    pub fn with_response_field(mut self, field: impl Into<String>) -> Self {
        self.response_field = field.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn messages(&self, value: &Value) -> Result<Vec<ZiMessage>> {
        let parsed;
        let value = match value {
            Value::String(text) => {
                parsed = serde_json::from_str::<Value>(text).map_err(|e| {
                    ZiError::schema(format!(
                        "message field '{}' is not valid JSON: {e}",
                        self.message_field
                    ))
                })?;
                &parsed
            }
            other => other,
        };
        let invalid = |e: serde_json::Error| {
            ZiError::schema(format!(
                "message field '{}' is not a chat message: {e}",
                self.message_field
            ))
        };
        match value {
            Value::Object(_) => Ok(vec![ZiMessage::deserialize(value).map_err(invalid)?]),
            Value::Array(_) => Vec::<ZiMessage>::deserialize(value).map_err(invalid),
            other => Err(ZiError::schema(format!(
                "message field '{}' must be an object or array, got {}",
                self.message_field,
                type_name(other)
            ))),
        }
    }
}

impl fmt::Debug for ZiMultimodalInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiMultimodalInvoker")
            .field("name", &self.name)
            .field("client", &self.client)
            .field("message_field", &self.message_field)
            .field("response_field", &self.response_field)
            .finish()
    }
}

impl ZiOperator for ZiMultimodalInvoker {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn process_record(&self, mut record: ZiRecord) -> Result<ZiData> {
        let messages = match record.get(&self.message_field) {
            None => return Ok(ZiData::Record(record)),
            Some(value) => self.messages(value)?,
        };
        log::debug!("{}: invoking model with {} messages", self.name, messages.len());
        let reply = self.client.call(&messages)?;
        record.insert(self.response_field.clone(), Value::String(reply));
        Ok(ZiData::Record(record))
    }
}

/// Reads the [`ZiModelConfig`] part of a model operator configuration.
fn model_settings<'a>(
    operator: &str,
    config: &'a Value,
) -> Result<(&'a Map<String, Value>, ZiModelConfig)> {
    let obj = config
        .as_object()
        .ok_or_else(|| ZiError::validation(format!("{operator} config must be object")))?;
    let settings: ZiModelConfig = serde_json::from_value(config.clone())
        .map_err(|e| ZiError::validation(format!("{operator} config invalid: {e}")))?;
    if settings.model.trim().is_empty() {
        return Err(ZiError::validation(format!("{operator} requires 'model'")));
    }
    Ok((obj, settings))
}

/// Factory for [`ZiModelInvoker`] over [`ZiOpenAiClient`]; the config holds
/// [`ZiModelConfig`] fields plus `prompt_field`, `response_field`,
/// `system_prompt` and `name`.
pub fn model_invoke_factory(config: &Value) -> Result<Box<dyn ZiOperator>> {
    let (obj, settings) = model_settings("model.invoke", config)?;
    let mut invoker = ZiModelInvoker::openai(settings)?;
    if let Some(field) = obj.get("prompt_field").and_then(Value::as_str) {
        invoker = invoker.with_prompt_field(field);
    }
    if let Some(field) = obj.get("response_field").and_then(Value::as_str) {
        invoker = invoker.with_response_field(field);
    }
    if let Some(prompt) = obj.get("system_prompt").and_then(Value::as_str) {
        invoker = invoker.with_system_prompt(prompt);
    }
    if let Some(name) = obj.get("name").and_then(Value::as_str) {
        invoker = invoker.with_name(name);
    }
    Ok(Box::new(invoker))
}

/// Factory for [`ZiMultimodalInvoker`]; [`ZiModelConfig`] fields plus
/// `message_field`, `response_field` and `name`.
pub fn model_multimodal_factory(config: &Value) -> Result<Box<dyn ZiOperator>> {
    let (obj, settings) = model_settings("model.multimodal", config)?;
    let mut invoker = ZiMultimodalInvoker::openai(settings)?;
    if let Some(field) = obj.get("message_field").and_then(Value::as_str) {
        invoker = invoker.with_message_field(field);
    }
    if let Some(field) = obj.get("response_field").and_then(Value::as_str) {
        invoker = invoker.with_response_field(field);
    }
    if let Some(name) = obj.get("name").and_then(Value::as_str) {
        invoker = invoker.with_name(name);
    }
    Ok(Box::new(invoker))
}
