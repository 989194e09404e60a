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

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, ZiError};
use crate::operator::ZiOperator;
use crate::operators::filter::ZiFieldPath;
use crate::record::{ZiData, ZiRecord};

/// Custom text normalization function.
pub type ZiNormalizeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Settings for [`ZiTextNormalizer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZiTextNormalizeConfig {
    /// Dotted paths to normalize; `None` normalizes every string in the record.
    pub text_fields: Option<Vec<String>>,
    pub strip: bool,
    pub lower_case: bool,
    pub upper_case: bool,
    pub remove_extra_spaces: bool,
}

impl Default for ZiTextNormalizeConfig {
    fn default() -> Self {
        Self {
            text_fields: None,
            strip: true,
            lower_case: false,
            upper_case: false,
            remove_extra_spaces: true,
        }
    }
}

/// Cleans up whitespace and case of string fields.
#[derive(Clone)]
pub struct ZiTextNormalizer {
    name: String,
    description: String,
    config: ZiTextNormalizeConfig,
    paths: Option<Vec<ZiFieldPath>>,
    normalize_fn: Option<ZiNormalizeFn>,
}

impl ZiTextNormalizer {
    pub fn new(config: ZiTextNormalizeConfig) -> Result<Self> {
        if config.lower_case && config.upper_case {
            return Err(ZiError::validation(
                "text.normalize: lower_case and upper_case are mutually exclusive",
            ));
        }
        let paths = config
            .text_fields
            .as_ref()
            .map(|fields| {
                fields
                    .iter()
                    .map(|field| ZiFieldPath::parse(field))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;
        Ok(Self {
            name: "TextNormalizer".to_string(),
            description: "Normalizes text fields in JSON data".to_string(),
            config,
            paths,
            normalize_fn: None,
        })
    }

    /// Replaces the built-in normalization entirely.
    pub fn with_normalize_fn(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.normalize_fn = Some(Arc::new(f));
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

    pub fn config(&self) -> &ZiTextNormalizeConfig {
        &self.config
    }

    pub fn normalize(&self, text: &str) -> String {
        if let Some(f) = &self.normalize_fn {
            return f(text);
        }
        let mut out = if self.config.remove_extra_spaces {
            collapse_whitespace(text)
        } else {
            text.to_string()
        };
        if self.config.strip {
            out = out.trim().to_string();
        }
        if self.config.lower_case {
            out = out.to_lowercase();
        } else if self.config.upper_case {
            out = out.to_uppercase();
        }
        out
    }

    fn normalize_value(&self, value: &mut Value) {
        match value {
            Value::String(text) => *text = self.normalize(text),
            Value::Array(items) => items.iter_mut().for_each(|item| self.normalize_value(item)),
            Value::Object(map) => map.values_mut().for_each(|item| self.normalize_value(item)),
            _ => {}
        }
    }
}

/// Replaces every run of whitespace with a single space.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

impl fmt::Debug for ZiTextNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiTextNormalizer")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("custom", &self.normalize_fn.is_some())
            .finish()
    }
}

impl ZiOperator for ZiTextNormalizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn process_record(&self, mut record: ZiRecord) -> Result<ZiData> {
        match &self.paths {
            None => record
                .values_mut()
                .for_each(|value| self.normalize_value(value)),
            Some(paths) => {
                for path in paths {
                    if let Some(value) = path.resolve_mut(&mut record) {
                        self.normalize_value(value);
                    }
                }
            }
        }
        Ok(ZiData::Record(record))
    }
}

/// Factory that constructs [`ZiTextNormalizer`]; a null config uses defaults.
pub fn text_normalize_factory(config: &Value) -> Result<Box<dyn ZiOperator>> {
    let settings: ZiTextNormalizeConfig = match config {
        Value::Null => ZiTextNormalizeConfig::default(),
        Value::Object(_) => serde_json::from_value(config.clone())
            .map_err(|err| ZiError::validation(format!("text.normalize config invalid: {err}")))?,
        _ => return Err(ZiError::validation("text.normalize config must be object")),
    };
    let mut normalizer = ZiTextNormalizer::new(settings)?;
    if let Some(name) = config.get("name").and_then(Value::as_str) {
        normalizer = normalizer.with_name(name);
    }
    Ok(Box::new(normalizer))
}

/// Renames, removes and adds fields.
///
/// Steps run in that order, so an added field overrides a renamed one.
#[derive(Clone, Debug, Default)]
pub struct ZiJsonTransformer {
    rename_fields: Vec<(ZiFieldPath, ZiFieldPath)>,
    remove_fields: Vec<ZiFieldPath>,
    add_fields: Vec<(ZiFieldPath, Value)>,
}

impl ZiJsonTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, from: &str, to: &str) -> Result<Self> {
        self.rename_fields
            .push((ZiFieldPath::parse(from)?, ZiFieldPath::parse(to)?));
        Ok(self)
    }

    pub fn remove(mut self, field: &str) -> Result<Self> {
        self.remove_fields.push(ZiFieldPath::parse(field)?);
        Ok(self)
    }

    pub fn add(mut self, field: &str, value: Value) -> Result<Self> {
        self.add_fields.push((ZiFieldPath::parse(field)?, value));
        Ok(self)
    }
}

impl ZiOperator for ZiJsonTransformer {
    fn name(&self) -> &str {
        "json.transform"
    }

    fn description(&self) -> String {
        "Renames, removes and adds record fields".to_string()
    }

    fn process_record(&self, mut record: ZiRecord) -> Result<ZiData> {
        for (from, to) in &self.rename_fields {
            if let Some(value) = from.remove(&mut record) {
                if !to.set_value(&mut record, value) {
                    return Err(ZiError::schema(format!(
                        "cannot rename '{from}' to '{to}': a parent of the target is not an object"
                    )));
                }
            }
        }
        for field in &self.remove_fields {
            field.remove(&mut record);
        }
        for (field, value) in &self.add_fields {
            if !field.set_value(&mut record, value.clone()) {
                return Err(ZiError::schema(format!(
                    "cannot add '{field}': a parent of the target is not an object"
                )));
            }
        }
        Ok(ZiData::Record(record))
    }
}

/// Factory for [`ZiJsonTransformer`]:
/// `{"rename_fields": {from: to}, "remove_fields": [..], "add_fields": {field: value}}`.
pub fn json_transform_factory(config: &Value) -> Result<Box<dyn ZiOperator>> {
    let obj = config
        .as_object()
        .ok_or_else(|| ZiError::validation("json.transform config must be object"))?;

    let empty = Map::new();
    let mut transformer = ZiJsonTransformer::new();

    let renames = match obj.get("rename_fields") {
        None => &empty,
        Some(Value::Object(map)) => map,
        Some(_) => return Err(ZiError::validation("rename_fields must be an object")),
    };
    for (from, to) in renames {
        let to = to
            .as_str()
            .ok_or_else(|| ZiError::validation("rename_fields values must be strings"))?;
        transformer = transformer.rename(from, to)?;
    }

    if let Some(fields) = obj.get("remove_fields") {
        let fields = fields
            .as_array()
            .ok_or_else(|| ZiError::validation("remove_fields must be an array"))?;
        for field in fields {
            let field = field
                .as_str()
                .ok_or_else(|| ZiError::validation("remove_fields entries must be strings"))?;
            transformer = transformer.remove(field)?;
        }
    }

    let additions = match obj.get("add_fields") {
        None => &empty,
        Some(Value::Object(map)) => map,
        Some(_) => return Err(ZiError::validation("add_fields must be an object")),
    };
    for (field, value) in additions {
        transformer = transformer.add(field, value.clone())?;
    }

    Ok(Box::new(transformer))
}
