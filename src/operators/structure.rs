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


//! # Structure Extraction
//!
//! [`ZiJsonStructureExtractor`] describes the keys of a record: the dotted
//! path of every field and, optionally, the JSON types found there. Arrays of
//! objects are described through their first element under `key[*]`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, ZiError};
use crate::operator::ZiOperator;
use crate::record::{type_name, ZiData, ZiRecord};

/// Array elements inspected when typing an array.
const ARRAY_SAMPLE: usize = 5;

/// Settings for [`ZiJsonStructureExtractor`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZiStructureConfig {
    pub extract_types: bool,
    pub extract_nested: bool,
    pub output_field: String,
    /// Keep the input fields next to the structure.
    pub include_original: bool,
}

impl Default for ZiStructureConfig {
    fn default() -> Self {
        Self {
            extract_types: true,
            extract_nested: true,
            output_field: "structure".to_string(),
            include_original: true,
        }
    }
}

/// Writes a path/type summary of each record into `output_field`.
///
/// ```json
/// {"user": {"name": "A"}} -> {"user": {...}, "structure": {
///     "user": {"path": "user", "types": ["object"]},
///     "user.name": {"path": "user.name", "types": ["string"]}
/// }}
/// ```
#[derive(Clone, Debug)]
pub struct ZiJsonStructureExtractor {
    name: String,
    config: ZiStructureConfig,
}

impl ZiJsonStructureExtractor {
    pub fn new(config: ZiStructureConfig) -> Result<Self> {
        if config.output_field.trim().is_empty() {
            return Err(ZiError::validation(
                "json.structure requires a non-empty 'output_field'",
            ));
        }
        Ok(Self {
            name: "json.structure".to_string(),
            config,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &ZiStructureConfig {
        &self.config
    }

    /// Path entries for every key of `object`, nested keys following their parent.
    pub fn extract(&self, object: &Map<String, Value>) -> Map<String, Value> {
        let mut structure = Map::new();
        self.walk(object, None, &mut structure);
        structure
    }

    fn walk(&self, object: &Map<String, Value>, prefix: Option<&str>, out: &mut Map<String, Value>) {
        for (key, value) in object {
            let path = match prefix {
                Some(prefix) => format!("{prefix}.{key}"),
                None => key.clone(),
            };

            let mut info = Map::new();
            info.insert("path".to_string(), Value::String(path.clone()));
            if self.config.extract_types {
                let types = value_types(value).into_iter().map(Value::from).collect();
                info.insert("types".to_string(), Value::Array(types));
            }
            out.insert(path.clone(), Value::Object(info));

            if !self.config.extract_nested {
                continue;
            }
            match value {
                Value::Object(inner) => self.walk(inner, Some(&path), out),
                Value::Array(items) => {
                    if let Some(Value::Object(sample)) = items.first() {
                        self.walk(sample, Some(&format!("{path}[*]")), out);
                    }
                }
                _ => {}
            }
        }
    }
}

fn scalar_type(value: &Value) -> &'static str {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        other => type_name(other),
    }
}

/// Sorted type tags for a value; arrays also report sampled element types.
fn value_types(value: &Value) -> BTreeSet<String> {
    let mut types = BTreeSet::new();
    types.insert(scalar_type(value).to_string());
    if let Value::Array(items) = value {
        for item in items.iter().take(ARRAY_SAMPLE) {
            match item {
                Value::Object(_) => {
                    types.insert("object_array".to_string());
                    break;
                }
                Value::Array(_) => {
                    types.insert("array_array".to_string());
                }
                scalar => {
                    types.insert(format!("{}_array", scalar_type(scalar)));
                }
            }
        }
    }
    types
}

impl ZiOperator for ZiJsonStructureExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        "Extracts structure information from JSON data".to_string()
    }

    fn process_record(&self, record: ZiRecord) -> Result<ZiData> {
        let structure = Value::Object(self.extract(&record));
        let mut out = if self.config.include_original {
            record
        } else {
            ZiRecord::new()
        };
        out.insert(self.config.output_field.clone(), structure);
        Ok(ZiData::Record(out))
    }
}

/// Factory that constructs [`ZiJsonStructureExtractor`]; a null config uses defaults.
pub fn json_structure_factory(config: &Value) -> Result<Box<dyn ZiOperator>> {
    let settings: ZiStructureConfig = match config {
        Value::Null => ZiStructureConfig::default(),
        Value::Object(_) => serde_json::from_value(config.clone())
            .map_err(|err| ZiError::validation(format!("json.structure config invalid: {err}")))?,
        _ => return Err(ZiError::validation("json.structure config must be object")),
    };
    let mut extractor = ZiJsonStructureExtractor::new(settings)?;
    if let Some(name) = config.get("name").and_then(Value::as_str) {
        extractor = extractor.with_name(name);
    }
    Ok(Box::new(extractor))
}
