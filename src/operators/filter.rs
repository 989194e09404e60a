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

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, ZiError};
use crate::operator::ZiOperator;
use crate::record::{ZiData, ZiRecord};

/// Shared record predicate.
pub type ZiPredicate = Arc<dyn Fn(&ZiRecord) -> bool + Send + Sync>;

/// Dotted path into a record, e.g. `meta.source`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZiFieldPath {
    segments: Vec<String>,
}

impl ZiFieldPath {
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<String> = path
            .split('.')
            .map(|segment| segment.trim().to_string())
            .filter(|segment| !segment.is_empty())
            .collect();

        if segments.is_empty() {
            return Err(ZiError::validation("field path may not be empty"));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn resolve<'a>(&self, record: &'a ZiRecord) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = record.get(first)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Mutable counterpart of [`ZiFieldPath::resolve`].
    pub fn resolve_mut<'a>(&self, record: &'a mut ZiRecord) -> Option<&'a mut Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = record.get_mut(first)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get_mut(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Writes `value`, creating intermediate objects. Returns false when a
    /// non-object value sits on the path.
    pub fn set_value(&self, record: &mut ZiRecord, value: Value) -> bool {
        let Some((last, parents)) = self.segments.split_last() else {
            return false;
        };
        let mut current: &mut Map<String, Value> = record;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                _ => return false,
            };
        }
        current.insert(last.clone(), value);
        true
    }

    /// Removes the value at the path, returning it when present.
    pub fn remove(&self, record: &mut ZiRecord) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut current: &mut Map<String, Value> = record;
        for segment in parents {
            current = match current.get_mut(segment)? {
                Value::Object(map) => map,
                _ => return None,
            };
        }
        current.shift_remove(last)
    }
}

impl fmt::Display for ZiFieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Declarative record condition, usable from configuration files.
///
/// ```json
/// {"op": "all", "conditions": [
///     {"op": "exists", "path": "prompt"},
///     {"op": "gt", "path": "score", "value": 0.5}
/// ]}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ZiCondition {
    Exists { path: String },
    NotExists { path: String },
    Equals { path: String, value: Value },
    /// Missing fields count as not equal.
    NotEquals { path: String, value: Value },
    /// Substring for strings, element for arrays, key for objects.
    Contains { path: String, value: Value },
    Matches { path: String, pattern: String },
    Gt { path: String, value: f64 },
    Lt { path: String, value: f64 },
    All { conditions: Vec<ZiCondition> },
    Any { conditions: Vec<ZiCondition> },
    Not { condition: Box<ZiCondition> },
}

impl ZiCondition {
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|err| ZiError::validation(format!("invalid condition: {err}")))
    }

    /// Validates paths and patterns and turns the condition into a predicate.
    pub fn compile(&self) -> Result<ZiPredicate> {
        let predicate: ZiPredicate = match self {
            ZiCondition::Exists { path } => {
                let path = ZiFieldPath::parse(path)?;
                Arc::new(move |record: &ZiRecord| path.resolve(record).is_some())
            }
            ZiCondition::NotExists { path } => {
                let path = ZiFieldPath::parse(path)?;
                Arc::new(move |record: &ZiRecord| path.resolve(record).is_none())
            }
            ZiCondition::Equals { path, value } => {
                let path = ZiFieldPath::parse(path)?;
                let value = value.clone();
                Arc::new(move |record: &ZiRecord| path.resolve(record) == Some(&value))
            }
            ZiCondition::NotEquals { path, value } => {
                let path = ZiFieldPath::parse(path)?;
                let value = value.clone();
                Arc::new(move |record: &ZiRecord| path.resolve(record) != Some(&value))
            }
            ZiCondition::Contains { path, value } => {
                let path = ZiFieldPath::parse(path)?;
                let value = value.clone();
                Arc::new(move |record: &ZiRecord| match (path.resolve(record), &value) {
                    (Some(Value::String(text)), Value::String(needle)) => text.contains(needle.as_str()),
                    (Some(Value::Array(items)), needle) => items.contains(needle),
                    (Some(Value::Object(map)), Value::String(key)) => map.contains_key(key),
                    _ => false,
                })
            }
            ZiCondition::Matches { path, pattern } => {
                let path = ZiFieldPath::parse(path)?;
                let regex = Regex::new(pattern).map_err(|err| {
                    ZiError::validation(format!("invalid pattern '{pattern}': {err}"))
                })?;
                Arc::new(move |record: &ZiRecord| {
                    matches!(path.resolve(record), Some(Value::String(text)) if regex.is_match(text))
                })
            }
            ZiCondition::Gt { path, value } => {
                let path = ZiFieldPath::parse(path)?;
                let threshold = *value;
                Arc::new(move |record: &ZiRecord| {
                    path.resolve(record)
                        .and_then(Value::as_f64)
                        .map_or(false, |n| n > threshold)
                })
            }
            ZiCondition::Lt { path, value } => {
                let path = ZiFieldPath::parse(path)?;
                let threshold = *value;
                Arc::new(move |record: &ZiRecord| {
                    path.resolve(record)
                        .and_then(Value::as_f64)
                        .map_or(false, |n| n < threshold)
                })
            }
            ZiCondition::All { conditions } => {
                let predicates = compile_all(conditions)?;
                Arc::new(move |record: &ZiRecord| predicates.iter().all(|predicate| predicate(record)))
            }
            ZiCondition::Any { conditions } => {
                let predicates = compile_all(conditions)?;
                Arc::new(move |record: &ZiRecord| predicates.iter().any(|predicate| predicate(record)))
            }
            ZiCondition::Not { condition } => {
                let inner = condition.compile()?;
                Arc::new(move |record: &ZiRecord| !inner(record))
            }
        };
        Ok(predicate)
    }
}

fn compile_all(conditions: &[ZiCondition]) -> Result<Vec<ZiPredicate>> {
    conditions.iter().map(ZiCondition::compile).collect()
}

/// Keeps records satisfying a predicate; rejected records become an empty batch.
pub struct ZiJsonFilter {
    name: String,
    predicate: ZiPredicate,
}

impl ZiJsonFilter {
    pub fn new(predicate: impl Fn(&ZiRecord) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: "json.filter".to_string(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn from_condition(condition: &ZiCondition) -> Result<Self> {
        Ok(Self {
            name: "json.filter".to_string(),
            predicate: condition.compile()?,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn matches(&self, record: &ZiRecord) -> bool {
        (self.predicate)(record)
    }
}

impl fmt::Debug for ZiJsonFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiJsonFilter").field("name", &self.name).finish()
    }
}

impl ZiOperator for ZiJsonFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        "Filters records by condition".to_string()
    }

    fn process_record(&self, record: ZiRecord) -> Result<ZiData> {
        if self.matches(&record) {
            Ok(ZiData::Record(record))
        } else {
            Ok(ZiData::empty())
        }
    }
}

/// Factory that constructs [`ZiJsonFilter`] from `{"condition": {...}}`.
pub fn json_filter_factory(config: &Value) -> Result<Box<dyn ZiOperator>> {
    let obj = config
        .as_object()
        .ok_or_else(|| ZiError::validation("json.filter config must be object"))?;

    let condition = obj
        .get("condition")
        .ok_or_else(|| ZiError::validation("json.filter requires 'condition'"))?;

    let mut filter = ZiJsonFilter::from_condition(&ZiCondition::from_value(condition)?)?;
    if let Some(name) = obj.get("name").and_then(Value::as_str) {
        filter = filter.with_name(name);
    }
    Ok(Box::new(filter))
}
