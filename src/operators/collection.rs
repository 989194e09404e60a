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

//! # Collection Operators
//!
//! - [`ZiJsonSplitter`] fans one record out into one record per element of a
//!   list-valued field.
//! - [`ZiJsonAggregator`] folds a batch back into one record (or a filtered
//!   list of records).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, ZiError};
use crate::operator::{ZiCapability, ZiOperator};
use crate::operators::filter::{ZiCondition, ZiPredicate};
use crate::record::{ZiData, ZiRecord, ZiRecordBatch};

/// Expands a record into one child per element of `split_field`.
///
/// Each child is an independent copy of the parent with `split_field`
/// replaced by one element. Object elements additionally have their keys
/// lifted onto the child, so a later stage can address `text` rather than
/// `items.text`. When the field is missing or not a list the parent is
/// returned unchanged as a one-element batch.
#[derive(Clone, Debug)]
pub struct ZiJsonSplitter {
    name: String,
    split_field: String,
    output_key_map: Vec<(String, String)>,
    keep_original: bool,
    lift_objects: bool,
}

impl ZiJsonSplitter {
    pub fn new(split_field: impl Into<String>) -> Result<Self> {
        let split_field = split_field.into();
        if split_field.trim().is_empty() {
            return Err(ZiError::validation("json.split requires a non-empty 'split_field'"));
        }
        Ok(Self {
            name: "json.split".to_string(),
            split_field,
            output_key_map: Vec::new(),
            keep_original: true,
            lift_objects: true,
        })
    }

    /// Renames child fields, `from -> to`, after splitting.
    pub fn with_output_key_map<I, K, V>(mut self, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.output_key_map = mapping
            .into_iter()
            .map(|(from, to)| (from.into(), to.into()))
            .collect();
        self
    }

    /// When false, children keep only the split field and mapped parent fields.
    pub fn with_keep_original(mut self, keep_original: bool) -> Self {
        self.keep_original = keep_original;
        self
    }

    pub fn with_lift_objects(mut self, lift_objects: bool) -> Self {
        self.lift_objects = lift_objects;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn split_field(&self) -> &str {
        &self.split_field
    }

    fn is_mapped(&self, key: &str) -> bool {
        self.output_key_map.iter().any(|(from, _)| from == key)
    }

    fn child(&self, parent: &ZiRecord, element: &Value) -> ZiRecord {
        let mut child: ZiRecord = if self.keep_original {
            parent.clone()
        } else {
            parent
                .iter()
                .filter(|(key, _)| *key != &self.split_field && self.is_mapped(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        };
        child.insert(self.split_field.clone(), element.clone());

        if self.lift_objects {
            if let Value::Object(fields) = element {
                for (key, value) in fields {
                    if key != &self.split_field {
                        child.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        for (from, to) in &self.output_key_map {
            if from == to {
                continue;
            }
            if let Some(value) = child.shift_remove(from) {
                child.insert(to.clone(), value);
            }
        }
        child
    }

    fn split(&self, record: ZiRecord) -> ZiRecordBatch {
        match record.get(&self.split_field) {
            Some(Value::Array(elements)) => elements
                .iter()
                .map(|element| self.child(&record, element))
                .collect(),
            _ => vec![record],
        }
    }
}

impl ZiOperator for ZiJsonSplitter {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("Splits records on list field '{}'", self.split_field)
    }

    fn capability(&self) -> ZiCapability {
        ZiCapability::FanOut
    }

    fn process_record(&self, record: ZiRecord) -> Result<ZiData> {
        Ok(ZiData::Batch(self.split(record)))
    }

    fn process(&self, input: ZiData) -> Result<ZiData> {
        match input {
            ZiData::Record(record) => self.process_record(record),
            ZiData::Batch(batch) => Ok(ZiData::Batch(
                batch
                    .into_iter()
                    .flat_map(|record| self.split(record))
                    .collect(),
            )),
        }
    }
}

/// Factory that constructs [`ZiJsonSplitter`] from JSON configuration.
pub fn json_split_factory(config: &Value) -> Result<Box<dyn ZiOperator>> {
    let obj = config
        .as_object()
        .ok_or_else(|| ZiError::validation("json.split config must be object"))?;

    let split_field = obj
        .get("split_field")
        .and_then(Value::as_str)
        .ok_or_else(|| ZiError::validation("json.split requires string 'split_field'"))?;

    let mapping = match obj.get("output_key_map") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(from, to)| {
                to.as_str()
                    .map(|to| (from.clone(), to.to_string()))
                    .ok_or_else(|| ZiError::validation("output_key_map values must be strings"))
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => return Err(ZiError::validation("output_key_map must be an object")),
    };

    let mut splitter = ZiJsonSplitter::new(split_field)?
        .with_output_key_map(mapping)
        .with_keep_original(obj.get("keep_original").and_then(Value::as_bool).unwrap_or(true))
        .with_lift_objects(obj.get("lift_objects").and_then(Value::as_bool).unwrap_or(true));
    if let Some(name) = obj.get("name").and_then(Value::as_str) {
        splitter = splitter.with_name(name);
    }
    Ok(Box::new(splitter))
}

/// How an aggregator folds its batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZiAggregateStrategy {
    /// Collect records in order, under `aggregate_field` when one is set.
    #[default]
    List,
    /// Key-wise union; later records win on collisions.
    Merge,
}

impl FromStr for ZiAggregateStrategy {
    type Err = ZiError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "list" => Ok(Self::List),
            "merge" => Ok(Self::Merge),
            other => Err(ZiError::validation(format!(
                "unknown aggregation strategy '{other}', expected 'list' or 'merge'"
            ))),
        }
    }
}

/// Folds a batch of records into one record or a filtered list.
///
/// Applied to a single record the aggregator is a no-op. An empty batch folds
/// into an empty record.
#[derive(Clone)]
pub struct ZiJsonAggregator {
    name: String,
    aggregate_field: Option<String>,
    strategy: ZiAggregateStrategy,
    condition: Option<ZiPredicate>,
}

impl ZiJsonAggregator {
    pub fn new(strategy: ZiAggregateStrategy) -> Self {
        Self {
            name: "json.aggregate".to_string(),
            aggregate_field: None,
            strategy,
            condition: None,
        }
    }

    /// List aggregation under `field`.
    pub fn list(field: impl Into<String>) -> Self {
        Self::new(ZiAggregateStrategy::List).with_aggregate_field(field)
    }

    pub fn merge() -> Self {
        Self::new(ZiAggregateStrategy::Merge)
    }

    pub fn with_aggregate_field(mut self, field: impl Into<String>) -> Self {
        self.aggregate_field = Some(field.into());
        self
    }

    /// Only records satisfying `condition` take part in the fold.
    pub fn with_condition(
        mut self,
        condition: impl Fn(&ZiRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn with_predicate(mut self, predicate: ZiPredicate) -> Self {
        self.condition = Some(predicate);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn strategy(&self) -> ZiAggregateStrategy {
        self.strategy
    }

    fn aggregate(&self, batch: ZiRecordBatch) -> ZiData {
        if batch.is_empty() {
            return ZiData::Record(ZiRecord::new());
        }

        let selected: ZiRecordBatch = match &self.condition {
            Some(condition) => batch.into_iter().filter(|record| condition(record)).collect(),
            None => batch,
        };

        match self.strategy {
            ZiAggregateStrategy::List => match &self.aggregate_field {
                Some(field) => {
                    let mut out = ZiRecord::new();
                    out.insert(
                        field.clone(),
                        Value::Array(selected.into_iter().map(Value::Object).collect()),
                    );
                    ZiData::Record(out)
                }
                None => ZiData::Batch(selected),
            },
            ZiAggregateStrategy::Merge => {
                let mut merged = Map::new();
                for record in selected {
                    for (key, value) in record {
                        merged.insert(key, value);
                    }
                }
                ZiData::Record(merged)
            }
        }
    }
}

impl fmt::Debug for ZiJsonAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiJsonAggregator")
            .field("name", &self.name)
            .field("aggregate_field", &self.aggregate_field)
            .field("strategy", &self.strategy)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

impl ZiOperator for ZiJsonAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        match &self.aggregate_field {
            Some(field) => format!("Aggregates records into '{field}'"),
            None => "Aggregates records".to_string(),
        }
    }

    fn capability(&self) -> ZiCapability {
        ZiCapability::Collection
    }

    fn process_record(&self, record: ZiRecord) -> Result<ZiData> {
        Ok(ZiData::Record(record))
    }

    /// A field-less list keeps the selected records as they are.
    fn retained_indices(&self, batch: &ZiRecordBatch) -> Option<Vec<usize>> {
        if batch.is_empty()
            || self.strategy != ZiAggregateStrategy::List
            || self.aggregate_field.is_some()
        {
            return None;
        }
        Some(
            batch
                .iter()
                .enumerate()
                .filter(|(_, record)| self.condition.as_ref().map_or(true, |keep| keep(*record)))
                .map(|(index, _)| index)
                .collect(),
        )
    }

    fn process(&self, input: ZiData) -> Result<ZiData> {
        match input {
            ZiData::Record(record) => self.process_record(record),
            ZiData::Batch(batch) => Ok(self.aggregate(batch)),
        }
    }
}

/// Factory that constructs [`ZiJsonAggregator`] from JSON configuration.
pub fn json_aggregate_factory(config: &Value) -> Result<Box<dyn ZiOperator>> {
    let empty = Map::new();
    let obj = match config {
        Value::Null => &empty,
        Value::Object(map) => map,
        _ => return Err(ZiError::validation("json.aggregate config must be object")),
    };

    let strategy = match obj.get("strategy") {
        None | Some(Value::Null) => ZiAggregateStrategy::default(),
        Some(Value::String(name)) => name.parse()?,
        Some(_) => return Err(ZiError::validation("json.aggregate 'strategy' must be a string")),
    };

    let mut aggregator = ZiJsonAggregator::new(strategy);
    match obj.get("aggregate_field") {
        None | Some(Value::Null) => {}
        Some(Value::String(field)) => aggregator = aggregator.with_aggregate_field(field.clone()),
        Some(_) => {
            return Err(ZiError::validation(
                "json.aggregate 'aggregate_field' must be a string",
            ))
        }
    }
    if let Some(condition) = obj.get("condition") {
        aggregator = aggregator.with_predicate(ZiCondition::from_value(condition)?.compile()?);
    }
    if let Some(name) = obj.get("name").and_then(Value::as_str) {
        aggregator = aggregator.with_name(name);
    }
    Ok(Box::new(aggregator))
}
