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

//! # Ziflow Record Module
//!
//! A record is a single JSON object. Records have no identity beyond their
//! contents, so equality is structural and keys keep their insertion order.
//!
//! A pipeline's working value is either one record or an ordered batch of
//! records. [`ZiData`] carries that shape explicitly so the pipeline can
//! dispatch on it instead of guessing at runtime.
//!
//! ```rust
//! use serde_json::json;
//! use ziflow::record::{record_from_value, ZiData};
//!
//! let record = record_from_value(json!({"id": "t1", "text": "hello"})).unwrap();
//! let data = ZiData::from(record);
//! assert!(!data.is_batch());
//! assert_eq!(data.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, ZiError};

/// A single JSON object flowing through a pipeline.
pub type ZiRecord = Map<String, Value>;

/// Ordered sequence of records in flight together.
pub type ZiRecordBatch = Vec<ZiRecord>;

/// The shape of a pipeline's working value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZiData {
    Record(ZiRecord),
    Batch(ZiRecordBatch),
}

impl ZiData {
    /// Empty batch, the result of dropping a record.
    pub fn empty() -> Self {
        ZiData::Batch(Vec::new())
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, ZiData::Batch(_))
    }

    /// Number of leaf records reachable from this value.
    pub fn len(&self) -> usize {
        match self {
            ZiData::Record(_) => 1,
            ZiData::Batch(batch) => batch.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the record when the value is a single record.
    pub fn as_record(&self) -> Option<&ZiRecord> {
        match self {
            ZiData::Record(record) => Some(record),
            ZiData::Batch(_) => None,
        }
    }

    /// Returns the batch when the value is a batch.
    pub fn as_batch(&self) -> Option<&ZiRecordBatch> {
        match self {
            ZiData::Record(_) => None,
            ZiData::Batch(batch) => Some(batch),
        }
    }

    /// Borrows every leaf record in order.
    pub fn leaves(&self) -> Vec<&ZiRecord> {
        match self {
            ZiData::Record(record) => vec![record],
            ZiData::Batch(batch) => batch.iter().collect(),
        }
    }

    /// Consumes the value into its leaf records.
    pub fn into_leaves(self) -> ZiRecordBatch {
        match self {
            ZiData::Record(record) => vec![record],
            ZiData::Batch(batch) => batch,
        }
    }

    /// Converts into a plain JSON value (object or array of objects).
    pub fn to_value(&self) -> Value {
        match self {
            ZiData::Record(record) => Value::Object(record.clone()),
            ZiData::Batch(batch) => {
                Value::Array(batch.iter().cloned().map(Value::Object).collect())
            }
        }
    }

    /// Parses a JSON value: an object is a record, an array of objects a batch.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(ZiData::Record(map)),
            Value::Array(items) => items
                .into_iter()
                .map(record_from_value)
                .collect::<Result<ZiRecordBatch>>()
                .map(ZiData::Batch),
            other => Err(ZiError::schema(format!(
                "expected JSON object or array of objects, got {}",
                type_name(&other)
            ))),
        }
    }
}

impl From<ZiRecord> for ZiData {
    fn from(record: ZiRecord) -> Self {
        ZiData::Record(record)
    }
}

impl From<ZiRecordBatch> for ZiData {
    fn from(batch: ZiRecordBatch) -> Self {
        ZiData::Batch(batch)
    }
}

/// Converts a JSON value into a record, rejecting non-objects.
pub fn record_from_value(value: Value) -> Result<ZiRecord> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ZiError::schema(format!(
            "expected JSON object, got {}",
            type_name(&other)
        ))),
    }
}

/// Short JSON type name used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
