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

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{Result, ZiError};
use crate::operator::ZiOperator;
use crate::record::{ZiData, ZiRecord};

/// Stamps each record with a random v4 UUID.
#[derive(Clone, Debug)]
pub struct ZiIdAdder {
    field: String,
    overwrite: bool,
}

impl ZiIdAdder {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            overwrite: false,
        }
    }

    /// Replace an id that is already present.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

impl Default for ZiIdAdder {
    fn default() -> Self {
        Self::new("id")
    }
}

impl ZiOperator for ZiIdAdder {
    fn name(&self) -> &str {
        "system.id"
    }

    fn description(&self) -> String {
        format!("Adds a unique identifier under '{}'", self.field)
    }

    fn process_record(&self, mut record: ZiRecord) -> Result<ZiData> {
        if self.overwrite || !record.contains_key(&self.field) {
            record.insert(
                self.field.clone(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }
        Ok(ZiData::Record(record))
    }
}

pub fn id_adder_factory(config: &Value) -> Result<Box<dyn ZiOperator>> {
    let field = config
        .get("field")
        .and_then(Value::as_str)
        .unwrap_or("id");
    if field.trim().is_empty() {
        return Err(ZiError::validation("system.id field must not be empty"));
    }
    let overwrite = config
        .get("overwrite")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok(Box::new(ZiIdAdder::new(field).with_overwrite(overwrite)))
}

/// Stamps each record with the current UTC time.
///
/// Without a format the value is RFC 3339; otherwise `format` is a chrono
/// strftime pattern.
#[derive(Clone, Debug)]
pub struct ZiTimestampAdder {
    field: String,
    format: Option<String>,
}

impl ZiTimestampAdder {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            format: None,
        }
    }

    /// Uses a strftime pattern instead of RFC 3339. Unknown specifiers are
    /// rejected here rather than on the first record.
    pub fn with_format(mut self, format: impl Into<String>) -> Result<Self> {
        let format = format.into();
        if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
            return Err(ZiError::validation(format!(
                "system.timestamp: invalid format '{format}'"
            )));
        }
        self.format = Some(format);
        Ok(self)
    }

    fn now(&self) -> Result<String> {
        let now = Utc::now();
        match &self.format {
            Some(format) => {
                let mut out = String::new();
                write!(out, "{}", now.format(format)).map_err(|_| {
                    ZiError::schema(format!("cannot render timestamp with format '{format}'"))
                })?;
                Ok(out)
            }
            None => Ok(now.to_rfc3339()),
        }
    }
}

impl Default for ZiTimestampAdder {
    fn default() -> Self {
        Self::new("timestamp")
    }
}

impl ZiOperator for ZiTimestampAdder {
    fn name(&self) -> &str {
        "system.timestamp"
    }

    fn process_record(&self, mut record: ZiRecord) -> Result<ZiData> {
        record.insert(self.field.clone(), Value::String(self.now()?));
        Ok(ZiData::Record(record))
    }
}

pub fn timestamp_adder_factory(config: &Value) -> Result<Box<dyn ZiOperator>> {
    let field = config
        .get("field")
        .and_then(Value::as_str)
        .unwrap_or("timestamp");
    if field.trim().is_empty() {
        return Err(ZiError::validation("system.timestamp field must not be empty"));
    }
    let mut adder = ZiTimestampAdder::new(field);
    if let Some(format) = config.get("format").and_then(Value::as_str) {
        adder = adder.with_format(format)?;
    }
    Ok(Box::new(adder))
}
