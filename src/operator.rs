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

//! # Ziflow Operator Module
//!
//! Operators are the atomic transformations of a pipeline. Every operator
//! declares a [`ZiCapability`] telling the pipeline which shapes it accepts:
//!
//! - **PerRecord**: the common case. Receives one record and returns one
//!   record (or a batch, e.g. an empty batch to drop the record). A missing
//!   input field is a soft no-op: the record is returned unchanged.
//! - **FanOut**: expands one record into many. Applied to a batch, the result
//!   must equal the concatenation of the per-record results, which lets the
//!   pipeline keep track of which input every child came from.
//! - **Collection**: consumes a record or a whole batch and defines its own
//!   batch semantics (folding, reordering).
//!
//! ## Implementing Custom Operators
//!
//! ```rust
//! use ziflow::errors::Result;
//! use ziflow::operator::ZiOperator;
//! use ziflow::record::{ZiData, ZiRecord};
//!
//! #[derive(Debug)]
//! struct Shout;
//!
//! impl ZiOperator for Shout {
//!     fn name(&self) -> &str {
//!         "shout"
//!     }
//!
//!     fn process_record(&self, mut record: ZiRecord) -> Result<ZiData> {
//!         if let Some(text) = record.get("text").and_then(|v| v.as_str()) {
//!             let loud = text.to_uppercase();
//!             record.insert("text".into(), loud.into());
//!         }
//!         Ok(record.into())
//!     }
//! }
//! ```

use crate::errors::{Result, ZiError};
use crate::record::{ZiData, ZiRecord, ZiRecordBatch};

/// Shapes an operator is able to consume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZiCapability {
    /// Accepts a single record only.
    PerRecord,
    /// One-to-many expansion; batch semantics are element-wise.
    FanOut,
    /// Accepts a record or a whole batch.
    Collection,
}

/// Contracts that every Ziflow operator must fulfill.
///
/// Operators hold no per-record state between invocations and never mutate
/// shared data: they take ownership of their input and return a new value.
/// This is what allows a pipeline to be shared across worker threads.
pub trait ZiOperator: std::fmt::Debug + Send + Sync {
    /// Unique, human-readable name used in logs and error messages.
    fn name(&self) -> &str;

    /// One-line description of what the operator does.
    fn description(&self) -> String {
        format!("{} operator", self.name())
    }

    /// Declared input shapes; per-record unless overridden.
    fn capability(&self) -> ZiCapability {
        ZiCapability::PerRecord
    }

    /// Processes a single record.
    fn process_record(&self, record: ZiRecord) -> Result<ZiData>;

    /// Indices of the batch records a collection operator keeps unchanged, in
    /// output order.
    ///
    /// `None` (the default) marks the batch result as a fold whose records have
    /// no single origin. When `Some`, the result of [`ZiOperator::process`] on
    /// the same batch must be exactly those records.
    fn retained_indices(&self, _batch: &ZiRecordBatch) -> Option<Vec<usize>> {
        None
    }

    /// Processes a record or a batch.
    ///
    /// The default implementation forwards records to
    /// [`ZiOperator::process_record`] and rejects batches. Collection and
    /// fan-out operators override it with their own batch semantics.
    fn process(&self, input: ZiData) -> Result<ZiData> {
        match input {
            ZiData::Record(record) => self.process_record(record),
            ZiData::Batch(batch) => Err(ZiError::contract(
                self.name(),
                format!(
                    "per-record operator received a batch of {} records",
                    batch.len()
                ),
            )),
        }
    }
}

/// Executes an operator while attaching its name to bare errors.
///
/// Errors that already identify their origin (operator, contract and model
/// errors) are passed through untouched.
pub fn execute_operator(operator: &dyn ZiOperator, input: ZiData) -> Result<ZiData> {
    operator.process(input).map_err(|err| wrap_error(operator, err))
}

/// Record-level counterpart of [`execute_operator`].
pub fn execute_operator_record(operator: &dyn ZiOperator, record: ZiRecord) -> Result<ZiData> {
    operator
        .process_record(record)
        .map_err(|err| wrap_error(operator, err))
}

fn wrap_error(operator: &dyn ZiOperator, err: ZiError) -> ZiError {
    if err.has_origin() {
        err
    } else {
        ZiError::operator(operator.name(), err.to_string())
    }
}
