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

//! # Ziflow Error Module
//!
//! This module defines the error types used throughout Ziflow.
//!
//! ## Error Categories
//!
//! - **Io**: Filesystem and stream errors
//! - **Schema**: A field holds a value of the wrong JSON type
//! - **Validation**: Invalid operator or pipeline configuration
//! - **Operator**: Failures raised inside an operator implementation
//! - **Pipeline**: Pipeline orchestration failures
//! - **Contract**: An operator received a shape it does not accept
//! - **Model**: The model backend failed (transport, auth, backend error, timeout)
//! - **Parse**: A JSON Lines source contained an unparsable line
//! - **Serde**: Serialization/deserialization errors
//! - **Internal**: Unexpected internal failures
//!
//! A missing field is never an error: per-record operators return their input
//! unchanged instead. Everything listed above is a hard failure and propagates
//! to the caller of [`crate::ZiPipeline::process`] unchanged.
//!
//! ## Usage
//!
//! ```rust
//! use ziflow::errors::{Result, ZiError};
//!
//! fn example(value: &serde_json::Value) -> Result<&str> {
//!     value
//!         .as_str()
//!         .ok_or_else(|| ZiError::schema("prompt must be a string"))
//! }
//! ```

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience result type used throughout Ziflow.
pub type Result<T> = std::result::Result<T, ZiError>;

/// Canonical error enumeration for Ziflow.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq)]
pub enum ZiError {
    /// Errors originating from filesystem or stream IO.
    #[error("io error: {0}")]
    Io(String),

    /// Errors caused by a field holding an incompatible JSON type.
    #[error("schema error: {message}")]
    Schema { message: String },

    /// Validation errors triggered by invalid parameters or inputs.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Any failure raised by an operator implementation.
    #[error("operator '{operator}' failed: {message}")]
    Operator { operator: String, message: String },

    /// Failures that occur while orchestrating a pipeline.
    #[error("pipeline error at stage '{stage}': {message}")]
    Pipeline { stage: String, message: String },

    /// An operator was handed a shape it does not declare support for.
    #[error("operator '{operator}' contract violation: {message}")]
    Contract { operator: String, message: String },

    /// Failures reported by a model-invocation client.
    #[error("model client '{client}' failed: {message}")]
    Model { client: String, message: String },

    /// A JSON Lines source produced a line that is not a JSON object.
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Wrapper for serde-style serialization issues.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Catch-all variant for unexpected situations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for ZiError {
    fn from(err: io::Error) -> Self {
        ZiError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ZiError {
    fn from(err: serde_json::Error) -> Self {
        ZiError::Serde(err.to_string())
    }
}

impl From<serde_yaml::Error> for ZiError {
    fn from(err: serde_yaml::Error) -> Self {
        ZiError::Serde(err.to_string())
    }
}

impl ZiError {
    /// Helper to construct simple validation errors.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        ZiError::Validation {
            message: message.into(),
        }
    }

    /// Helper to construct schema errors.
    pub fn schema<T: Into<String>>(message: T) -> Self {
        ZiError::Schema {
            message: message.into(),
        }
    }

    /// Helper to construct operator errors.
    pub fn operator(name: impl Into<String>, message: impl Into<String>) -> Self {
        ZiError::Operator {
            operator: name.into(),
            message: message.into(),
        }
    }

    /// Helper to construct pipeline errors.
    pub fn pipeline(stage: impl Into<String>, message: impl Into<String>) -> Self {
        ZiError::Pipeline {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Helper to construct contract violations.
    pub fn contract(operator: impl Into<String>, message: impl Into<String>) -> Self {
        ZiError::Contract {
            operator: operator.into(),
            message: message.into(),
        }
    }

    /// Helper to construct model client errors.
    pub fn model(client: impl Into<String>, message: impl Into<String>) -> Self {
        ZiError::Model {
            client: client.into(),
            message: message.into(),
        }
    }

    /// Helper to construct line-level parse errors.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        ZiError::Parse {
            line,
            message: message.into(),
        }
    }

    /// Helper to construct internal errors.
    pub fn internal<T: Into<String>>(message: T) -> Self {
        ZiError::Internal(message.into())
    }

    /// Whether the error already names the component that raised it.
    pub fn has_origin(&self) -> bool {
        matches!(
            self,
            ZiError::Operator { .. } | ZiError::Contract { .. } | ZiError::Model { .. }
        )
    }
}
