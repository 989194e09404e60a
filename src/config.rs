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

//! # Pipeline Specifications
//!
//! Declarative pipeline descriptions, loadable from JSON or YAML:
//!
//! ```yaml
//! collection_mode: flatten
//! passthrough_fields: [id]
//! io_logging:
//!   enabled: true
//!   truncate_length: 200
//! workers: 4
//! steps:
//!   - operator: json.split
//!     config: {split_field: items}
//!   - operator: text.normalize
//!     config: {lower_case: true}
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, ZiError};
use crate::pipeline::{ZiCollectionMode, ZiIoLogConfig, ZiPipelineConfig};

/// One operator entry of a pipeline specification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZiStepSpec {
    pub operator: String,
    #[serde(default)]
    pub config: Value,
}

/// Serializable description of a complete pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZiPipelineSpec {
    pub collection_mode: ZiCollectionMode,
    pub passthrough_fields: Vec<String>,
    pub io_logging: ZiIoLogConfig,
    /// Worker count for concurrent execution; `None` uses every core.
    pub workers: Option<usize>,
    pub steps: Vec<ZiStepSpec>,
}

impl ZiPipelineSpec {
    pub fn from_json_str(source: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(source)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let spec: Self = serde_yaml::from_str(source)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Loads a specification, choosing the parser from the file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Self::from_json_str(&source),
            "yaml" | "yml" => Self::from_yaml_str(&source),
            _ => Err(ZiError::validation(format!(
                "unsupported pipeline spec extension for '{}'",
                path.display()
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(ZiError::validation("pipeline spec requires at least one step"));
        }
        if self.workers == Some(0) {
            return Err(ZiError::validation("workers must be greater than zero"));
        }
        if let Some(step) = self.steps.iter().find(|step| step.operator.trim().is_empty()) {
            return Err(ZiError::validation(format!(
                "pipeline step has empty operator name: {step:?}"
            )));
        }
        Ok(())
    }

    /// Execution settings carried by this specification.
    pub fn pipeline_config(&self) -> ZiPipelineConfig {
        ZiPipelineConfig {
            collection_mode: self.collection_mode,
            passthrough_fields: self.passthrough_fields.clone(),
            io_logging: self.io_logging.clone(),
        }
    }
}
