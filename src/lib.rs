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

//! # Ziflow Core Library
//!
//! Composable transformation pipelines over JSON records. A pipeline threads a
//! record (or a batch of records) through an ordered list of operators; the
//! working value can fan out into a batch and be folded back into a record at
//! any stage.
//!
//! ## Module Overview
//!
//! - **record**: [`ZiRecord`], [`ZiRecordBatch`] and the [`ZiData`] working value
//! - **operator**: The [`ZiOperator`] trait and capability classes
//! - **operators**: Built-in operators (split, aggregate, filter, normalize, model invocation, ...)
//! - **pipeline**: [`ZiPipeline`] dispatch, collection modes, passthrough fields and the
//!   [`ZiPipelineBuilder`] registry
//! - **executor**: [`ZiConcurrentExecutor`] for independent records on a bounded worker pool
//! - **config**: Declarative JSON/YAML pipeline specifications
//! - **io**: JSON Lines loading and saving
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use ziflow::operators::collection::ZiJsonSplitter;
//! use ziflow::operators::transform::{ZiTextNormalizeConfig, ZiTextNormalizer};
//! use ziflow::{record_from_value, ZiPipeline};
//!
//! let mut pipeline = ZiPipeline::default();
//! pipeline
//!     .add(ZiJsonSplitter::new("items").unwrap())
//!     .add(ZiTextNormalizer::new(ZiTextNormalizeConfig::default()).unwrap())
//!     .set_passthrough_fields(["id"]);
//!
//! let input = record_from_value(json!({"id": "t1", "items": [{"text": " A  B "}]})).unwrap();
//! let output = pipeline.process(input).unwrap();
//! assert_eq!(output.len(), 1);
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ZiError>`. Operators signal hard failures
//! through errors; a missing input field is a soft no-op.

pub mod config;
pub mod errors;
pub mod executor;
pub mod io;
pub mod operator;
pub mod operators;
pub mod pipeline;
pub mod record;

pub use config::{ZiPipelineSpec, ZiStepSpec};
pub use errors::{Result, ZiError};
pub use executor::{ZiConcurrentExecutor, ZiExecutionSummary};
pub use io::{ZiJsonLines, ZiJsonLoader, ZiJsonSaver};
pub use operator::{execute_operator, execute_operator_record, ZiCapability, ZiOperator};
pub use pipeline::{
    ZiCollectionMode, ZiIoLogConfig, ZiOperatorFactory, ZiPipeline, ZiPipelineBuilder,
    ZiPipelineConfig,
};
pub use record::{record_from_value, ZiData, ZiRecord, ZiRecordBatch};

pub use operators::collection::{ZiAggregateStrategy, ZiJsonAggregator, ZiJsonSplitter};
pub use operators::filter::{ZiCondition, ZiFieldPath, ZiJsonFilter};
pub use operators::model::{
    ZiMessage, ZiModelClient, ZiModelConfig, ZiModelInvoker, ZiMultimodalInvoker, ZiOpenAiClient,
};
pub use operators::structure::{ZiJsonStructureExtractor, ZiStructureConfig};
pub use operators::system::{ZiIdAdder, ZiTimestampAdder};
pub use operators::transform::{ZiJsonTransformer, ZiTextNormalizeConfig, ZiTextNormalizer};
