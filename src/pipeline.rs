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

//! # Ziflow Pipeline Module
//!
//! A [`ZiPipeline`] threads a single working value through an ordered list of
//! operators. The value is either one record or a batch, and its shape may
//! change after any stage: a splitter turns a record into a batch, an
//! aggregator folds a batch back into a record.
//!
//! ## Dispatch
//!
//! | working value | operator capability | behaviour |
//! |---|---|---|
//! | record | any | operator receives the record |
//! | batch | fan-out | operator runs per element, results concatenated |
//! | batch | collection | operator receives the whole batch |
//! | batch | per-record, `Flatten` | operator runs per element, results flattened |
//! | batch | per-record, `Nested` | contract violation error |
//! | empty batch | per-record | stage is skipped |
//!
//! ## Passthrough fields
//!
//! Configured passthrough fields are captured from the input before the first
//! stage and written back, verbatim, onto every output record that descends
//! 1:1 or 1:N from that input. Records a collection operator passes through
//! unchanged keep their origin. Records produced by folding a batch have no
//! single origin and are left alone.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ZiPipelineSpec;
use crate::errors::{Result, ZiError};
use crate::operator::{execute_operator, execute_operator_record, ZiCapability, ZiOperator};
use crate::record::{ZiData, ZiRecord, ZiRecordBatch};

/// How per-record operators are applied when the working value is a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZiCollectionMode {
    /// Apply the operator to every element and flatten the results.
    #[default]
    Flatten,
    /// Hand the batch over as one unit; only batch-capable operators accept it.
    Nested,
}

/// Operator input/output logging.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZiIoLogConfig {
    pub enabled: bool,
    /// Spaces per indentation level in logged JSON.
    pub indent: usize,
    /// Maximum number of characters logged per value.
    pub truncate_length: Option<usize>,
}

impl Default for ZiIoLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            indent: 2,
            truncate_length: None,
        }
    }
}

impl ZiIoLogConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Renders a value the way it is written to the IO log.
    pub fn render(&self, value: &Value) -> String {
        let indent = " ".repeat(self.indent);
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        let text = match value.serialize(&mut serializer) {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => value.to_string(),
        };
        match self.truncate_length {
            Some(limit) if text.chars().count() > limit => {
                let mut truncated: String = text.chars().take(limit).collect();
                truncated.push_str("...");
                truncated
            }
            _ => text,
        }
    }
}

/// Execution settings for a pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZiPipelineConfig {
    pub collection_mode: ZiCollectionMode,
    pub passthrough_fields: Vec<String>,
    pub io_logging: ZiIoLogConfig,
}

/// A record annotated with the index of the input record it descends from.
#[derive(Debug)]
struct ZiTracked {
    record: ZiRecord,
    origin: Option<usize>,
}

/// The working value as seen by the pipeline, lineage included.
#[derive(Debug)]
enum ZiWorking {
    Record(ZiTracked),
    Batch(Vec<ZiTracked>),
}

impl ZiWorking {
    fn from_input(input: ZiData) -> Self {
        match input {
            ZiData::Record(record) => ZiWorking::Record(ZiTracked {
                record,
                origin: Some(0),
            }),
            ZiData::Batch(batch) => ZiWorking::Batch(
                batch
                    .into_iter()
                    .enumerate()
                    .map(|(index, record)| ZiTracked {
                        record,
                        origin: Some(index),
                    })
                    .collect(),
            ),
        }
    }

    /// Wraps an operator result, attributing every leaf to `origin`.
    fn from_output(output: ZiData, origin: Option<usize>) -> Self {
        match output {
            ZiData::Record(record) => ZiWorking::Record(ZiTracked { record, origin }),
            ZiData::Batch(batch) => ZiWorking::Batch(
                batch
                    .into_iter()
                    .map(|record| ZiTracked { record, origin })
                    .collect(),
            ),
        }
    }

    fn len(&self) -> usize {
        match self {
            ZiWorking::Record(_) => 1,
            ZiWorking::Batch(items) => items.len(),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            ZiWorking::Record(_) => "record",
            ZiWorking::Batch(_) => "batch",
        }
    }

    fn to_value(&self) -> Value {
        match self {
            ZiWorking::Record(item) => Value::Object(item.record.clone()),
            ZiWorking::Batch(items) => Value::Array(
                items
                    .iter()
                    .map(|item| Value::Object(item.record.clone()))
                    .collect(),
            ),
        }
    }
}

type ZiProgress<'a> = &'a dyn Fn(&str, usize, usize);

/// Ordered sequence of operators plus collection mode and passthrough fields.
#[derive(Debug, Default)]
pub struct ZiPipeline {
    operators: Vec<Box<dyn ZiOperator>>,
    config: ZiPipelineConfig,
}

impl ZiPipeline {
    /// Constructs a flatten-mode pipeline from a list of operators.
    pub fn new(operators: Vec<Box<dyn ZiOperator>>) -> Self {
        Self::with_config(operators, ZiPipelineConfig::default())
    }

    pub fn with_config(operators: Vec<Box<dyn ZiOperator>>, config: ZiPipelineConfig) -> Self {
        let mut pipeline = ZiPipeline {
            operators,
            config: ZiPipelineConfig::default(),
        };
        pipeline.config.collection_mode = config.collection_mode;
        pipeline.config.io_logging = config.io_logging;
        pipeline.set_passthrough_fields(config.passthrough_fields);
        pipeline
    }

    /// Appends an operator, returning the pipeline for chaining.
    pub fn add(&mut self, operator: impl ZiOperator + 'static) -> &mut Self {
        self.operators.push(Box::new(operator));
        self
    }

    pub fn add_boxed(&mut self, operator: Box<dyn ZiOperator>) -> &mut Self {
        self.operators.push(operator);
        self
    }

    /// Replaces the passthrough field set; duplicates are ignored.
    pub fn set_passthrough_fields<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        self.config.passthrough_fields = unique;
        self
    }

    pub fn set_collection_mode(&mut self, mode: ZiCollectionMode) -> &mut Self {
        self.config.collection_mode = mode;
        self
    }

    pub fn set_io_logging(&mut self, io_logging: ZiIoLogConfig) -> &mut Self {
        self.config.io_logging = io_logging;
        self
    }

    pub fn config(&self) -> &ZiPipelineConfig {
        &self.config
    }

    pub fn collection_mode(&self) -> ZiCollectionMode {
        self.config.collection_mode
    }

    pub fn passthrough_fields(&self) -> &[String] {
        &self.config.passthrough_fields
    }

    pub fn operators(&self) -> impl Iterator<Item = &dyn ZiOperator> {
        self.operators.iter().map(|op| op.as_ref())
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Ensures the pipeline contains at least one stage.
    pub fn validate(&self) -> Result<()> {
        if self.operators.is_empty() {
            return Err(ZiError::pipeline("pipeline", "no stages configured"));
        }
        Ok(())
    }

    /// Runs every operator in order over a record or a batch.
    ///
    /// Operator errors abort the call and propagate unchanged.
    pub fn process(&self, input: impl Into<ZiData>) -> Result<ZiData> {
        self.run(input.into(), None)
    }

    /// Convenience wrapper for a single input record.
    pub fn process_record(&self, record: ZiRecord) -> Result<ZiData> {
        self.run(ZiData::Record(record), None)
    }

    /// Like [`ZiPipeline::process`], reporting `(operator, leaves before, leaves after)`
    /// after each stage.
    pub fn process_with_progress(
        &self,
        input: impl Into<ZiData>,
        progress: impl Fn(&str, usize, usize),
    ) -> Result<ZiData> {
        self.run(input.into(), Some(&progress))
    }

    fn run(&self, input: ZiData, progress: Option<ZiProgress<'_>>) -> Result<ZiData> {
        let snapshots = self.snapshot(&input);
        let mut working = ZiWorking::from_input(input);

        for (index, operator) in self.operators.iter().enumerate() {
            let before = working.len();
            self.log_io(index, operator.as_ref(), "input", &working);
            working = self.run_stage(index, operator.as_ref(), working)?;
            self.log_io(index, operator.as_ref(), "output", &working);

            log::debug!(
                "stage {} '{}': {} -> {} {}",
                index,
                operator.name(),
                before,
                working.len(),
                working.shape()
            );
            if let Some(progress) = progress {
                progress(operator.name(), before, working.len());
            }
        }

        Ok(Self::finalize(working, &snapshots))
    }

    fn run_stage(
        &self,
        index: usize,
        operator: &dyn ZiOperator,
        working: ZiWorking,
    ) -> Result<ZiWorking> {
        match working {
            ZiWorking::Record(item) => {
                let output = execute_operator(operator, ZiData::Record(item.record))?;
                Ok(ZiWorking::from_output(output, item.origin))
            }
            ZiWorking::Batch(items) => match operator.capability() {
                ZiCapability::FanOut => Self::map_elements(operator, items),
                ZiCapability::Collection => Self::collect_batch(operator, items),
                // Nothing left to process, e.g. every record was filtered out.
                ZiCapability::PerRecord if items.is_empty() => Ok(ZiWorking::Batch(items)),
                ZiCapability::PerRecord => match self.config.collection_mode {
                    ZiCollectionMode::Flatten => Self::map_elements(operator, items),
                    ZiCollectionMode::Nested => Err(ZiError::contract(
                        operator.name(),
                        format!(
                            "stage {index} received a batch of {} records in nested mode; \
                             only fan-out and collection operators accept batches",
                            items.len()
                        ),
                    )),
                },
            },
        }
    }

    /// Hands a whole batch to a collection operator.
    ///
    /// Records the operator keeps unchanged (see
    /// [`ZiOperator::retained_indices`]) keep their origin; anything else is a
    /// fold and has none.
    fn collect_batch(operator: &dyn ZiOperator, items: Vec<ZiTracked>) -> Result<ZiWorking> {
        let (batch, origins): (ZiRecordBatch, Vec<Option<usize>>) =
            items.into_iter().map(|item| (item.record, item.origin)).unzip();

        let Some(indices) = operator.retained_indices(&batch) else {
            let output = execute_operator(operator, ZiData::Batch(batch))?;
            return Ok(ZiWorking::from_output(output, None));
        };

        let mut slots: Vec<Option<ZiRecord>> = batch.into_iter().map(Some).collect();
        let mut out = Vec::with_capacity(indices.len());
        for index in indices {
            let record = slots
                .get_mut(index)
                .and_then(Option::take)
                .ok_or_else(|| {
                    ZiError::contract(
                        operator.name(),
                        format!("retained index {index} is out of range or repeated"),
                    )
                })?;
            out.push(ZiTracked {
                record,
                origin: origins[index],
            });
        }
        Ok(ZiWorking::Batch(out))
    }

    /// Applies an operator to each element, flattening batch results one level.
    fn map_elements(operator: &dyn ZiOperator, items: Vec<ZiTracked>) -> Result<ZiWorking> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match execute_operator_record(operator, item.record)? {
                ZiData::Record(record) => out.push(ZiTracked {
                    record,
                    origin: item.origin,
                }),
                ZiData::Batch(batch) => out.extend(batch.into_iter().map(|record| ZiTracked {
                    record,
                    origin: item.origin,
                })),
            }
        }
        Ok(ZiWorking::Batch(out))
    }

    /// Captures passthrough values per input record, indexed by origin.
    fn snapshot(&self, input: &ZiData) -> Vec<ZiRecord> {
        let fields = &self.config.passthrough_fields;
        if fields.is_empty() {
            return Vec::new();
        }
        input
            .leaves()
            .into_iter()
            .map(|record| {
                fields
                    .iter()
                    .filter_map(|field| {
                        record
                            .get(field)
                            .map(|value| (field.clone(), value.clone()))
                    })
                    .collect()
            })
            .collect()
    }

    fn finalize(working: ZiWorking, snapshots: &[ZiRecord]) -> ZiData {
        let restore = |item: ZiTracked| -> ZiRecord {
            let mut record = item.record;
            if let Some(saved) = item.origin.and_then(|origin| snapshots.get(origin)) {
                for (field, value) in saved {
                    record.insert(field.clone(), value.clone());
                }
            }
            record
        };
        match working {
            ZiWorking::Record(item) => ZiData::Record(restore(item)),
            ZiWorking::Batch(items) => ZiData::Batch(items.into_iter().map(restore).collect()),
        }
    }

    fn log_io(&self, index: usize, operator: &dyn ZiOperator, direction: &str, working: &ZiWorking) {
        let io = &self.config.io_logging;
        if !io.enabled || !log::log_enabled!(log::Level::Info) {
            return;
        }
        log::info!(
            "[{}] {} {}:\n{}",
            index,
            operator.name(),
            direction,
            io.render(&working.to_value())
        );
    }
}

/// Constructs a boxed operator from its JSON configuration.
pub type ZiOperatorFactory = fn(&Value) -> Result<Box<dyn ZiOperator>>;

/// Builder that knows how to instantiate operators from configuration.
#[derive(Default)]
pub struct ZiPipelineBuilder {
    factories: HashMap<String, ZiOperatorFactory>,
}

impl ZiPipelineBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder pre-loaded with the bundled operators.
    pub fn with_defaults() -> Self {
        let mut builder = Self::new();
        builder.register_defaults();
        builder
    }

    /// Registers a factory for the given operator name, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, factory: ZiOperatorFactory) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered operator names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn register_defaults(&mut self) {
        use crate::operators::{collection, filter, model, structure, system, transform};

        // collections
        self.register("json.split", collection::json_split_factory);
        self.register("json.aggregate", collection::json_aggregate_factory);

        // records
        self.register("json.filter", filter::json_filter_factory);
        self.register("json.transform", transform::json_transform_factory);
        self.register("text.normalize", transform::text_normalize_factory);
        self.register("json.structure", structure::json_structure_factory);

        // system fields
        self.register("system.id", system::id_adder_factory);
        self.register("system.timestamp", system::timestamp_adder_factory);

        self.register("model.invoke", model::model_invoke_factory);
        self.register("model.multimodal", model::model_multimodal_factory);
    }

    /// Instantiates one operator by registered name.
    pub fn build_operator(&self, name: &str, config: &Value) -> Result<Box<dyn ZiOperator>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ZiError::validation(format!("unknown operator '{name}'")))?;
        factory(config)
    }

    /// Builds a flatten-mode pipeline from a sequence of configuration steps.
    pub fn build_from_config(&self, steps: &[Value]) -> Result<ZiPipeline> {
        let mut pipeline = ZiPipeline::default();
        for (index, step) in steps.iter().enumerate() {
            let object = step.as_object().ok_or_else(|| {
                ZiError::validation(format!("pipeline step #{index} must be an object"))
            })?;

            let operator_name = object
                .get("operator")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ZiError::validation(format!("pipeline step #{index} missing string 'operator'"))
                })?;

            let config_value = object.get("config").cloned().unwrap_or(Value::Null);
            pipeline.add_boxed(self.build_operator(operator_name, &config_value)?);
        }

        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Builds a pipeline from a full specification, settings included.
    pub fn build(&self, spec: &ZiPipelineSpec) -> Result<ZiPipeline> {
        let steps: Vec<Value> = spec
            .steps
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<_, _>>()?;
        let pipeline = self.build_from_config(&steps)?;
        Ok(ZiPipeline::with_config(
            pipeline.operators,
            spec.pipeline_config(),
        ))
    }
}
