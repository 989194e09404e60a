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

//! # Concurrent Execution
//!
//! [`ZiConcurrentExecutor`] runs one pipeline over many independent input
//! records on a dedicated worker pool. Each record is processed end to end by
//! a single worker; results come back in input order.
//!
//! Failures are isolated: one record failing never stops the others.
//! [`ZiConcurrentExecutor::execute_all`] reports each outcome in place, and
//! [`ZiConcurrentExecutor::execute_all_strict`] surfaces the first failure by
//! input index after every record has finished.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ZiError};
use crate::pipeline::ZiPipeline;
use crate::record::{ZiData, ZiRecord};

/// Bounded worker pool around a shared pipeline.
pub struct ZiConcurrentExecutor {
    pipeline: Arc<ZiPipeline>,
    max_workers: usize,
    pool: rayon::ThreadPool,
}

impl ZiConcurrentExecutor {
    /// Creates an executor running at most `max_workers` pipeline calls at once.
    pub fn new(pipeline: impl Into<Arc<ZiPipeline>>, max_workers: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(ZiError::validation("max_workers must be greater than zero"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_workers)
            .thread_name(|index| format!("ziflow-worker-{index}"))
            .build()
            .map_err(|e| ZiError::internal(format!("failed to build worker pool: {e}")))?;
        Ok(Self {
            pipeline: pipeline.into(),
            max_workers,
            pool,
        })
    }

    /// Creates an executor with one worker per logical CPU.
    pub fn with_default_workers(pipeline: impl Into<Arc<ZiPipeline>>) -> Result<Self> {
        Self::new(pipeline, num_cpus::get().max(1))
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn pipeline(&self) -> &ZiPipeline {
        &self.pipeline
    }

    /// Processes one record on the pool.
    pub fn execute(&self, record: ZiRecord) -> Result<ZiData> {
        let pipeline = &self.pipeline;
        self.pool.install(|| pipeline.process_record(record))
    }

    /// Processes every record, returning one result per input in input order.
    pub fn execute_all(&self, records: Vec<ZiRecord>) -> Vec<Result<ZiData>> {
        let total = records.len();
        let started = Instant::now();
        let pipeline = &self.pipeline;

        let results: Vec<Result<ZiData>> = self.pool.install(|| {
            records
                .into_par_iter()
                .map(|record| pipeline.process_record(record))
                .collect()
        });

        let summary = ZiExecutionSummary::from_results(&results);
        log::info!(
            "executed {} records on {} workers in {:?}: {} succeeded, {} failed",
            total,
            self.max_workers,
            started.elapsed(),
            summary.succeeded,
            summary.failed
        );
        results
    }

    /// Like [`execute_all`](Self::execute_all) but returns the first failure
    /// by input index, or every output when all records succeed.
    pub fn execute_all_strict(&self, records: Vec<ZiRecord>) -> Result<Vec<ZiData>> {
        self.execute_all(records).into_iter().collect()
    }
}

impl fmt::Debug for ZiConcurrentExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZiConcurrentExecutor")
            .field("max_workers", &self.max_workers)
            .field("stages", &self.pipeline.len())
            .finish()
    }
}

/// Success and failure counts over a batch of execution results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZiExecutionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Leaf records produced by the successful executions.
    pub output_records: usize,
}

impl ZiExecutionSummary {
    pub fn from_results(results: &[Result<ZiData>]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            summary.total += 1;
            match result {
                Ok(data) => {
                    summary.succeeded += 1;
                    summary.output_records += data.leaves().len();
                }
                Err(_) => summary.failed += 1,
            }
            summary
        })
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
