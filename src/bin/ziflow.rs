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

//! Ziflow command line front-end.
//!
//! Commands:
//! - ziflow normalize <input> <output> [--fields a,b] [--lower|--upper]
//! - ziflow model <input> <output> [--model ..] [--prompt-field ..] ...
//! - ziflow filter <input> <output> --condition '<json>'
//! - ziflow run <input> <output> --config pipeline.yaml
//!
//! `-` reads from standard input or writes to standard output.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ziflow::{
    ZiCondition, ZiConcurrentExecutor, ZiExecutionSummary, ZiJsonFilter, ZiJsonLoader,
    ZiJsonSaver, ZiModelConfig, ZiModelInvoker, ZiPipeline, ZiPipelineBuilder, ZiPipelineSpec,
    ZiRecordBatch, ZiTextNormalizeConfig, ZiTextNormalizer,
};

/// Ziflow - JSON Lines record transformation pipelines
#[derive(Parser, Debug)]
#[command(name = "ziflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Skip lines that are not valid JSON objects instead of aborting
    #[arg(long, global = true)]
    skip_invalid: bool,

    /// Worker threads for record processing (defaults to the CPU count)
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize text fields
    Normalize {
        input: PathBuf,
        output: PathBuf,
        /// Fields to normalize; all string fields when omitted
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Convert to lower case
        #[arg(long, conflicts_with = "upper")]
        lower: bool,
        /// Convert to upper case
        #[arg(long)]
        upper: bool,
    },

    /// Send a prompt field to a chat model
    Model {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value = "gpt-3.5-turbo")]
        model: String,
        #[arg(long, default_value = "prompt")]
        prompt_field: String,
        #[arg(long, default_value = "response")]
        response_field: String,
        #[arg(long)]
        system_prompt: Option<String>,
        /// API key; falls back to OPENAI_API_KEY
        #[arg(long)]
        api_key: Option<String>,
        /// Base URL of an OpenAI-compatible endpoint
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Keep records matching a JSON condition, e.g. '{"op":"exists","path":"text"}'
    Filter {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        condition: String,
    },

    /// Run a pipeline described by a JSON or YAML file
    Run {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ZiExecutionSummary> {
    let mut workers = cli.workers;
    let (input, output, pipeline) = match cli.command {
        Command::Normalize {
            input,
            output,
            fields,
            lower,
            upper,
        } => {
            let config = ZiTextNormalizeConfig {
                text_fields: (!fields.is_empty()).then_some(fields),
                lower_case: lower,
                upper_case: upper,
                ..ZiTextNormalizeConfig::default()
            };
            let mut pipeline = ZiPipeline::default();
            pipeline.add(ZiTextNormalizer::new(config)?);
            (input, output, pipeline)
        }
        Command::Model {
            input,
            output,
            model,
            prompt_field,
            response_field,
            system_prompt,
            api_key,
            base_url,
        } => {
            let config = ZiModelConfig {
                api_key,
                base_url,
                ..ZiModelConfig::new(model)
            };
            let mut invoker = ZiModelInvoker::openai(config)?
                .with_prompt_field(prompt_field)
                .with_response_field(response_field);
            if let Some(system_prompt) = system_prompt {
                invoker = invoker.with_system_prompt(system_prompt);
            }
            let mut pipeline = ZiPipeline::default();
            pipeline.add(invoker);
            (input, output, pipeline)
        }
        Command::Filter {
            input,
            output,
            condition,
        } => {
            let value: serde_json::Value =
                serde_json::from_str(&condition).context("--condition is not valid JSON")?;
            let condition = ZiCondition::from_value(&value)?;
            let mut pipeline = ZiPipeline::default();
            pipeline.add(ZiJsonFilter::from_condition(&condition)?);
            (input, output, pipeline)
        }
        Command::Run {
            input,
            output,
            config,
        } => {
            let spec = ZiPipelineSpec::from_file(&config)
                .with_context(|| format!("failed to load pipeline spec {}", config.display()))?;
            workers = workers.or(spec.workers);
            let pipeline = ZiPipelineBuilder::with_defaults().build(&spec)?;
            (input, output, pipeline)
        }
    };

    let records = read_records(&input, cli.skip_invalid)?;
    let executor = match workers {
        Some(workers) => ZiConcurrentExecutor::new(pipeline, workers)?,
        None => ZiConcurrentExecutor::with_default_workers(pipeline)?,
    };

    let results = executor.execute_all(records);
    let summary = ZiExecutionSummary::from_results(&results);

    let mut saver = open_saver(&output)?;
    for (index, result) in results.iter().enumerate() {
        match result {
            Ok(data) => {
                saver.write(data)?;
            }
            Err(err) => log::error!("record {} failed: {}", index + 1, err),
        }
    }
    saver.flush()?;

    eprintln!(
        "processed {} records ({} failed), wrote {} lines to {}",
        summary.total,
        summary.failed,
        saver.written(),
        output.display()
    );
    Ok(summary)
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_records(input: &Path, skip_invalid: bool) -> anyhow::Result<ZiRecordBatch> {
    let loader = if is_stdio(input) {
        ZiJsonLoader::stdin()
    } else {
        ZiJsonLoader::from_path(input)
    };
    let mut records = Vec::new();
    for result in loader.iter()? {
        match result {
            Ok(record) => records.push(record),
            Err(err @ ziflow::ZiError::Parse { .. }) if skip_invalid => {
                log::warn!("skipping invalid input: {err}");
            }
            Err(err) => bail!("failed to read {}: {err}", input.display()),
        }
    }
    Ok(records)
}

fn open_saver(output: &Path) -> anyhow::Result<ZiJsonSaver> {
    if is_stdio(output) {
        return Ok(ZiJsonSaver::stdout());
    }
    ZiJsonSaver::create(output).with_context(|| format!("cannot write {}", output.display()))
}
