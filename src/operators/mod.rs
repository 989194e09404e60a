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

//! # Operators Module
//!
//! Built-in operators for record pipelines.
//!
//! ## Operator Categories
//!
//! - **collection**: Fan-out splitting and fan-in aggregation (`json.split`, `json.aggregate`)
//! - **filter**: Field paths, declarative conditions and record filtering (`json.filter`)
//! - **transform**: Text normalization and field reshaping (`text.normalize`, `json.transform`)
//! - **structure**: Key path and type summaries (`json.structure`)
//! - **system**: Identifier and timestamp stamping (`system.id`, `system.timestamp`)
//! - **model**: Chat model invocation (`model.invoke`, `model.multimodal`)
//!
//! ## Usage
//!
//! Operators are constructed directly or through the factory functions that
//! [`crate::ZiPipelineBuilder::with_defaults`] registers under the names above.

pub mod collection;
pub mod filter;
pub mod model;
pub mod structure;
pub mod system;
pub mod transform;
