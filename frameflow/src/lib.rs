// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Frameflow
//!
//! A composable data-pipeline runtime. Pipelines are ordered sequences of
//! extract / transform / load steps over named tabular frames shared through
//! a pipeline-wide context, with a scalar parameter bus between steps,
//! resumable checkpointing with source-drift detection, and streaming
//! chunked execution.
//!
//! ```no_run
//! use frameflow::{Pipeline, PipelineStep, StepOutput};
//! use frameflow_domain::Frame;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), frameflow_domain::PipelineError> {
//! let mut pipeline = Pipeline::new();
//!
//! pipeline.set_target_extractor(
//!     PipelineStep::extract("pull_orders")
//!         .with_context()
//!         .body(|args| {
//!             let mut ctx = args.take_context().expect("extractor subcontext");
//!             ctx.add_frame("orders", Frame::new("orders", 2, json!([10, 20]))?);
//!             Ok(StepOutput::Ctx(ctx))
//!         })
//!         .build()?,
//! )?;
//!
//! pipeline.add_step(
//!     PipelineStep::transform("count_orders")
//!         .with_context()
//!         .frame("orders")
//!         .returns(["order_count"])
//!         .body(|args| {
//!             let rows = args.context().and_then(|c| c.frame("orders")).map(|f| f.row_count());
//!             Ok(StepOutput::scalar(json!(rows)))
//!         })
//!         .build()?,
//! )?;
//!
//! pipeline.execute()?;
//! # Ok(())
//! # }
//! ```
//!
//! The domain types (contexts, frames, steps, errors) live in the
//! [`frameflow_domain`] crate and are re-exported here for convenience.

pub mod application;
pub mod infrastructure;

// Re-export the public surface for convenient access
pub use application::{Pipeline, CANCEL_KEY};
pub use infrastructure::cache::{LfuStateCache, LfuStore, DEFAULT_CACHE_DIR, DEFAULT_CAPACITY};
pub use infrastructure::chunking::{ChunkCoordinator, ChunkStrategy};
pub use infrastructure::config::{CacheConfig, ChunkingConfig, PipelineConfig};
pub use infrastructure::logging;

// Commonly used domain types
pub use frameflow_domain::{
    CachedState, ChunkCoordinates, Context, ExecutionMode, ExistsPolicy, ExtractorTarget, Frame,
    MultiExtractor, ParamValue, ParameterBus, PipelineError, PipelineStep, StateCache, StepArgs,
    StepCapability, StepIndex, StepKey, StepOutput,
};
