// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entities of the frameflow domain: objects with identity and mutable
//! state - the frame context, the parameter bus, pipeline steps, and the
//! ordered step registry.

pub mod context;
pub mod multi_extractor;
pub mod parameter_bus;
pub mod pipeline_step;
pub mod step_index;

pub use context::Context;
pub use multi_extractor::{ExtractorTarget, MultiExtractor};
pub use parameter_bus::ParameterBus;
pub use pipeline_step::{
    ControlAction, PipelineStep, RowCountFn, StepArgs, StepBody, StepBuilder, StepFn,
    CONTEXT_PARAM,
};
pub use step_index::StepIndex;
