// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Frameflow Domain
//!
//! Pure domain layer of the frameflow data-pipeline runtime: the business
//! objects and rules for composing ordered extract / transform / load steps
//! over named tabular frames. Completely independent of external concerns -
//! no I/O, no logging backend, no runtime.
//!
//! ## Module Structure
//!
//! - [`entities`] - objects with identity and mutable state: [`Context`]
//!   (the frame container), [`ParameterBus`] (the scalar bus),
//!   [`PipelineStep`] and its builder, [`StepIndex`] (the ordered registry),
//!   [`MultiExtractor`].
//! - [`value_objects`] - immutable values: [`Frame`], [`StepKey`],
//!   step metadata, chunk coordinates and records, the mode and policy
//!   enums.
//! - [`services`] - stateless domain operations: source fingerprints for
//!   drift detection and capability type guards.
//! - [`repositories`] - ports implemented by infrastructure: the
//!   [`StateCache`] checkpoint backend.
//! - [`error`] - the [`PipelineError`] hierarchy.
//!
//! ## Design Notes
//!
//! Step metadata is declared explicitly through the builder rather than
//! discovered by reflection: parameter names, defaults, return names, and
//! frame names are all stated at construction. The step output is a tagged
//! variant ([`value_objects::StepOutput`]) so the orchestrator folds results
//! with a single `match`. Control steps carry an action tag instead of a
//! pipeline back-reference.

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenient access
pub use entities::{
    Context, ControlAction, ExtractorTarget, MultiExtractor, ParameterBus, PipelineStep,
    StepArgs, StepBuilder, StepIndex,
};
pub use error::PipelineError;
pub use repositories::{CachedState, StateCache};
pub use value_objects::{
    ChunkCoordinates, ChunkRecord, ExecutionMode, ExistsPolicy, Frame, ParamValue,
    StepCapability, StepKey, StepOutput,
};
