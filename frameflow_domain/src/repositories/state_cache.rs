// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # State Cache Port
//!
//! Abstraction over the pipeline's checkpoint backend. The default
//! implementation (an LFU store with an on-disk blob directory) lives in the
//! infrastructure layer; replacements implement this trait.
//!
//! Two roles share the interface:
//!
//! - `put` / `get` serve the explicit snapshot and restore control steps
//!   that branch mid-pipeline: values are `(bus, globalcontext)` pairs held
//!   in memory under integer keys.
//! - `store` / `load` / `resume_point` serve resumable execution: one
//!   persisted checkpoint per completed step, and a resume search that
//!   compares the persisted manifest against the live step index.

use crate::entities::{Context, ParameterBus, StepIndex};
use crate::error::PipelineError;
use crate::value_objects::StepKey;
use serde::{Deserialize, Serialize};

/// A captured `(parameter bus, global context)` pair.
///
/// The normalized value shape of the in-memory store and the payload a
/// checkpoint restores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedState {
    pub bus: ParameterBus,
    pub globalcontext: Context,
}

/// Checkpoint backend used by the pipeline orchestrator.
pub trait StateCache: Send {
    /// Inserts a state snapshot, returning its assigned key.
    ///
    /// Returns `None` when the store has zero capacity.
    fn put(&mut self, state: CachedState) -> Option<u64>;

    /// Retrieves a snapshot by key, updating its usage frequency.
    fn get(&mut self, key: u64) -> Option<CachedState>;

    /// Persists a checkpoint for the step identified by `step_key`.
    ///
    /// # Errors
    ///
    /// `InternalError` if the key is not in `steps`; `IoError` /
    /// `SerializationError` on persistence failures.
    fn store(
        &mut self,
        steps: &StepIndex,
        bus: &ParameterBus,
        globalcontext: &Context,
        step_key: &StepKey,
    ) -> Result<(), PipelineError>;

    /// Restores the checkpoint stored for `step_key`.
    ///
    /// # Errors
    ///
    /// `CacheCorruption` when the blob is missing or unreadable.
    fn load(&mut self, step_key: &StepKey) -> Result<CachedState, PipelineError>;

    /// Finds the last step whose persisted checkpoint is still consistent
    /// with the current step definitions, or `None` to restart from scratch.
    fn resume_point(&self, steps: &StepIndex) -> Result<Option<StepKey>, PipelineError>;

    /// Clears in-memory state; optionally purges the persisted directory.
    fn reset(&mut self, delete_directory: bool) -> Result<(), PipelineError>;
}
