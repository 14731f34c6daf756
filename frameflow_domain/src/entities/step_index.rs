// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Step Index
//!
//! Insertion-ordered registry of pipeline steps. Iteration order IS the
//! execution order: the orchestrator walks the index front to back, the
//! checkpoint manifest compares against it ordinal by ordinal, and the chunk
//! coordinator derives its extractor order from it.
//!
//! Registration assigns a monotonic ordinal (1..N) and derives the step key
//! from `hash(name + "_" + ordinal)`; keys are unique even when the same
//! step name registers twice. Target reconciliation reorders entries with
//! [`promote_front`](StepIndex::promote_front) and
//! [`demote_back`](StepIndex::demote_back) without touching their keys.

use crate::entities::PipelineStep;
use crate::error::PipelineError;
use crate::value_objects::StepKey;
use indexmap::IndexMap;

/// Insertion-ordered mapping of step keys to steps.
#[derive(Debug, Default)]
pub struct StepIndex {
    steps: IndexMap<StepKey, PipelineStep>,
    next_ordinal: usize,
}

impl StepIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a step, assigning the next ordinal and deriving its key.
    ///
    /// # Errors
    ///
    /// `InternalError` on a key collision, which would mean the ordinal
    /// counter regressed.
    pub fn register(&mut self, step: PipelineStep) -> Result<StepKey, PipelineError> {
        self.next_ordinal += 1;
        let key = StepKey::derive(step.name(), self.next_ordinal);
        if self.steps.contains_key(&key) {
            return Err(PipelineError::internal_error(format!(
                "Duplicate step key for '{}' at ordinal {}",
                step.name(),
                self.next_ordinal
            )));
        }
        self.steps.insert(key.clone(), step);
        Ok(key)
    }

    /// Gets a step by key
    pub fn get(&self, key: &StepKey) -> Option<&PipelineStep> {
        self.steps.get(key)
    }

    /// Gets a step mutably by key
    pub fn get_mut(&mut self, key: &StepKey) -> Option<&mut PipelineStep> {
        self.steps.get_mut(key)
    }

    /// Position of a key in execution order
    pub fn position(&self, key: &StepKey) -> Option<usize> {
        self.steps.get_index_of(key)
    }

    /// Key at an execution-order position
    pub fn key_at(&self, position: usize) -> Option<&StepKey> {
        self.steps.get_index(position).map(|(key, _)| key)
    }

    /// Keys in execution order, cloned.
    ///
    /// The orchestrator captures this at execute-start so the visitation
    /// order is fixed for the whole run.
    pub fn keys(&self) -> Vec<StepKey> {
        self.steps.keys().cloned().collect()
    }

    /// Iterates `(key, step)` pairs in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (&StepKey, &PipelineStep)> {
        self.steps.iter()
    }

    /// Number of registered steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when no steps are registered
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Moves a step to the front of the execution order.
    ///
    /// # Errors
    ///
    /// `InternalError` when the key is not registered.
    pub fn promote_front(&mut self, key: &StepKey) -> Result<(), PipelineError> {
        let from = self
            .position(key)
            .ok_or_else(|| PipelineError::internal_error(format!("Unknown step key {}", key)))?;
        self.steps.move_index(from, 0);
        Ok(())
    }

    /// Moves a step to the back of the execution order.
    ///
    /// # Errors
    ///
    /// `InternalError` when the key is not registered.
    pub fn demote_back(&mut self, key: &StepKey) -> Result<(), PipelineError> {
        let from = self
            .position(key)
            .ok_or_else(|| PipelineError::internal_error(format!("Unknown step key {}", key)))?;
        let back = self.steps.len() - 1;
        self.steps.move_index(from, back);
        Ok(())
    }
}
