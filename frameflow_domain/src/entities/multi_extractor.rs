// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Multi-Extractor
//!
//! A named group of Extract steps registered as one unit. The pipeline
//! decomposes the group at registration: each member becomes an individual
//! step with its own key and ordinal, in the order the members were added.

use crate::entities::PipelineStep;
use crate::error::PipelineError;
use crate::services::type_guards;

/// Ordered group of extractors registered together.
#[derive(Debug)]
pub struct MultiExtractor {
    name: String,
    extractors: Vec<PipelineStep>,
}

impl MultiExtractor {
    /// Creates an empty group.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the name is empty.
    pub fn new(name: impl Into<String>) -> Result<Self, PipelineError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PipelineError::invalid_config(
                "Multi-extractor name cannot be empty",
            ));
        }
        Ok(MultiExtractor {
            name,
            extractors: Vec::new(),
        })
    }

    /// Adds a member extractor.
    ///
    /// # Errors
    ///
    /// Returns `TypeViolation` when the step is not Extract capability.
    pub fn push(&mut self, step: PipelineStep) -> Result<(), PipelineError> {
        type_guards::ensure_extractor(&step)?;
        self.extractors.push(step);
        Ok(())
    }

    /// Gets the group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of member extractors
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// True when the group has no members
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Consumes the group, yielding members in registration order.
    pub fn into_extractors(self) -> Vec<PipelineStep> {
        self.extractors
    }
}

/// A pipeline's leading extractor: one step or a multi-extractor group.
#[derive(Debug)]
pub enum ExtractorTarget {
    Single(Box<PipelineStep>),
    Multi(MultiExtractor),
}

impl From<PipelineStep> for ExtractorTarget {
    fn from(step: PipelineStep) -> Self {
        ExtractorTarget::Single(Box::new(step))
    }
}

impl From<MultiExtractor> for ExtractorTarget {
    fn from(multi: MultiExtractor) -> Self {
        ExtractorTarget::Multi(multi)
    }
}
