// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Capability Type Guards
//!
//! Predicates over step capabilities, used at every public seam of the
//! orchestrator: step registration, target setters, and the chunk
//! coordinator. The `is_*` forms answer quietly; the `ensure_*` forms are
//! the strict variants and raise `TypeViolation` at the seam instead of
//! deferring a shape mistake to execution time.

use crate::entities::PipelineStep;
use crate::error::PipelineError;

/// True when the step carries the Extract capability.
pub fn is_extractor(step: &PipelineStep) -> bool {
    step.capability().is_extract()
}

/// True when the step carries the Load capability.
pub fn is_loader(step: &PipelineStep) -> bool {
    step.capability().is_load()
}

/// True when the step carries the Transform capability.
pub fn is_transform(step: &PipelineStep) -> bool {
    step.capability().is_transform()
}

/// True for an extractor that declared a chunk size.
pub fn is_chunking_extractor(step: &PipelineStep) -> bool {
    is_extractor(step) && step.chunk_size().is_some()
}

/// Strict variant of [`is_extractor`].
///
/// # Errors
///
/// Returns `TypeViolation` naming the offending step.
pub fn ensure_extractor(step: &PipelineStep) -> Result<(), PipelineError> {
    if is_extractor(step) {
        Ok(())
    } else {
        Err(PipelineError::type_violation(format!(
            "Step '{}' is {} capability, expected extract",
            step.name(),
            step.capability()
        )))
    }
}

/// Strict variant of [`is_loader`].
///
/// # Errors
///
/// Returns `TypeViolation` naming the offending step.
pub fn ensure_loader(step: &PipelineStep) -> Result<(), PipelineError> {
    if is_loader(step) {
        Ok(())
    } else {
        Err(PipelineError::type_violation(format!(
            "Step '{}' is {} capability, expected load",
            step.name(),
            step.capability()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PipelineStep;
    use crate::value_objects::StepOutput;

    fn extract_step() -> PipelineStep {
        PipelineStep::extract("pull")
            .body(|_args| Ok(StepOutput::None))
            .build()
            .unwrap()
    }

    fn load_step() -> PipelineStep {
        PipelineStep::load("push")
            .body(|_args| Ok(StepOutput::None))
            .build()
            .unwrap()
    }

    #[test]
    fn test_predicates() {
        let extract = extract_step();
        let load = load_step();
        assert!(is_extractor(&extract));
        assert!(!is_loader(&extract));
        assert!(is_loader(&load));
        assert!(!is_transform(&load));
        assert!(!is_chunking_extractor(&extract));
    }

    #[test]
    fn test_strict_variants_raise() {
        let load = load_step();
        let err = ensure_extractor(&load).unwrap_err();
        assert!(matches!(err, PipelineError::TypeViolation(_)));
        assert!(ensure_loader(&load).is_ok());
    }
}
