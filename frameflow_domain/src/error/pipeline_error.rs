// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! Hierarchical error system for the frameflow domain. Errors are grouped by
//! behavior rather than by the module that raised them:
//!
//! - **Configuration**: `InvalidConfiguration`, `TypeViolation`,
//!   `ChunkPolicyViolation` - raised at registration or setter time, never
//!   deferred to execution.
//! - **Execution**: `MissingParameter`, `ArityMismatch`, `StepFailed` -
//!   fatal to the running step; the orchestrator aborts without advancing the
//!   checkpoint for that step.
//! - **Persistence**: `CacheCorruption`, `SerializationError`, `IoError` -
//!   `CacheCorruption` is recovered by treating the damaged checkpoint as
//!   absent; the others surface to the caller.
//! - **Control**: `Cancelled`, `InternalError`.
//!
//! The orchestrator never swallows an error: step-body failures are annotated
//! with the step name, key, and ordinal (`StepFailed`) and re-surfaced.

use thiserror::Error;

/// Domain-specific errors for the frameflow pipeline runtime.
///
/// Each variant carries a descriptive payload. Variants that the
/// orchestrator must dispatch on (parameter resolution, output arity, step
/// annotation) are structured; the rest follow the single-message convention.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Missing parameter '{parameter}' for step '{step}'")]
    MissingParameter { step: String, parameter: String },

    #[error("Step '{step}' returned {actual} element(s), expected {expected}")]
    ArityMismatch {
        step: String,
        expected: usize,
        actual: usize,
    },

    #[error("Type violation: {0}")]
    TypeViolation(String),

    #[error("Chunk policy violation: {0}")]
    ChunkPolicyViolation(String),

    #[error("Cache corruption: {0}")]
    CacheCorruption(String),

    #[error("Step '{step_name}' (key {step_key}, ordinal {ordinal}) failed: {message}")]
    StepFailed {
        step_name: String,
        step_key: String,
        ordinal: usize,
        message: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PipelineError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new type-violation error
    pub fn type_violation(msg: impl Into<String>) -> Self {
        Self::TypeViolation(msg.into())
    }

    /// Creates a new chunk-policy error
    pub fn chunk_policy(msg: impl Into<String>) -> Self {
        Self::ChunkPolicyViolation(msg.into())
    }

    /// Creates a new cache-corruption error
    pub fn cache_corruption(msg: impl Into<String>) -> Self {
        Self::CacheCorruption(msg.into())
    }

    /// Creates a new IO error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Checks if the error is recoverable
    ///
    /// `CacheCorruption` is recoverable in the narrow sense that the resume
    /// search falls back to the previous intact checkpoint; `IoError` may be
    /// a transient file-system condition.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::CacheCorruption(_) | PipelineError::IoError(_)
        )
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::InvalidConfiguration(_) => "configuration",
            PipelineError::MissingParameter { .. } => "parameters",
            PipelineError::ArityMismatch { .. } => "parameters",
            PipelineError::TypeViolation(_) => "configuration",
            PipelineError::ChunkPolicyViolation(_) => "chunking",
            PipelineError::CacheCorruption(_) => "cache",
            PipelineError::StepFailed { .. } => "execution",
            PipelineError::SerializationError(_) => "serialization",
            PipelineError::IoError(_) => "io",
            PipelineError::Cancelled(_) => "cancellation",
            PipelineError::InternalError(_) => "internal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}
