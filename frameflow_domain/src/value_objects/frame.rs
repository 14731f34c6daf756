// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Frame Value Object
//!
//! A `Frame` is the unit of tabular data flowing through a pipeline. The core
//! runtime treats it as opaque: it reads the frame's name and row count and
//! moves the value between contexts, but never interprets the payload. All
//! concrete tabular operations (column math, joins, filtering) live in
//! collaborator libraries outside this crate.
//!
//! ## Ownership
//!
//! A frame is owned by exactly one [`Context`](crate::entities::Context) at a
//! time. Inserting a frame into a context moves the value; propagating it to
//! another context clones it (value-copy semantics).
//!
//! ## Payload
//!
//! The payload is an implementation-defined handle serialized as JSON, the
//! domain's configuration and checkpoint format. Collaborators that wrap a
//! real tabular engine store an engine-specific reference or an inline
//! row-set here; the core only requires that the payload round-trips through
//! serde for checkpointing.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque, named tabular value.
///
/// Equality compares name, row count, and payload, which makes frames
/// directly assertable in tests and lets the checkpoint tests verify
/// byte-for-byte state restoration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    name: String,
    rows: u64,
    payload: Value,
}

impl Frame {
    /// Creates a new frame.
    ///
    /// # Arguments
    ///
    /// * `name` - Frame name (must not be empty)
    /// * `rows` - Number of rows the payload represents
    /// * `payload` - Opaque payload handle
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the name is empty.
    pub fn new(name: impl Into<String>, rows: u64, payload: Value) -> Result<Self, PipelineError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PipelineError::invalid_config(
                "Frame name cannot be empty",
            ));
        }
        Ok(Frame {
            name,
            rows,
            payload,
        })
    }

    /// Creates an empty frame (zero rows, null payload).
    ///
    /// Extractors emit empty frames when a chunk pass gives them nothing to
    /// read, so downstream steps still find their declared frames.
    pub fn empty(name: impl Into<String>) -> Result<Self, PipelineError> {
        Self::new(name, 0, Value::Null)
    }

    /// Gets the frame name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the number of rows the payload represents
    pub fn row_count(&self) -> u64 {
        self.rows
    }

    /// Gets the opaque payload handle
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Consumes the frame, returning its payload
    pub fn into_payload(self) -> Value {
        self.payload
    }
}
