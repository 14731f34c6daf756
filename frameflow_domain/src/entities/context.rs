// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Context Entity
//!
//! A `Context` is the named container through which frames travel between
//! pipeline steps. Two roles share the type:
//!
//! - the **global context**, long-lived and owned by the orchestrator, holds
//!   every frame any step has produced;
//! - **subcontexts**, built fresh for a single invocation, hold exactly the
//!   frames the step declared (or a copy of the whole global context when it
//!   declared none).
//!
//! ## Invariant
//!
//! `num_frames()` equals the number of stored frames after every mutation.
//! The counter is redundant with the map length by construction; it is kept
//! as an explicit field because checkpoints persist it and restored state
//! must prove the invariant held at capture time.
//!
//! ## Ordering
//!
//! Frames enumerate in insertion order. Steps that iterate a context see
//! frames in the order upstream steps produced them, and checkpoint
//! round-trips preserve that order.
//!
//! ## Concurrency
//!
//! A context is not safe for concurrent mutation. The orchestrator is the
//! single writer of the global context; steps only ever mutate the
//! subcontext they were handed.

use crate::error::PipelineError;
use crate::value_objects::{Frame, ParamValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Named, ordered collection of frames plus a scalar metadata bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    name: String,
    frames: IndexMap<String, Frame>,
    metadata: IndexMap<String, ParamValue>,
    num_frames: usize,
}

impl Context {
    /// Creates an empty context.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the name is empty.
    pub fn new(name: impl Into<String>) -> Result<Self, PipelineError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PipelineError::invalid_config(
                "Context name cannot be empty",
            ));
        }
        Ok(Context {
            name,
            frames: IndexMap::new(),
            metadata: IndexMap::new(),
            num_frames: 0,
        })
    }

    /// Gets the context name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the context
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Inserts or replaces a frame under `name`.
    ///
    /// Insert-or-replace is the canonical write path; the counter tracks the
    /// stored frame count either way.
    pub fn add_frame(&mut self, name: impl Into<String>, frame: Frame) {
        self.frames.insert(name.into(), frame);
        self.num_frames = self.frames.len();
    }

    /// Replaces an existing frame; behaves as [`add_frame`](Self::add_frame)
    /// when the name is absent.
    pub fn set_frame(&mut self, name: impl Into<String>, frame: Frame) {
        self.add_frame(name, frame);
    }

    /// Gets a frame by name, `None` when absent.
    pub fn frame(&self, name: &str) -> Option<&Frame> {
        self.frames.get(name)
    }

    /// Frame names in insertion order.
    pub fn frame_names(&self) -> Vec<&str> {
        self.frames.keys().map(String::as_str).collect()
    }

    /// Iterates frames in insertion order.
    pub fn frames(&self) -> impl Iterator<Item = (&str, &Frame)> {
        self.frames.iter().map(|(name, frame)| (name.as_str(), frame))
    }

    /// True when a frame with `name` is stored
    pub fn contains_frame(&self, name: &str) -> bool {
        self.frames.contains_key(name)
    }

    /// Number of stored frames
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// True when no frames are stored
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Gets a metadata value by key
    pub fn metadata(&self, key: &str) -> Option<&ParamValue> {
        self.metadata.get(key)
    }

    /// Sets a metadata value
    pub fn set_metadata(&mut self, key: impl Into<String>, value: ParamValue) {
        self.metadata.insert(key.into(), value);
    }

    /// Iterates the metadata bag in insertion order.
    pub fn metadata_entries(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.metadata.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Merges another context into this one.
    ///
    /// Every frame in `other` replaces a same-named frame here or is added;
    /// metadata keys from `other` overwrite, which lets cooperative signals
    /// (such as the `cancel` flag) propagate from a returned subcontext back
    /// to the global context.
    pub fn merge(&mut self, other: Context) {
        let Context {
            frames, metadata, ..
        } = other;
        for (name, frame) in frames {
            self.frames.insert(name, frame);
        }
        for (key, value) in metadata {
            self.metadata.insert(key, value);
        }
        self.num_frames = self.frames.len();
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Context '{}' ({} frame(s): [{}])",
            self.name,
            self.num_frames,
            self.frame_names().join(", ")
        )
    }
}
