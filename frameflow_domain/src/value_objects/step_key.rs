// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Step Key Value Object
//!
//! A `StepKey` uniquely identifies a registered step for the lifetime of a
//! pipeline definition. The key is derived, not random: hashing
//! `"{name}_{ordinal}"` means the same pipeline built twice produces the same
//! keys, which is what lets the on-disk checkpoint manifest from a previous
//! run be compared ordinal-by-ordinal against the current step index.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display};

/// Content-derived identifier for a registered step.
///
/// Two registrations of the same step name get distinct keys because the
/// registration ordinal (monotonic 1..N) participates in the hash. Keys are
/// stable across process restarts for an unchanged pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepKey(String);

impl StepKey {
    /// Derives the key for a step name at a registration ordinal.
    pub fn derive(step_name: &str, ordinal: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}_{}", step_name, ordinal).as_bytes());
        StepKey(hex::encode(hasher.finalize()))
    }

    /// Reconstructs a key from its persisted hex form.
    ///
    /// Used when reading a checkpoint manifest back from disk; no validation
    /// is performed beyond carrying the string.
    pub fn from_string(key: impl Into<String>) -> Self {
        StepKey(key.into())
    }

    /// Gets the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
