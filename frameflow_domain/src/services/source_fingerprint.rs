// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Source Fingerprint Service
//!
//! Drift detection for resumable execution. A step's recorded fingerprint
//! (source text + SHA-256) must match the current definition for a
//! checkpoint to stay valid. Matching requires BOTH the hashes and the raw
//! source bytes to compare equal: the byte comparison guards against hash
//! collisions, and a recorded source that was normalized in transit (e.g. by
//! a whitespace-mangling editor or VCS filter) fails the comparison instead
//! of silently resuming on a drifted step.

use sha2::{Digest, Sha256};

/// Computes the SHA-256 of source text, hex encoded.
pub fn hash_source(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

/// Checks whether a current fingerprint matches a recorded one.
///
/// Both the hash and the source text must compare equal.
pub fn fingerprint_matches(
    current_source: &str,
    current_hash: &str,
    recorded_source: &str,
    recorded_hash: &str,
) -> bool {
    if current_hash != recorded_hash {
        return false;
    }
    current_source == recorded_source
}
