// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Coordinates
//!
//! A `(skip, take)` pair designating the half-open row range `[skip, take)`
//! that a chunking extractor must read on one pipeline pass. The pair
//! `(None, None)` is the no-op padding coordinate: it keeps the coordinate
//! queue aligned to whole pipeline passes when one extractor finishes before
//! the others, and the orchestrator skips the extractor's body when it
//! dequeues one.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A row range handed to a chunking extractor for a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkCoordinates {
    skip: Option<u64>,
    take: Option<u64>,
}

impl ChunkCoordinates {
    /// Creates coordinates for the half-open row range `[skip, take)`.
    pub fn range(skip: u64, take: u64) -> Self {
        ChunkCoordinates {
            skip: Some(skip),
            take: Some(take),
        }
    }

    /// Creates the no-op padding pair.
    pub fn padding() -> Self {
        ChunkCoordinates {
            skip: None,
            take: None,
        }
    }

    /// True for the padding pair
    pub fn is_padding(&self) -> bool {
        self.skip.is_none() && self.take.is_none()
    }

    /// First row of the range (inclusive)
    pub fn skip(&self) -> Option<u64> {
        self.skip
    }

    /// End of the range (exclusive)
    pub fn take(&self) -> Option<u64> {
        self.take
    }

    /// Number of rows in the range, zero for padding
    pub fn len(&self) -> u64 {
        match (self.skip, self.take) {
            (Some(skip), Some(take)) => take.saturating_sub(skip),
            _ => 0,
        }
    }

    /// True when the range holds no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Display for ChunkCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.skip, self.take) {
            (Some(skip), Some(take)) => write!(f, "({}, {})", skip, take),
            _ => write!(f, "(null, null)"),
        }
    }
}
