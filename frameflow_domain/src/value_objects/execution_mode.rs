// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Mode
//!
//! A pipeline runs in one of two modes: `DEV` skips every Load step so a
//! pipeline under development never writes to its targets; `PROD` executes
//! every step and requires a target extractor at reconciliation time.
//! Any other mode string is rejected at parse time.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Pipeline execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Development mode: Load steps are registered but never invoked.
    #[default]
    #[serde(rename = "DEV")]
    Dev,
    /// Production mode: every step executes; a target extractor is required.
    #[serde(rename = "PROD")]
    Prod,
}

impl ExecutionMode {
    /// True in development mode
    pub fn skips_loaders(&self) -> bool {
        matches!(self, ExecutionMode::Dev)
    }
}

impl FromStr for ExecutionMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEV" => Ok(ExecutionMode::Dev),
            "PROD" => Ok(ExecutionMode::Prod),
            other => Err(PipelineError::invalid_config(format!(
                "Mode must be either DEV or PROD, got '{}'",
                other
            ))),
        }
    }
}

impl Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Dev => write!(f, "DEV"),
            ExecutionMode::Prod => write!(f, "PROD"),
        }
    }
}
