// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exists Policy
//!
//! Loader behavior when the target already holds data. Under chunked
//! execution every loader must use `Append`: a `Replace` or `Fail` loader
//! would clobber or abort on every chunk after the first.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// What a loader does when its target already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistsPolicy {
    /// Append rows to the existing target. The only policy legal under
    /// chunked execution.
    #[default]
    Append,
    /// Abort the load if the target exists.
    Fail,
    /// Drop and rewrite the target.
    Replace,
}

impl FromStr for ExistsPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "append" => Ok(ExistsPolicy::Append),
            "fail" => Ok(ExistsPolicy::Fail),
            "replace" => Ok(ExistsPolicy::Replace),
            other => Err(PipelineError::invalid_config(format!(
                "exists policy must be either 'append', 'fail' or 'replace', got '{}'",
                other
            ))),
        }
    }
}

impl Display for ExistsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExistsPolicy::Append => write!(f, "append"),
            ExistsPolicy::Fail => write!(f, "fail"),
            ExistsPolicy::Replace => write!(f, "replace"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policies() {
        assert_eq!(
            "append".parse::<ExistsPolicy>().unwrap(),
            ExistsPolicy::Append
        );
        assert_eq!("fail".parse::<ExistsPolicy>().unwrap(), ExistsPolicy::Fail);
        assert_eq!(
            "replace".parse::<ExistsPolicy>().unwrap(),
            ExistsPolicy::Replace
        );
        assert!("overwrite".parse::<ExistsPolicy>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for policy in [ExistsPolicy::Append, ExistsPolicy::Fail, ExistsPolicy::Replace] {
            assert_eq!(policy.to_string().parse::<ExistsPolicy>().unwrap(), policy);
        }
    }
}
