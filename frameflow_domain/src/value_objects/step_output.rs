// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Step Output
//!
//! Tagged result of a step invocation. Scalar-shaped outputs align
//! positionally with the step's declared returns and land on the parameter
//! bus; context-shaped outputs are arity-exempt and merge into the global
//! context. Modeling the output as a sum type keeps the orchestrator's
//! folding logic a single `match` instead of a chain of runtime type tests.

use crate::entities::Context;
use crate::value_objects::ParamValue;
use indexmap::IndexMap;

/// The value a step body hands back to the orchestrator.
#[derive(Debug, Clone)]
pub enum StepOutput {
    /// The step produced nothing. Legal only when the step declares no
    /// returns.
    None,
    /// One scalar, bound to the single declared return name.
    Scalar(ParamValue),
    /// Several scalars, bound to the declared return names by position.
    Tuple(Vec<ParamValue>),
    /// A context whose frames merge into the global context.
    Ctx(Context),
    /// Several named contexts; each merges into the global context.
    CtxMap(IndexMap<String, Context>),
}

impl StepOutput {
    /// Convenience constructor for a single scalar output.
    pub fn scalar(value: impl Into<ParamValue>) -> Self {
        StepOutput::Scalar(value.into())
    }

    /// Number of scalar elements, where arity checking applies.
    ///
    /// Context-shaped outputs return `None`: they fold by merging, not by
    /// positional alignment.
    pub fn scalar_arity(&self) -> Option<usize> {
        match self {
            StepOutput::None => Some(0),
            StepOutput::Scalar(_) => Some(1),
            StepOutput::Tuple(values) => Some(values.len()),
            StepOutput::Ctx(_) | StepOutput::CtxMap(_) => None,
        }
    }
}

impl From<Context> for StepOutput {
    fn from(context: Context) -> Self {
        StepOutput::Ctx(context)
    }
}
