// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Value objects of the frameflow domain.
//!
//! Immutable, identity-free values: frames, step keys, step metadata,
//! chunking coordinates, and the small policy enums. Two value objects with
//! equal attributes are interchangeable.

pub mod chunk_coordinates;
pub mod chunk_record;
pub mod execution_mode;
pub mod exists_policy;
pub mod frame;
pub mod step_descriptor;
pub mod step_key;
pub mod step_output;

pub use chunk_coordinates::ChunkCoordinates;
pub use chunk_record::ChunkRecord;
pub use execution_mode::ExecutionMode;
pub use exists_policy::ExistsPolicy;
pub use frame::Frame;
pub use step_descriptor::{StepCapability, StepDescriptor};
pub use step_key::StepKey;
pub use step_output::StepOutput;

/// Scalar value carried on the parameter bus and in frame payloads.
///
/// JSON is the domain's serialization format; `Null` means "not yet
/// produced".
pub type ParamValue = serde_json::Value;
