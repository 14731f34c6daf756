// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Ports to infrastructure: persistence abstractions the domain depends on
//! but does not implement.

pub mod state_cache;

pub use state_cache::{CachedState, StateCache};
