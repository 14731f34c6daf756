// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Chunked-execution planning: the coordinate queue and its strategies.

pub mod coordinator;

pub use coordinator::{ChunkCoordinator, ChunkStrategy};
