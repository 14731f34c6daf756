// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Infrastructure layer: checkpoint persistence, chunk planning,
//! configuration, and logging integration.

pub mod cache;
pub mod chunking;
pub mod config;
pub mod logging;
