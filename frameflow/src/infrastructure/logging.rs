// /////////////////////////////////////////////////////////////////////////////
// Frameflow RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logging Integration
//!
//! The runtime emits structured events through `tracing` under the targets
//! `frameflow::pipeline`, `frameflow::cache`, and `frameflow::chunk`. The
//! library never installs a global subscriber on its own; host programs
//! either bring their own subscriber or call one of the helpers here.

use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber filtered at `info` for frameflow
/// targets. A no-op when a global subscriber is already installed.
pub fn init() {
    init_with_filter("frameflow=info");
}

/// Installs a formatting subscriber with an explicit filter directive
/// (e.g. `"frameflow=debug,frameflow::cache=trace"`).
pub fn init_with_filter(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(true)
        .try_init();
}
