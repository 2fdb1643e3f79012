// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for the Guardrail CLI.
//!
//! Uses `tracing` with `tracing-subscriber`, writing to stderr so reports on
//! stdout stay machine-readable. `RUST_LOG` overrides the default filter.
//!
//! # Examples
//!
//! ```bash
//! # Why was this pattern reported?
//! guardrail -v check
//!
//! # Everything, including correlation decisions
//! RUST_LOG=guardrail=trace guardrail check
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the logging subsystem.
///
/// Degraded-analysis warnings are shown by default; `verbose` raises the
/// level to debug.
pub fn init_logging(verbose: bool) {
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let default_filter = if verbose {
        "guardrail=debug"
    } else {
        "guardrail=warn"
    };
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
