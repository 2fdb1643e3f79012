// SPDX-License-Identifier: Apache-2.0

//! Guardrail - structural detection of security-relevant code changes.
//!
//! Runs as a pre-commit hook: compares staged Python files with their
//! previous revision and blocks commits that add untested write capabilities
//! or change authorization logic without updating its tests.

mod cli;
mod commands;
mod errors;
mod logging;
mod output;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use guardrail_core::config;
use tracing::debug;

use crate::cli::{Cli, Commands, OutputContext};

/// Exit code for configuration, git and other internal failures.
const EXIT_INTERNAL_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let output_ctx = OutputContext::from_cli(cli.output, cli.quiet, cli.verbose);

    match run(cli.command, output_ctx).await {
        Ok(code) => code,
        Err(e) => {
            let formatted = errors::format_error(&e);
            eprintln!("Error: {formatted}");
            ExitCode::from(EXIT_INTERNAL_ERROR)
        }
    }
}

async fn run(command: Commands, ctx: OutputContext) -> Result<ExitCode> {
    let config = config::load_config().context("Failed to load configuration")?;
    debug!("Configuration loaded successfully");
    commands::run(command, ctx, config).await
}
