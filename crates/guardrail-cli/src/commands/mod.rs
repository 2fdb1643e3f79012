// SPDX-License-Identifier: Apache-2.0

//! Command handlers for the Guardrail CLI.

pub mod check;
pub mod completion;
pub mod patterns;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use guardrail_core::AppConfig;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::{Commands, OutputContext};
use crate::output;

/// Creates a styled spinner (only if interactive).
fn maybe_spinner(ctx: &OutputContext, message: &str) -> Option<ProgressBar> {
    if !ctx.is_interactive() {
        return None;
    }
    let s = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        s.set_style(style);
    }
    s.set_message(message.to_string());
    s.enable_steady_tick(Duration::from_millis(100));
    Some(s)
}

/// Dispatch to the appropriate command handler and return the exit code.
pub async fn run(command: Commands, ctx: OutputContext, config: AppConfig) -> Result<ExitCode> {
    match command {
        Commands::Check(args) => {
            let report = check::run(args, &ctx, config).await?;
            output::render(&report, &ctx)?;
            Ok(ExitCode::from(report.exit_code()))
        }
        Commands::Patterns => {
            output::render(&patterns::run(), &ctx)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completion { shell } => {
            completion::run_generate(shell)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
