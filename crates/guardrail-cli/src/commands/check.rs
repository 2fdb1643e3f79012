// SPDX-License-Identifier: Apache-2.0

//! `guardrail check`: analyse changed files and decide PASS or BLOCK.

use std::sync::Arc;

use anyhow::{Context, Result};
use guardrail_core::{
    AppConfig, Engine, FsTestCorpus, GitRevisionProvider, NewSource, Report,
};
use tracing::debug;

use crate::cli::{CheckArgs, OutputContext};

use super::maybe_spinner;

/// Applies command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut AppConfig, args: &CheckArgs) {
    if let Some(base) = &args.base {
        config.revisions.base_ref.clone_from(base);
        debug!("Overriding base revision to: {base}");
    }
    if args.worktree {
        config.revisions.new_source = NewSource::Worktree;
    }
    if !args.tests_dirs.is_empty() {
        config.oracle.test_dirs.clone_from(&args.tests_dirs);
    }
    if args.escalate_deletions {
        config.policy.escalate_deletions = true;
    }
}

/// Runs the analysis in the current directory.
pub async fn run(args: CheckArgs, ctx: &OutputContext, mut config: AppConfig) -> Result<Report> {
    apply_overrides(&mut config, &args);
    let root = std::env::current_dir().context("Failed to read the current directory")?;
    let provider = GitRevisionProvider::new(&root, &config.revisions);

    let paths = if args.paths.is_empty() {
        provider.staged_paths().await?
    } else {
        args.paths
    };
    debug!(count = paths.len(), "Paths to check");

    let corpus = FsTestCorpus::new(&root, config.oracle.test_dirs.clone());
    let engine = Engine::builder()
        .config(config)
        .provider(Arc::new(provider))
        .corpus(Arc::new(corpus))
        .build();

    let spinner = maybe_spinner(ctx, "Analysing changes...");
    let report = engine.run(&paths).await;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    Ok(report?)
}
