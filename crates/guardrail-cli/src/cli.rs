// SPDX-License-Identifier: Apache-2.0

//! Command-line interface definition for Guardrail.
//!
//! Uses clap's derive API for declarative CLI parsing.

use std::io::IsTerminal;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Extended help text for the check subcommand.
const CHECK_HELP: &str = r#"EXAMPLES

  Check staged files (pre-commit hook):
    guardrail check

  Check specific files against another base:
    guardrail check app/api/employee.py --base origin/main

  Fail the commit when security checks are deleted:
    guardrail check --escalate-deletions

EXIT CODES

  0  PASS
  1  BLOCK (at least one blocking finding)
  2  internal error (configuration, not a git repository, ...)
"#;

/// Extended help text for the completion subcommand with shell-specific examples.
const COMPLETION_HELP: &str = r#"EXAMPLES

  bash
    Add to ~/.bashrc or ~/.bash_profile:
      eval "$(guardrail completion bash)"

  zsh
    Generate completion file:
      mkdir -p ~/.zsh/completions
      guardrail completion zsh > ~/.zsh/completions/_guardrail

  fish
    Generate completion file:
      guardrail completion fish > ~/.config/fish/completions/guardrail.fish
"#;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with colors (default)
    #[default]
    Text,
    /// JSON output for programmatic consumption
    Json,
    /// YAML output for programmatic consumption
    Yaml,
    /// Markdown output for review comments
    Markdown,
    /// SARIF 2.1.0 for code scanning tools
    Sarif,
}

/// Global output configuration passed to commands.
#[derive(Clone)]
pub struct OutputContext {
    /// Output format
    pub format: OutputFormat,
    /// Suppress non-essential output (spinners, hints)
    pub quiet: bool,
    /// Enable verbose output (debug-level logging)
    pub verbose: bool,
    /// Whether stdout is a terminal (TTY)
    pub is_tty: bool,
}

impl OutputContext {
    /// Creates an `OutputContext` from CLI arguments.
    pub fn from_cli(format: OutputFormat, quiet: bool, verbose: bool) -> Self {
        Self {
            format,
            quiet,
            verbose,
            is_tty: std::io::stdout().is_terminal(),
        }
    }

    /// Returns true if interactive elements (spinners, colors) should be shown.
    pub fn is_interactive(&self) -> bool {
        self.is_tty && !self.quiet && matches!(self.format, OutputFormat::Text)
    }
}

/// Guardrail - structural detection of security-relevant code changes.
///
/// Compares the old and new syntax trees of changed Python files and reports
/// security checks that were added, modified or removed.
#[derive(Parser)]
#[command(name = "guardrail")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    pub output: OutputFormat,

    /// Suppress non-essential output (spinners, advisory hints)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug-level logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Analyse changed Python files and decide PASS or BLOCK
    #[command(after_long_help = CHECK_HELP)]
    Check(CheckArgs),

    /// List the security patterns Guardrail recognises
    Patterns,

    /// Generate a shell completion script
    #[command(after_long_help = COMPLETION_HELP)]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments of `guardrail check`.
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Files to analyse (default: staged files)
    pub paths: Vec<String>,

    /// Git revision holding the old versions (default: HEAD)
    #[arg(long, value_name = "REF")]
    pub base: Option<String>,

    /// Read new versions from the working tree instead of the index
    #[arg(long)]
    pub worktree: bool,

    /// Directory searched for tests (repeatable)
    #[arg(long = "tests-dir", value_name = "DIR")]
    pub tests_dirs: Vec<String>,

    /// Make removed security checks block the commit
    #[arg(long)]
    pub escalate_deletions: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_args_parse() {
        let cli = Cli::parse_from([
            "guardrail",
            "check",
            "a.py",
            "b.py",
            "--base",
            "origin/main",
            "--tests-dir",
            "tests",
            "--tests-dir",
            "integration",
            "-o",
            "sarif",
        ]);
        assert_eq!(cli.output, OutputFormat::Sarif);
        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.paths, vec!["a.py", "b.py"]);
        assert_eq!(args.base.as_deref(), Some("origin/main"));
        assert_eq!(args.tests_dirs, vec!["tests", "integration"]);
        assert!(!args.worktree);
    }
}
