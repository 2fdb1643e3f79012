// SPDX-License-Identifier: Apache-2.0

//! Error types for Guardrail.
//!
//! Uses `thiserror` for deriving `std::error::Error` implementations.
//! Application code should use `anyhow::Result` for top-level error handling.

use thiserror::Error;

/// Errors that can occur during Guardrail operations.
#[derive(Error, Debug)]
pub enum GuardrailError {
    /// Source text could not be parsed into a syntax tree.
    #[error("Syntax error in {label} revision at line {line}: {reason}")]
    Parse {
        /// Which revision failed ("old" or "new").
        label: String,
        /// Human-readable reason reported by the parser.
        reason: String,
        /// 1-indexed line of the first offending node.
        line: usize,
    },

    /// Parser could not be initialized for the Python grammar.
    #[error("Failed to load Python grammar: {message}")]
    Grammar {
        /// Error message from tree-sitter.
        message: String,
    },

    /// A file revision could not be retrieved.
    #[error("Failed to fetch {which} revision of {path}: {message}")]
    Revision {
        /// Path of the file.
        path: String,
        /// Which revision was requested.
        which: String,
        /// Error message.
        message: String,
    },

    /// A `git` invocation failed.
    #[error("git {command} failed: {message}")]
    Git {
        /// Git subcommand that failed (e.g., `show`, `diff`).
        command: String,
        /// Stderr or spawn error.
        message: String,
    },

    /// An external call exceeded its deadline.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// What was being waited on.
        operation: String,
        /// Timeout in seconds.
        seconds: u64,
    },

    /// The test corpus could not be read.
    #[error("Test corpus error: {message}")]
    Corpus {
        /// Error message.
        message: String,
    },

    /// Configuration file error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for GuardrailError {
    fn from(err: config::ConfigError) -> Self {
        GuardrailError::Config {
            message: err.to_string(),
        }
    }
}

impl From<tree_sitter::LanguageError> for GuardrailError {
    fn from(err: tree_sitter::LanguageError) -> Self {
        GuardrailError::Grammar {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = GuardrailError::Parse {
            label: "old".to_string(),
            reason: "unexpected `)`".to_string(),
            line: 7,
        };
        assert_eq!(
            err.to_string(),
            "Syntax error in old revision at line 7: unexpected `)`"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = GuardrailError::Timeout {
            operation: "git show HEAD:app/api.py".to_string(),
            seconds: 10,
        };
        assert!(err.to_string().contains("timed out after 10s"));
    }
}
