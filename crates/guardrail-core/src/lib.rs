// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! # Guardrail Core
//!
//! Structural detection of security-relevant changes in Python commits.
//!
//! Both revisions of each changed file are parsed into a syntax tree, scanned
//! for security constructs (authentication and authorization checks, audit
//! logging, validation, rate limiting, error handling, write capabilities),
//! and correlated through a line diff into ADDED, MODIFIED and REMOVED
//! findings. A heuristic test oracle decides which findings are backed by
//! tests, and the verdict policy turns the result into PASS or BLOCK.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use guardrail_core::{Engine, FsTestCorpus, GitRevisionProvider, load_config};
//! use anyhow::Result;
//!
//! # async fn example() -> Result<()> {
//! let config = load_config()?;
//! let provider = GitRevisionProvider::new(".", &config.revisions);
//! let paths = provider.staged_paths().await?;
//! let corpus = FsTestCorpus::new(".", config.oracle.test_dirs.clone());
//!
//! let engine = Engine::builder()
//!     .config(config)
//!     .provider(Arc::new(provider))
//!     .corpus(Arc::new(corpus))
//!     .build();
//!
//! let report = engine.run(&paths).await?;
//! println!("{:?}: {} findings", report.verdict, report.findings.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`syntax`] - Python parsing and the lowered syntax tree
//! - [`patterns`] - Security pattern extraction
//! - [`diff`] - Line diff between revisions
//! - [`correlate`] - Mapping old and new patterns to changes
//! - [`severity`] - Severity classification
//! - [`oracle`] - Test evidence lookup
//! - [`engine`] - End-to-end analysis and verdict policy
//! - [`report`] / [`sarif`] - Results and SARIF output

// ============================================================================
// Error Handling
// ============================================================================

pub use error::GuardrailError;

/// Convenience Result type for Guardrail operations.
///
/// This is equivalent to `std::result::Result<T, GuardrailError>`.
pub type Result<T> = std::result::Result<T, GuardrailError>;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{
    AppConfig, NewSource, OracleConfig, PatternsConfig, PolicyConfig, RevisionsConfig,
    ScopeConfig, config_dir, config_file_path, load_config, load_config_from,
};

// ============================================================================
// Syntax and Patterns
// ============================================================================

pub use patterns::{PatternExtractor, PatternRules, PatternType, SecurityPattern, SourceKind};
pub use severity::Severity;
pub use syntax::{LineSpan, SyntaxTree};

// ============================================================================
// Change Detection
// ============================================================================

pub use correlate::{ChangeKind, ChangedPattern, Revisions, are_equivalent, are_similar, correlate};
pub use diff::{Hunk, HunkKind, LineDiff, diff_lines};

// ============================================================================
// Collaborators
// ============================================================================

pub use corpus::{FsTestCorpus, MemoryTestCorpus, TestCorpus, TestFile};
pub use revision::{
    GitRevisionProvider, MemoryRevisionProvider, Revision, RevisionProvider, RevisionText,
};

// ============================================================================
// Analysis and Reporting
// ============================================================================

pub use engine::{Engine, FileAnalysis};
pub use oracle::TestOracle;
pub use report::{FileSummary, Finding, Remediation, Report, RevisionStatus, Verdict};
pub use sarif::SarifReport;

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod corpus;
pub mod correlate;
pub mod diff;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod patterns;
pub mod report;
pub mod revision;
pub mod sarif;
pub mod severity;
pub mod syntax;
