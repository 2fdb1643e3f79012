// SPDX-License-Identifier: Apache-2.0

//! Test coverage oracle.
//!
//! A deliberately permissive heuristic: a finding has test evidence when a
//! relevant test file mentions one of the pattern's anchors, or shares
//! enough words with its snippet. It catches egregious omissions and makes
//! no attempt at semantic test verification.

use std::collections::HashSet;

use tracing::debug;

use crate::config::OracleConfig;
use crate::correlate::{ChangeKind, tokens};
use crate::corpus::{TestFile, normalize_path};
use crate::patterns::SecurityPattern;

/// Words too common in Python to count towards keyword overlap.
const STOPWORDS: &[&str] = &[
    "and", "not", "def", "for", "if", "in", "is", "none", "or", "raise", "return", "self", "true",
    "false", "with", "await", "async", "the",
];

/// A test file indexed for lookup.
#[derive(Debug, Clone)]
struct IndexedTest {
    path: String,
    file_name: String,
    text: String,
    tokens: HashSet<String>,
}

/// Answers "is this finding backed by tests?" over one corpus snapshot.
#[derive(Debug, Clone)]
pub struct TestOracle {
    config: OracleConfig,
    tests: Vec<IndexedTest>,
    changed: HashSet<String>,
}

impl TestOracle {
    /// Indexes `files`. `changed` lists test paths that are part of the change set.
    #[must_use]
    pub fn new(config: OracleConfig, files: Vec<TestFile>, changed: &[String]) -> Self {
        let tests = files
            .into_iter()
            .map(|file| {
                let text = file.text.to_lowercase();
                IndexedTest {
                    file_name: file.file_name().to_lowercase(),
                    tokens: tokens(&text),
                    path: file.path,
                    text,
                }
            })
            .collect();
        Self {
            config,
            tests,
            changed: changed.iter().map(|p| normalize_path(p)).collect(),
        }
    }

    /// Returns true if the corpus holds no test files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Whether a relevant test file mentions `pattern`.
    ///
    /// Access-control patterns only count evidence from authorization test
    /// files; a MODIFIED one additionally needs that file to be part of the
    /// change.
    #[must_use]
    pub fn has_evidence(&self, pattern: &SecurityPattern, change: ChangeKind) -> bool {
        let access_control = pattern.source_kind.is_access_control();
        let found = self
            .tests
            .iter()
            .filter(|test| !access_control || self.is_auth_test(test))
            .filter(|test| {
                !(access_control && change == ChangeKind::Modified)
                    || self.changed.contains(&test.path)
            })
            .find(|test| self.mentions(test, pattern));

        if let Some(test) = found {
            debug!(
                pattern = %pattern.pattern_type,
                line = pattern.line_range.start,
                test = %test.path,
                "Test evidence found"
            );
        }
        found.is_some()
    }

    fn is_auth_test(&self, test: &IndexedTest) -> bool {
        self.config
            .auth_test_keywords
            .iter()
            .any(|k| test.file_name.contains(&k.to_lowercase()))
    }

    fn mentions(&self, test: &IndexedTest, pattern: &SecurityPattern) -> bool {
        pattern
            .anchors
            .iter()
            .any(|anchor| mentions_anchor(test, anchor))
            || self.keyword_overlap(test, pattern)
    }

    #[allow(clippy::cast_precision_loss)]
    fn keyword_overlap(&self, test: &IndexedTest, pattern: &SecurityPattern) -> bool {
        let words: HashSet<String> = tokens(&pattern.snippet)
            .into_iter()
            .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
            .collect();
        if words.is_empty() {
            return false;
        }
        let hits = words.iter().filter(|w| test.tokens.contains(*w)).count();
        hits >= self.config.min_keyword_hits
            && hits as f64 / words.len() as f64 >= self.config.min_keyword_overlap
    }
}

/// Exact identifier, `test_<identifier>`, or the identifier with `_` read as spaces.
fn mentions_anchor(test: &IndexedTest, anchor: &str) -> bool {
    let anchor = anchor.trim().to_lowercase();
    if anchor.is_empty() {
        return false;
    }
    let is_identifier = anchor.chars().all(|c| c.is_alphanumeric() || c == '_');
    if !is_identifier {
        return test.text.contains(&anchor);
    }
    if test.tokens.contains(&anchor) || test.tokens.contains(&format!("test_{anchor}")) {
        return true;
    }
    anchor.contains('_') && test.text.contains(&anchor.replace('_', " "))
}
