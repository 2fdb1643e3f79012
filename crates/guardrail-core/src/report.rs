// SPDX-License-Identifier: Apache-2.0

//! Findings, verdicts and the report returned to callers.

use serde::{Deserialize, Serialize};

use crate::correlate::ChangeKind;
use crate::patterns::SecurityPattern;
use crate::revision::Revision;
use crate::severity::{self, Severity};
use crate::syntax::LineSpan;

/// Suggested follow-up for a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remediation {
    /// Add or update tests covering the construct.
    AddTest,
    /// Explain the deletion in the commit message or review.
    DocumentDeletion,
    /// The construct may have moved; verify it still guards the same code.
    MoveAndVerify,
}

impl Remediation {
    /// One-line hint for reports.
    #[must_use]
    pub fn hint(self) -> &'static str {
        match self {
            Self::AddTest => "Add or update tests that exercise this code path",
            Self::DocumentDeletion => {
                "Confirm the deletion is intended and document why in the commit message"
            }
            Self::MoveAndVerify => {
                "A similar check still exists in this file; verify it protects the same path"
            }
        }
    }
}

/// A changed security pattern with its evidence and policy outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// The pattern, located in `location`.
    pub pattern: SecurityPattern,
    /// How the pattern changed.
    pub change_kind: ChangeKind,
    /// File the pattern belongs to.
    pub file_path: String,
    /// Revision the pattern's line range refers to.
    pub location: Revision,
    /// Whether the oracle found test evidence.
    pub has_test_evidence: bool,
    /// Whether this finding causes a BLOCK verdict.
    pub blocking: bool,
    /// Suggested follow-up.
    pub remediation: Remediation,
    /// Old line range of a MODIFIED pattern reported at its new location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_range: Option<LineSpan>,
}

impl Finding {
    /// Severity of the underlying pattern.
    #[must_use]
    pub fn severity(&self) -> Option<Severity> {
        self.pattern.severity
    }

    /// First line of the pattern.
    #[must_use]
    pub fn line(&self) -> usize {
        self.pattern.line_range.start
    }

    /// Deterministic report ordering key.
    fn sort_key(&self) -> (u8, &str, usize, usize, ChangeKind, &str) {
        (
            severity::rank(self.pattern.severity),
            self.file_path.as_str(),
            self.pattern.line_range.start,
            self.pattern.line_range.end,
            self.change_kind,
            self.pattern.pattern_type.id(),
        )
    }
}

/// Overall outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Nothing blocks the change.
    Pass,
    /// At least one blocking finding.
    Block,
}

/// Analysis state of one revision of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionStatus {
    /// Parsed and scanned.
    Parsed,
    /// The file does not exist in this revision.
    Missing,
    /// The revision has a syntax error.
    Unparsable,
    /// The revision could not be fetched.
    Unavailable,
}

/// Per-file analysis summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    /// File path.
    pub path: String,
    /// State of the old revision.
    pub old: RevisionStatus,
    /// State of the new revision.
    pub new: RevisionStatus,
    /// Patterns found in the old revision.
    pub old_patterns: usize,
    /// Patterns found in the new revision.
    pub new_patterns: usize,
}

/// Result of one run over a change set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Findings in report order.
    pub findings: Vec<Finding>,
    /// Overall verdict.
    pub verdict: Verdict,
    /// Degraded-analysis messages (unparsable revisions, fetch failures, ...).
    pub warnings: Vec<String>,
    /// Per-file summaries, sorted by path.
    pub files: Vec<FileSummary>,
    /// Test files that are part of the change set.
    pub updated_tests: Vec<String>,
}

impl Report {
    /// Builds a report, ordering findings and deriving the verdict.
    #[must_use]
    pub fn new(
        mut findings: Vec<Finding>,
        warnings: Vec<String>,
        mut files: Vec<FileSummary>,
        mut updated_tests: Vec<String>,
    ) -> Self {
        findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        files.sort_by(|a, b| a.path.cmp(&b.path));
        updated_tests.sort();
        let verdict = if findings.iter().any(|f| f.blocking) {
            Verdict::Block
        } else {
            Verdict::Pass
        };
        Self {
            findings,
            verdict,
            warnings,
            files,
            updated_tests,
        }
    }

    /// Findings that cause the verdict to be BLOCK.
    pub fn blocking(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.blocking)
    }

    /// Findings of one change kind.
    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.change_kind == kind)
    }

    /// Process exit code: 0 for PASS, 1 for BLOCK.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self.verdict {
            Verdict::Pass => 0,
            Verdict::Block => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::{PatternType, SourceKind};

    fn finding(pattern_type: PatternType, path: &str, line: usize, blocking: bool) -> Finding {
        Finding {
            pattern: SecurityPattern {
                pattern_type,
                severity: severity::classify(pattern_type),
                line_range: LineSpan::line(line),
                snippet: String::new(),
                context: String::new(),
                source_kind: pattern_type.source_kind(),
                anchors: Vec::new(),
                scope: None,
                shape: String::new(),
            },
            change_kind: ChangeKind::Removed,
            file_path: path.to_string(),
            location: Revision::Old,
            has_test_evidence: false,
            blocking,
            remediation: Remediation::DocumentDeletion,
            previous_range: None,
        }
    }

    #[test]
    fn test_report_orders_by_severity_then_path_then_line() {
        let report = Report::new(
            vec![
                finding(PatternType::MutatingEndpoint, "a.py", 1, false),
                finding(PatternType::ErrorHandling, "a.py", 2, false),
                finding(PatternType::AuthenticationCheck, "b.py", 9, false),
                finding(PatternType::AuthenticationCheck, "a.py", 30, false),
                finding(PatternType::AuditLogging, "a.py", 5, false),
            ],
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        let order: Vec<(PatternType, &str)> = report
            .findings
            .iter()
            .map(|f| (f.pattern.pattern_type, f.file_path.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (PatternType::AuthenticationCheck, "a.py"),
                (PatternType::AuthenticationCheck, "b.py"),
                (PatternType::AuditLogging, "a.py"),
                (PatternType::ErrorHandling, "a.py"),
                (PatternType::MutatingEndpoint, "a.py"),
            ]
        );
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_blocking_finding_blocks() {
        let report = Report::new(
            vec![finding(PatternType::PersistenceWrite, "a.py", 3, true)],
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        assert_eq!(report.verdict, Verdict::Block);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.blocking().count(), 1);
        assert_eq!(report.of_kind(ChangeKind::Removed).count(), 1);
    }

    #[test]
    fn test_report_serializes_verdict_and_kinds() {
        let report = Report::new(
            vec![finding(PatternType::RoleCheck, "a.py", 3, false)],
            vec!["a.py: old revision unparsable".to_string()],
            Vec::new(),
            Vec::new(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["verdict"], "PASS");
        assert_eq!(json["findings"][0]["change_kind"], "REMOVED");
        assert_eq!(json["findings"][0]["pattern"]["pattern_type"], "role_check");
        assert_eq!(json["findings"][0]["pattern"]["severity"], "critical");
        assert_eq!(json["findings"][0]["remediation"], "document_deletion");
        assert_eq!(
            json["findings"][0]["pattern"]["source_kind"],
            serde_json::json!(SourceKind::Authz)
        );
    }
}
