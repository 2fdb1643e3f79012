// SPDX-License-Identifier: Apache-2.0

//! Decision engine.
//!
//! Fetches both revisions of every changed file concurrently, analyses each
//! file on the rayon pool, asks the test oracle for evidence and applies the
//! verdict policy. Results are merged and sorted, so parallelism never
//! changes the report.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::config::AppConfig;
use crate::corpus::{TestCorpus, TestFile, is_test_path, normalize_path};
use crate::correlate::{ChangeKind, ChangedPattern, Revisions, correlate};
use crate::diff::diff_lines;
use crate::error::GuardrailError;
use crate::oracle::TestOracle;
use crate::patterns::{PatternExtractor, PatternRules, PatternType, SecurityPattern};
use crate::report::{FileSummary, Finding, Remediation, Report, RevisionStatus};
use crate::revision::{Revision, RevisionProvider, RevisionText};
use crate::syntax::SyntaxTree;

/// Analysis of one file, before the oracle and the policy are applied.
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    /// File path.
    pub path: String,
    /// Parse status and pattern counts.
    pub summary: FileSummary,
    /// Changed patterns in correlation order.
    pub changes: Vec<ChangedPattern>,
    /// Degraded-analysis messages.
    pub warnings: Vec<String>,
}

/// Both revisions of a path, or the reason they could not be fetched.
struct Fetched {
    path: String,
    old: RevisionText,
    new: Option<RevisionText>,
    warnings: Vec<String>,
}

/// Runs the full pipeline over a change set.
pub struct Engine {
    config: AppConfig,
    extractor: PatternExtractor,
    provider: Arc<dyn RevisionProvider>,
    corpus: Arc<dyn TestCorpus>,
}

#[bon::bon]
impl Engine {
    /// Creates an engine.
    ///
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use guardrail_core::{AppConfig, Engine, MemoryRevisionProvider, MemoryTestCorpus};
    ///
    /// let engine = Engine::builder()
    ///     .config(AppConfig::default())
    ///     .provider(Arc::new(MemoryRevisionProvider::new()))
    ///     .corpus(Arc::new(MemoryTestCorpus::default()))
    ///     .build();
    /// ```
    #[builder]
    pub fn new(
        #[builder(default)] config: AppConfig,
        provider: Arc<dyn RevisionProvider>,
        corpus: Arc<dyn TestCorpus>,
    ) -> Self {
        let extractor = PatternExtractor::new(PatternRules::from_config(&config.patterns));
        Self {
            config,
            extractor,
            provider,
            corpus,
        }
    }
}

impl Engine {
    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Analyses `paths` and returns the report.
    ///
    /// Test files in `paths` are not analysed; they count as updated tests
    /// for the oracle. Paths outside the configured scope are skipped.
    /// Per-file failures become report warnings.
    ///
    /// # Errors
    ///
    /// Per-file problems never fail the run; they are reported as warnings
    /// and the affected revision is treated as unanalyzable.
    #[instrument(skip_all, fields(paths = paths.len()))]
    pub async fn run(&self, paths: &[String]) -> crate::Result<Report> {
        let mut paths: Vec<String> = paths.iter().map(|p| normalize_path(p)).collect();
        paths.sort();
        paths.dedup();

        let (updated_tests, sources): (Vec<String>, Vec<String>) = paths
            .into_iter()
            .partition(|p| is_test_path(p, &self.config.oracle.test_dirs));
        let (sources, skipped): (Vec<String>, Vec<String>) = sources
            .into_iter()
            .partition(|p| self.config.scope.includes(p));
        for path in &skipped {
            debug!(path = %path, "Out of scope");
        }

        let fetched = self.fetch_all(sources).await;
        let (test_files, mut warnings) = self.load_corpus().await;
        let oracle = TestOracle::new(self.config.oracle.clone(), test_files, &updated_tests);
        if oracle.is_empty() {
            debug!("Test corpus is empty; no finding has test evidence");
        }

        let analyses: Vec<FileAnalysis> = fetched
            .par_iter()
            .map(|f| match &f.new {
                Some(new) => {
                    let mut analysis = self.analyze_file(&f.path, &f.old, new);
                    let mut notes = f.warnings.clone();
                    notes.append(&mut analysis.warnings);
                    analysis.warnings = notes;
                    analysis
                }
                None => unavailable(f),
            })
            .collect();

        let mut findings = Vec::new();
        let mut files = Vec::with_capacity(analyses.len());
        for analysis in analyses {
            warnings.extend(analysis.warnings);
            let mut decided = Vec::with_capacity(analysis.changes.len());
            for change in analysis.changes {
                let id = change.pattern.pattern_type.id();
                if self.config.scope.should_ignore(id, &analysis.path) {
                    debug!(path = %analysis.path, pattern = id, "Finding ignored by configuration");
                    continue;
                }
                decided.push(self.decide(&analysis.path, change, &oracle));
            }
            fold_guarded_capabilities(&mut decided);
            findings.append(&mut decided);
            files.push(analysis.summary);
        }
        warnings.sort();

        let report = Report::new(findings, warnings, files, updated_tests);
        info!(
            findings = report.findings.len(),
            blocking = report.blocking().count(),
            verdict = ?report.verdict,
            "Analysis complete"
        );
        Ok(report)
    }

    /// Analyses one file from its two revisions. Pure and synchronous.
    #[must_use]
    pub fn analyze_file(&self, path: &str, old: &RevisionText, new: &RevisionText) -> FileAnalysis {
        let mut warnings = Vec::new();
        let (old_status, old_patterns) = self.scan(path, Revision::Old, old, &mut warnings);
        let (new_status, new_patterns) = self.scan(path, Revision::New, new, &mut warnings);

        let diff = diff_lines(&old.text, &new.text);
        let changes = if diff.is_unchanged() {
            Vec::new()
        } else {
            correlate(
                Revisions {
                    old: old_patterns.as_deref(),
                    new: new_patterns.as_deref(),
                },
                &diff,
            )
        };
        debug!(path, changes = changes.len(), "File analysed");

        FileAnalysis {
            path: path.to_string(),
            summary: FileSummary {
                path: path.to_string(),
                old: old_status,
                new: new_status,
                old_patterns: old_patterns.as_ref().map_or(0, Vec::len),
                new_patterns: new_patterns.as_ref().map_or(0, Vec::len),
            },
            changes,
            warnings,
        }
    }

    fn scan(
        &self,
        path: &str,
        which: Revision,
        revision: &RevisionText,
        warnings: &mut Vec<String>,
    ) -> (RevisionStatus, Option<Vec<SecurityPattern>>) {
        if !revision.exists {
            return (RevisionStatus::Missing, None);
        }
        match SyntaxTree::parse(&revision.text, which.label()) {
            Ok(tree) => (
                RevisionStatus::Parsed,
                Some(self.extractor.extract_file(path, &tree)),
            ),
            Err(e) => {
                warn!(path, revision = %which, error = %e, "Revision is unanalyzable");
                warnings.push(format!("{path}: {e}"));
                (RevisionStatus::Unparsable, None)
            }
        }
    }

    async fn fetch_all(&self, paths: Vec<String>) -> Vec<Fetched> {
        let concurrency = self.config.revisions.concurrency.max(1);
        let mut fetched: Vec<Fetched> = stream::iter(paths)
            .map(|path| {
                let provider = Arc::clone(&self.provider);
                async move { fetch(provider.as_ref(), path).await }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        fetched.sort_by(|a, b| a.path.cmp(&b.path));
        fetched
    }

    async fn load_corpus(&self) -> (Vec<TestFile>, Vec<String>) {
        let corpus = Arc::clone(&self.corpus);
        let listed = tokio::task::spawn_blocking(move || corpus.list_test_files())
            .await
            .unwrap_or_else(|e| {
                Err(GuardrailError::Corpus {
                    message: e.to_string(),
                })
            });
        match listed {
            Ok(files) => (files, Vec::new()),
            Err(e) => {
                warn!(error = %e, "Test corpus unavailable; treating as empty");
                (
                    Vec::new(),
                    vec![format!("{e}; no test evidence was considered")],
                )
            }
        }
    }

    fn decide(&self, path: &str, change: ChangedPattern, oracle: &TestOracle) -> Finding {
        let ChangedPattern {
            pattern,
            change: kind,
            location,
            previous,
            same_type_survives,
        } = change;
        let policy = &self.config.policy;
        let has_test_evidence = oracle.has_evidence(&pattern, kind);
        let access_control = pattern.source_kind.is_access_control();

        let blocking = match kind {
            ChangeKind::Removed => policy.escalate_deletions,
            ChangeKind::Added if pattern.pattern_type.is_capability() => !has_test_evidence,
            ChangeKind::Added => {
                access_control
                    && policy.require_tests_for_added_authorization
                    && !has_test_evidence
            }
            ChangeKind::Modified => access_control && !has_test_evidence,
        };
        let remediation = match kind {
            ChangeKind::Removed if same_type_survives => Remediation::MoveAndVerify,
            ChangeKind::Removed => Remediation::DocumentDeletion,
            ChangeKind::Added | ChangeKind::Modified => Remediation::AddTest,
        };

        debug!(
            path,
            pattern = %pattern.pattern_type,
            change = kind.label(),
            line = pattern.line_range.start,
            has_test_evidence,
            blocking,
            "Finding"
        );

        Finding {
            pattern,
            change_kind: kind,
            file_path: path.to_string(),
            location,
            has_test_evidence,
            blocking,
            remediation,
            previous_range: previous,
        }
    }
}

async fn fetch(provider: &dyn RevisionProvider, path: String) -> Fetched {
    let mut warnings = Vec::new();
    let old = match provider.get_revision(&path, Revision::Old).await {
        Ok(old) => old,
        Err(e) => {
            warn!(path = %path, error = %e, "Old revision unavailable; treating file as new");
            warnings.push(format!("{e}; treated as a new file"));
            RevisionText::absent()
        }
    };
    let new = match provider.get_revision(&path, Revision::New).await {
        Ok(new) => Some(new),
        Err(e) => {
            warn!(path = %path, error = %e, "New revision unavailable; skipping file");
            warnings.push(format!("{e}; file skipped"));
            None
        }
    };
    Fetched {
        path,
        old,
        new,
        warnings,
    }
}

/// A new function behind an authorization decorator blocks once.
///
/// When the decorator's ADDED finding blocks, ADDED capability findings of the
/// same function stay in the report but no longer block on their own.
fn fold_guarded_capabilities(findings: &mut [Finding]) {
    let guarded: Vec<String> = findings
        .iter()
        .filter(|f| {
            f.blocking
                && f.change_kind == ChangeKind::Added
                && f.pattern.pattern_type == PatternType::AuthorizationDecorator
        })
        .filter_map(|f| f.pattern.scope.clone())
        .collect();
    if guarded.is_empty() {
        return;
    }
    for finding in findings.iter_mut() {
        if finding.blocking
            && finding.change_kind == ChangeKind::Added
            && finding.pattern.pattern_type.is_capability()
            && finding
                .pattern
                .scope
                .as_ref()
                .is_some_and(|scope| guarded.contains(scope))
        {
            debug!(
                path = %finding.file_path,
                pattern = %finding.pattern.pattern_type,
                line = finding.pattern.line_range.start,
                "Capability folded into its authorization decorator"
            );
            finding.blocking = false;
        }
    }
}

fn unavailable(fetched: &Fetched) -> FileAnalysis {
    FileAnalysis {
        path: fetched.path.clone(),
        summary: FileSummary {
            path: fetched.path.clone(),
            old: if fetched.old.exists {
                RevisionStatus::Parsed
            } else {
                RevisionStatus::Missing
            },
            new: RevisionStatus::Unavailable,
            old_patterns: 0,
            new_patterns: 0,
        },
        changes: Vec::new(),
        warnings: fetched.warnings.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemoryTestCorpus;
    use crate::report::Verdict;
    use crate::revision::MemoryRevisionProvider;

    const OLD: &str = "\
def update_employee(emp_id, data, state):
    log_event(\"employee_update\", state.session_id)
    if state.role != \"hr\":
        raise PermissionError(\"HR only\")
    employee = load(emp_id)
    employee.update(data)
    return employee
";

    const NEW: &str = "\
def update_employee(emp_id, data, state):
    employee = load(emp_id)
    employee.update(data)
    return employee
";

    fn engine(config: AppConfig, provider: MemoryRevisionProvider) -> Engine {
        Engine::builder()
            .config(config)
            .provider(Arc::new(provider))
            .corpus(Arc::new(MemoryTestCorpus::default()))
            .build()
    }

    #[tokio::test]
    async fn test_removed_guard_is_advisory() {
        let provider = MemoryRevisionProvider::new().with_file("app/api.py", Some(OLD), Some(NEW));
        let report = engine(AppConfig::default(), provider)
            .run(&["app/api.py".to_string()])
            .await
            .unwrap();

        let kinds: Vec<(PatternType, ChangeKind)> = report
            .findings
            .iter()
            .map(|f| (f.pattern.pattern_type, f.change_kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (PatternType::RoleCheck, ChangeKind::Removed),
                (PatternType::AuditLogging, ChangeKind::Removed),
            ]
        );
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.findings[0].remediation, Remediation::DocumentDeletion);
    }

    #[tokio::test]
    async fn test_escalated_deletions_block() {
        let mut config = AppConfig::default();
        config.policy.escalate_deletions = true;
        let provider = MemoryRevisionProvider::new().with_file("app/api.py", Some(OLD), Some(NEW));
        let report = engine(config, provider)
            .run(&["app/api.py".to_string()])
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Block);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_test_files_and_out_of_scope_paths_are_not_analysed() {
        let provider = MemoryRevisionProvider::new()
            .with_file("tests/test_api.py", None, Some("def test_x():\n    db.add(x)\n"))
            .with_file("app/__init__.py", None, Some("db.add(x)\n"));
        let report = engine(AppConfig::default(), provider)
            .run(&["./tests/test_api.py".to_string(), "app/__init__.py".to_string()])
            .await
            .unwrap();
        assert!(report.findings.is_empty());
        assert!(report.files.is_empty());
        assert_eq!(report.updated_tests, vec!["tests/test_api.py"]);
    }

    #[tokio::test]
    async fn test_unknown_path_degrades_to_warning() {
        let report = engine(AppConfig::default(), MemoryRevisionProvider::new())
            .run(&["app/gone.py".to_string()])
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.files[0].new, RevisionStatus::Unavailable);
    }

    #[test]
    fn test_analyze_file_unparsable_new_reports_full_removals_only() {
        let engine = engine(AppConfig::default(), MemoryRevisionProvider::new());
        let analysis = engine.analyze_file(
            "app/api.py",
            &RevisionText::present(OLD),
            &RevisionText::present("def update_employee(emp_id, data, state):\n    load(emp_id\n"),
        );
        assert_eq!(analysis.summary.new, RevisionStatus::Unparsable);
        assert_eq!(analysis.warnings.len(), 1);
        assert!(
            analysis
                .changes
                .iter()
                .all(|c| c.change == ChangeKind::Removed)
        );
    }

    #[tokio::test]
    async fn test_new_write_without_tests_blocks_unless_ignored() {
        let src = "def save(item):\n    db.add(item)\n";
        let provider = MemoryRevisionProvider::new().with_file("app/store.py", None, Some(src));
        let report = engine(AppConfig::default(), provider.clone())
            .run(&["app/store.py".to_string()])
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Block);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].change_kind, ChangeKind::Added);
        assert_eq!(report.findings[0].location, Revision::New);

        let mut config = AppConfig::default();
        config.scope.ignore_patterns = vec!["persistence_write".to_string()];
        let report = engine(config, provider)
            .run(&["app/store.py".to_string()])
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Pass);
        assert!(report.findings.is_empty());
        assert_eq!(report.files[0].new_patterns, 1);
    }
    #[tokio::test]
    async fn test_new_authorized_function_blocks_once() {
        let new = "x = 1\n\n@require_role(\"admin\")\ndef approve_leave(req):\n    return req\n";
        let provider =
            MemoryRevisionProvider::new().with_file("app/leave.py", Some("x = 1\n"), Some(new));
        let report = engine(AppConfig::default(), provider.clone())
            .run(&["app/leave.py".to_string()])
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Block);
        let blocking: Vec<&Finding> = report.blocking().collect();
        assert_eq!(blocking.len(), 1);
        assert_eq!(blocking[0].change_kind, ChangeKind::Added);
        assert_eq!(
            blocking[0].pattern.pattern_type,
            PatternType::AuthorizationDecorator
        );
        assert_eq!(blocking[0].pattern.line_range.start, 3);

        let mut config = AppConfig::default();
        config.policy.require_tests_for_added_authorization = false;
        let report = engine(config, provider)
            .run(&["app/leave.py".to_string()])
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.findings.len(), 1);
        assert!(!report.findings[0].blocking);
    }

    #[tokio::test]
    async fn test_guarded_endpoint_folds_into_decorator() {
        let new = "@router.post(\"/leave\")\n@require_role(\"manager\")\ndef approve_leave(req):\n    return req\n";
        let provider = MemoryRevisionProvider::new().with_file("app/leave.py", None, Some(new));
        let report = engine(AppConfig::default(), provider.clone())
            .run(&["app/leave.py".to_string()])
            .await
            .unwrap();
        assert_eq!(report.findings.len(), 2);
        let blocking: Vec<PatternType> = report
            .blocking()
            .map(|f| f.pattern.pattern_type)
            .collect();
        assert_eq!(blocking, vec![PatternType::AuthorizationDecorator]);

        // Without the decorator policy the endpoint blocks on its own.
        let mut config = AppConfig::default();
        config.policy.require_tests_for_added_authorization = false;
        let report = engine(config, provider)
            .run(&["app/leave.py".to_string()])
            .await
            .unwrap();
        let blocking: Vec<PatternType> = report
            .blocking()
            .map(|f| f.pattern.pattern_type)
            .collect();
        assert_eq!(blocking, vec![PatternType::MutatingEndpoint]);
    }

    #[tokio::test]
    async fn test_agent_state_mutation_without_tests_blocks() {
        let old = "def execute(state):\n    return state\n";
        let new = "def execute(state):\n    state.selected = \"search\"\n    return state\n";
        let provider = MemoryRevisionProvider::new()
            .with_file("app/agent/execute.py", Some(old), Some(new))
            .with_file("app/api/execute.py", Some(old), Some(new));
        let report = engine(AppConfig::default(), provider)
            .run(&[
                "app/agent/execute.py".to_string(),
                "app/api/execute.py".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(report.verdict, Verdict::Block);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].file_path, "app/agent/execute.py");
        assert_eq!(
            report.findings[0].pattern.pattern_type,
            PatternType::StateMutation
        );
    }
}
