// SPDX-License-Identifier: Apache-2.0

//! Change correlation between old and new patterns.
//!
//! Maps every pattern of the old revision to UNCHANGED, MODIFIED or REMOVED
//! using the diff hunks as anchors, and reports new-only patterns on added
//! lines as ADDED. UNCHANGED patterns are dropped. Matching policy lives in
//! [`are_equivalent`] and [`are_similar`].
//!
//! Equivalent patterns match anywhere in the file, so moved code is not
//! reported. Similar patterns only match within the same function: a check
//! deleted from one function and a different one added to another is a
//! REMOVED plus an ADDED finding, never a MODIFIED one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::LineDiff;
use crate::patterns::SecurityPattern;
use crate::revision::Revision;
use crate::syntax::LineSpan;

/// Minimum token Jaccard index for two snippets to count as similar.
const SIMILARITY_THRESHOLD: f64 = 0.5;

/// How a pattern changed between revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// Present only in the new revision.
    Added,
    /// Present in both revisions, but changed.
    Modified,
    /// Present only in the old revision.
    Removed,
}

impl ChangeKind {
    /// Upper-case label used in reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Removed => "REMOVED",
        }
    }
}

/// A pattern whose status changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedPattern {
    /// The pattern as found in `location`.
    pub pattern: SecurityPattern,
    /// Change classification.
    pub change: ChangeKind,
    /// Revision `pattern.line_range` refers to.
    pub location: Revision,
    /// Old range of a MODIFIED pattern reported at its new location.
    pub previous: Option<LineSpan>,
    /// Whether a pattern of the same type still exists in the new revision.
    pub same_type_survives: bool,
}

/// Patterns of both revisions. `None` marks a revision that is missing or unanalyzable.
#[derive(Debug, Clone, Copy)]
pub struct Revisions<'a> {
    /// Patterns of the old revision.
    pub old: Option<&'a [SecurityPattern]>,
    /// Patterns of the new revision.
    pub new: Option<&'a [SecurityPattern]>,
}

/// Same type and either the same whitespace-free snippet or the same structural shape.
#[must_use]
pub fn are_equivalent(old: &SecurityPattern, new: &SecurityPattern) -> bool {
    old.pattern_type == new.pattern_type
        && (strip_whitespace(&old.snippet) == strip_whitespace(&new.snippet)
            || old.shape == new.shape)
}

/// Same type and either a shared anchor or mostly the same snippet tokens.
#[must_use]
pub fn are_similar(old: &SecurityPattern, new: &SecurityPattern) -> bool {
    if old.pattern_type != new.pattern_type {
        return false;
    }
    if old.anchors.iter().any(|a| new.anchors.contains(a)) {
        return true;
    }
    jaccard(&tokens(&old.snippet), &tokens(&new.snippet)) >= SIMILARITY_THRESHOLD
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Lower-cased identifier and literal tokens of a snippet.
pub(crate) fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Correlates old and new patterns through `diff`.
#[must_use]
pub fn correlate(revisions: Revisions<'_>, diff: &LineDiff) -> Vec<ChangedPattern> {
    match (revisions.old, revisions.new) {
        (Some(old), Some(new)) => correlate_both(old, new, diff),
        (Some(old), None) => removed_only(old, diff),
        (None, Some(new)) => added_only(new, diff, &vec![false; new.len()]),
        (None, None) => Vec::new(),
    }
}

fn touches_removed(pattern: &SecurityPattern, diff: &LineDiff) -> bool {
    pattern.line_range.lines().any(|l| diff.is_removed(l))
}

fn fully_removed(pattern: &SecurityPattern, diff: &LineDiff) -> bool {
    pattern.line_range.lines().all(|l| diff.is_removed(l))
}

fn touches_added(pattern: &SecurityPattern, diff: &LineDiff) -> bool {
    pattern.line_range.lines().any(|l| diff.is_added(l))
}

fn same_scope(old: &SecurityPattern, new: &SecurityPattern) -> bool {
    old.scope == new.scope
}

/// Nearest unclaimed new pattern accepted by `accept`; ties go to the earliest.
fn nearest(
    new: &[SecurityPattern],
    claimed: &[bool],
    projected: usize,
    accept: impl Fn(&SecurityPattern) -> bool,
) -> Option<usize> {
    new.iter()
        .enumerate()
        .filter(|(i, q)| !claimed[*i] && accept(q))
        .min_by_key(|(_, q)| q.line_range.start.abs_diff(projected))
        .map(|(i, _)| i)
}

fn correlate_both(
    old: &[SecurityPattern],
    new: &[SecurityPattern],
    diff: &LineDiff,
) -> Vec<ChangedPattern> {
    let mut claimed = vec![false; new.len()];
    let mut matched = vec![false; old.len()];
    let mut changes = Vec::new();

    let survives = |p: &SecurityPattern| new.iter().any(|q| q.pattern_type == p.pattern_type);

    // Untouched patterns claim their equivalent first so edits elsewhere
    // cannot steal them.
    for (idx, p) in old.iter().enumerate() {
        if touches_removed(p, diff) {
            continue;
        }
        let projected = diff.project_old_line(p.line_range.start);
        if let Some(i) = nearest(new, &claimed, projected, |q| are_equivalent(p, q)) {
            claimed[i] = true;
            matched[idx] = true;
        }
    }

    for (idx, p) in old.iter().enumerate() {
        if !touches_removed(p, diff) {
            continue;
        }
        matched[idx] = true;
        let projected = diff.project_old_line(p.line_range.start);

        if let Some(i) = nearest(new, &claimed, projected, |q| are_equivalent(p, q)) {
            claimed[i] = true;
            debug!(
                pattern = %p.pattern_type,
                from = %p.line_range,
                to = %new[i].line_range,
                "Pattern moved or reformatted"
            );
            continue;
        }

        if let Some(i) = nearest(new, &claimed, projected, |q| {
            same_scope(p, q) && are_similar(p, q)
        }) {
            claimed[i] = true;
            changes.push(ChangedPattern {
                pattern: new[i].clone(),
                change: ChangeKind::Modified,
                location: Revision::New,
                previous: Some(p.line_range),
                same_type_survives: true,
            });
            continue;
        }

        let change = if fully_removed(p, diff) {
            ChangeKind::Removed
        } else {
            ChangeKind::Modified
        };
        changes.push(ChangedPattern {
            pattern: p.clone(),
            change,
            location: Revision::Old,
            previous: None,
            same_type_survives: survives(p),
        });
    }

    // Untouched patterns whose counterpart no longer looks equivalent
    for (idx, p) in old.iter().enumerate() {
        if matched[idx] {
            continue;
        }
        let projected = diff.project_old_line(p.line_range.start);
        if let Some(i) = nearest(new, &claimed, projected, |q| {
            q.pattern_type == p.pattern_type && same_scope(p, q)
        }) {
            claimed[i] = true;
        }
    }

    changes.extend(added_only(new, diff, &claimed));
    changes
}

fn removed_only(old: &[SecurityPattern], diff: &LineDiff) -> Vec<ChangedPattern> {
    old.iter()
        .filter(|p| fully_removed(p, diff))
        .map(|p| ChangedPattern {
            pattern: p.clone(),
            change: ChangeKind::Removed,
            location: Revision::Old,
            previous: None,
            same_type_survives: false,
        })
        .collect()
}

fn added_only(new: &[SecurityPattern], diff: &LineDiff, claimed: &[bool]) -> Vec<ChangedPattern> {
    new.iter()
        .enumerate()
        .filter(|(i, q)| !claimed[*i] && touches_added(q, diff))
        .map(|(_, q)| ChangedPattern {
            pattern: q.clone(),
            change: ChangeKind::Added,
            location: Revision::New,
            previous: None,
            same_type_survives: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff_lines;
    use crate::patterns::{PatternExtractor, PatternType};
    use crate::syntax::SyntaxTree;

    fn patterns(src: &str) -> Vec<SecurityPattern> {
        let tree = SyntaxTree::parse(src, "test").expect("fixture parses");
        PatternExtractor::default().extract(&tree)
    }

    fn run(old: &str, new: &str) -> Vec<ChangedPattern> {
        let old_patterns = patterns(old);
        let new_patterns = patterns(new);
        correlate(
            Revisions {
                old: Some(&old_patterns),
                new: Some(&new_patterns),
            },
            &diff_lines(old, new),
        )
    }

    const GUARDED: &str = r#"def update_employee(emp_id, data):
    log_event("employee_update", session_id, {"emp_id": emp_id})
    if state.role != "hr":
        raise PermissionError("Only HR can update employees")
    employee.update(data)
"#;

    #[test]
    fn test_removed_checks() {
        let new = "def update_employee(emp_id, data):\n    employee.update(data)\n";
        let changes = run(GUARDED, new);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.change == ChangeKind::Removed));
        assert!(changes.iter().all(|c| c.location == Revision::Old));
        let role = changes
            .iter()
            .find(|c| c.pattern.pattern_type == PatternType::RoleCheck)
            .expect("role check reported");
        assert_eq!(role.pattern.line_range, LineSpan::new(3, 4));
        assert!(!role.same_type_survives);
    }

    #[test]
    fn test_no_op_has_no_changes() {
        assert!(run(GUARDED, GUARDED).is_empty());
    }

    #[test]
    fn test_moved_check_is_unchanged() {
        let new = r#"def update_employee(emp_id, data):
    log_event("employee_update", session_id, {"emp_id": emp_id})
    payload = dict(data)
    if state.role != "hr":
        raise PermissionError("Only HR can update employees")
    employee.update(payload)
"#;
        let changes = run(GUARDED, new);
        assert!(
            changes.iter().all(|c| c.change != ChangeKind::Removed
                && c.change != ChangeKind::Modified),
            "unexpected changes: {changes:?}"
        );
    }

    #[test]
    fn test_reformatted_check_is_unchanged() {
        let new = r#"def update_employee(emp_id, data):
    log_event("employee_update", session_id, {"emp_id": emp_id})
    if ctx.role != "hr":
        raise PermissionError("Only HR can update employees")
    employee.update(data)
"#;
        assert!(run(GUARDED, new).is_empty());
    }

    #[test]
    fn test_changed_role_is_modified() {
        let new = GUARDED.replace("state.role != \"hr\"", "state.role not in (\"hr\", \"manager\")");
        let changes = run(GUARDED, &new);
        assert_eq!(changes.len(), 1, "{changes:?}");
        let change = &changes[0];
        assert_eq!(change.change, ChangeKind::Modified);
        assert_eq!(change.location, Revision::New);
        assert_eq!(change.previous, Some(LineSpan::new(3, 4)));
    }

    #[test]
    fn test_audit_call_replaced_in_another_function() {
        let old = r#"def approve(x):
    log_event("approve", x)
    return x


def other(y):
    return y
"#;
        let new = r#"def approve(x):
    return x


def other(y):
    log_event("other", y)
    return y
"#;
        let changes = run(old, new);
        let kinds: Vec<(ChangeKind, Revision, usize)> = changes
            .iter()
            .map(|c| (c.change, c.location, c.pattern.line_range.start))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ChangeKind::Removed, Revision::Old, 2),
                (ChangeKind::Added, Revision::New, 6),
            ]
        );
        assert!(changes[0].same_type_survives);
        assert_eq!(changes[0].pattern.scope.as_deref(), Some("approve"));
    }

    #[test]
    fn test_role_check_replaced_in_another_function() {
        let old = r#"def a(state):
    if state.role != "hr":
        raise PermissionError("HR only")
    return 1


def b(state):
    return 2
"#;
        let new = r#"def a(state):
    return 1


def b(state):
    if state.role != "admin":
        raise PermissionError("Admins only")
    return 2
"#;
        let changes = run(old, new);
        let removed: Vec<&ChangedPattern> = changes
            .iter()
            .filter(|c| c.change == ChangeKind::Removed)
            .collect();
        assert_eq!(removed.len(), 1, "{changes:?}");
        assert_eq!(removed[0].pattern.pattern_type, PatternType::RoleCheck);
        assert_eq!(removed[0].pattern.line_range, LineSpan::new(2, 3));
        assert!(
            changes
                .iter()
                .all(|c| c.change != ChangeKind::Modified)
        );
        assert!(changes.iter().any(|c| c.change == ChangeKind::Added
            && c.pattern.pattern_type == PatternType::RoleCheck
            && c.pattern.scope.as_deref() == Some("b")));
    }

    #[test]
    fn test_new_file_only_adds() {
        let new_patterns = patterns(GUARDED);
        let changes = correlate(
            Revisions {
                old: None,
                new: Some(&new_patterns),
            },
            &diff_lines("", GUARDED),
        );
        assert_eq!(changes.len(), new_patterns.len());
        assert!(changes.iter().all(|c| c.change == ChangeKind::Added));
    }

    #[test]
    fn test_unanalyzable_new_only_removes() {
        let old_patterns = patterns(GUARDED);
        let broken = "def update_employee(emp_id, data):\n    employee.update(data\n";
        let changes = correlate(
            Revisions {
                old: Some(&old_patterns),
                new: None,
            },
            &diff_lines(GUARDED, broken),
        );
        let kinds: Vec<PatternType> = changes.iter().map(|c| c.pattern.pattern_type).collect();
        assert_eq!(kinds, vec![PatternType::AuditLogging, PatternType::RoleCheck]);
    }

    #[test]
    fn test_equivalence_and_similarity() {
        let hr = patterns("if state.role != \"hr\":\n    deny()\n");
        let reformatted = patterns("x = 1\nif  ctx.role  != \"hr\":\n    deny()\n");
        let admin = patterns("if state.role != \"admin\":\n    deny()\n");
        let audit = patterns("log_event(\"x\")\n");
        assert!(are_equivalent(&hr[0], &reformatted[0]));
        assert!(!are_equivalent(&hr[0], &admin[0]));
        assert!(are_similar(&hr[0], &admin[0]));
        assert!(!are_similar(&hr[0], &audit[0]));
    }
}
