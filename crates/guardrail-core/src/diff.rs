// SPDX-License-Identifier: Apache-2.0

//! Line-level diff between two revisions.
//!
//! Wraps the Myers diff from `similar` and exposes hunks with exact line
//! ranges, plus lookups the correlator uses to test overlap and to project
//! old line numbers into the new revision.

use std::ops::Range;

use serde::Serialize;
use similar::{DiffTag, TextDiff};

/// Kind of a diff hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HunkKind {
    /// Lines only present in the new revision.
    Added,
    /// Lines only present in the old revision.
    Removed,
    /// Lines present in both.
    Context,
}

/// A contiguous block of lines. Ranges are 1-based and half-open, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hunk {
    /// Lines in the old revision.
    pub old_range: Range<usize>,
    /// Lines in the new revision.
    pub new_range: Range<usize>,
    /// Hunk kind.
    pub kind: HunkKind,
}

/// Result of diffing two revisions.
#[derive(Debug, Clone, Default)]
pub struct LineDiff {
    hunks: Vec<Hunk>,
    removed: Vec<bool>,
    added: Vec<bool>,
}

/// Diffs `old` against `new` line by line.
#[must_use]
pub fn diff_lines(old: &str, new: &str) -> LineDiff {
    let diff = TextDiff::from_lines(old, new);
    let mut hunks = Vec::new();

    for op in diff.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        let old_range = (old_range.start + 1)..(old_range.end + 1);
        let new_range = (new_range.start + 1)..(new_range.end + 1);
        match tag {
            DiffTag::Equal => hunks.push(Hunk {
                old_range,
                new_range,
                kind: HunkKind::Context,
            }),
            DiffTag::Delete => hunks.push(Hunk {
                old_range,
                new_range,
                kind: HunkKind::Removed,
            }),
            DiffTag::Insert => hunks.push(Hunk {
                old_range,
                new_range,
                kind: HunkKind::Added,
            }),
            DiffTag::Replace => {
                hunks.push(Hunk {
                    old_range: old_range.clone(),
                    new_range: new_range.start..new_range.start,
                    kind: HunkKind::Removed,
                });
                hunks.push(Hunk {
                    old_range: old_range.end..old_range.end,
                    new_range,
                    kind: HunkKind::Added,
                });
            }
        }
    }

    LineDiff::from_hunks(hunks)
}

impl LineDiff {
    fn from_hunks(hunks: Vec<Hunk>) -> Self {
        let old_len = hunks.iter().map(|h| h.old_range.end).max().unwrap_or(1);
        let new_len = hunks.iter().map(|h| h.new_range.end).max().unwrap_or(1);
        let mut removed = vec![false; old_len];
        let mut added = vec![false; new_len];
        for hunk in &hunks {
            match hunk.kind {
                HunkKind::Removed => {
                    for line in hunk.old_range.clone() {
                        removed[line] = true;
                    }
                }
                HunkKind::Added => {
                    for line in hunk.new_range.clone() {
                        added[line] = true;
                    }
                }
                HunkKind::Context => {}
            }
        }
        Self {
            hunks,
            removed,
            added,
        }
    }

    /// All hunks in order.
    #[must_use]
    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    /// Returns true if the 1-based `old_line` was removed.
    #[must_use]
    pub fn is_removed(&self, old_line: usize) -> bool {
        self.removed.get(old_line).copied().unwrap_or(false)
    }

    /// Returns true if the 1-based `new_line` was added.
    #[must_use]
    pub fn is_added(&self, new_line: usize) -> bool {
        self.added.get(new_line).copied().unwrap_or(false)
    }

    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.hunks.iter().all(|h| h.kind == HunkKind::Context)
    }

    /// Where `old_line` sits in the new revision.
    ///
    /// Context lines map exactly; removed lines map to the start of the
    /// replacing region.
    #[must_use]
    pub fn project_old_line(&self, old_line: usize) -> usize {
        for hunk in &self.hunks {
            if !hunk.old_range.contains(&old_line) {
                continue;
            }
            return match hunk.kind {
                HunkKind::Context => hunk.new_range.start + (old_line - hunk.old_range.start),
                HunkKind::Removed | HunkKind::Added => hunk.new_range.start,
            };
        }
        // Past the end of the old text
        self.hunks
            .last()
            .map_or(old_line, |h| {
                h.new_range.end + old_line.saturating_sub(h.old_range.end)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OLD: &str = "def update_employee(emp_id, data):\n    log_event(\"employee_update\")\n    if state.role != \"hr\":\n        raise PermissionError(\"no\")\n    employee.update(data)\n";
    const NEW: &str = "def update_employee(emp_id, data):\n    employee.update(data)\n";

    #[test]
    fn test_pure_deletion() {
        let diff = diff_lines(OLD, NEW);
        assert!(!diff.is_removed(1));
        assert!(diff.is_removed(2));
        assert!(diff.is_removed(3));
        assert!(diff.is_removed(4));
        assert!(!diff.is_removed(5));
        assert!(!diff.is_added(1));
        assert!(!diff.is_added(2));
        assert_eq!(diff.project_old_line(5), 2);
        assert_eq!(diff.project_old_line(3), 2);
    }

    #[test]
    fn test_replace_splits_into_removed_then_added() {
        let diff = diff_lines("a\nb\nc\n", "a\nB\nc\n");
        let kinds: Vec<HunkKind> = diff.hunks().iter().map(|h| h.kind).collect();
        assert_eq!(
            kinds,
            vec![
                HunkKind::Context,
                HunkKind::Removed,
                HunkKind::Added,
                HunkKind::Context
            ]
        );
        assert_eq!(diff.hunks()[1].old_range, 2..3);
        assert_eq!(diff.hunks()[2].new_range, 2..3);
        assert!(diff.is_removed(2));
        assert!(diff.is_added(2));
    }

    #[test]
    fn test_insertion_shifts_projection() {
        let diff = diff_lines("a\nb\n", "x\ny\na\nb\n");
        assert!(diff.is_added(1));
        assert!(diff.is_added(2));
        assert_eq!(diff.project_old_line(1), 3);
        assert_eq!(diff.project_old_line(2), 4);
    }

    #[test]
    fn test_identical_text() {
        let diff = diff_lines(OLD, OLD);
        assert!(diff.is_unchanged());
        assert_eq!(diff.project_old_line(4), 4);
    }

    #[test]
    fn test_empty_old_revision() {
        let diff = diff_lines("", "a\nb\n");
        assert!(diff.is_added(1));
        assert!(diff.is_added(2));
        assert!(!diff.is_removed(1));
    }
}
