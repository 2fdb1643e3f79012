// SPDX-License-Identifier: Apache-2.0

//! Revision retrieval.
//!
//! The engine asks a [`RevisionProvider`] for the old and new text of each
//! path. [`GitRevisionProvider`] shells out to `git` with a per-call timeout;
//! [`MemoryRevisionProvider`] serves fixed text for tests and embedding.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::config::{NewSource, RevisionsConfig};
use crate::error::GuardrailError;

/// Which snapshot of a file is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Revision {
    /// Before the change.
    Old,
    /// After the change.
    New,
}

impl Revision {
    /// Lower-case label used in messages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Old => "old",
            Self::New => "new",
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Text of one revision. `exists` is false when the file is absent in that revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionText {
    /// File contents (empty when absent).
    pub text: String,
    /// Whether the file exists in this revision.
    pub exists: bool,
}

impl RevisionText {
    /// A present file.
    #[must_use]
    pub fn present(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exists: true,
        }
    }

    /// An absent file.
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }
}

/// Source of old and new file text.
#[async_trait]
pub trait RevisionProvider: Send + Sync {
    /// Returns the requested revision of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the revision cannot be retrieved. A file that
    /// simply does not exist in the revision is not an error.
    async fn get_revision(&self, path: &str, which: Revision) -> crate::Result<RevisionText>;
}

/// Reads revisions from a git repository.
#[derive(Debug, Clone)]
pub struct GitRevisionProvider {
    root: PathBuf,
    base_ref: String,
    new_source: NewSource,
    timeout: Duration,
}

impl GitRevisionProvider {
    /// Creates a provider for the repository at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: &RevisionsConfig) -> Self {
        Self {
            root: root.into(),
            base_ref: config.base_ref.clone(),
            new_source: config.new_source,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Paths added or modified in the index, relative to the repository root.
    ///
    /// # Errors
    ///
    /// Returns `GuardrailError::Git` if `git` fails (for example outside a
    /// repository) and `GuardrailError::Timeout` if it does not finish in time.
    pub async fn staged_paths(&self) -> crate::Result<Vec<String>> {
        let output = self
            .git(&["diff", "--cached", "--name-only", "--diff-filter=AM"])
            .await?;
        if !output.status.success() {
            return Err(GuardrailError::Git {
                command: "diff".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn git(&self, args: &[&str]) -> crate::Result<std::process::Output> {
        let operation = format!("git {}", args.join(" "));
        let child = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(GuardrailError::Git {
                command: args.first().copied().unwrap_or_default().to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(GuardrailError::Timeout {
                operation,
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    /// `git show <object>`; a non-zero exit means the object does not exist.
    async fn show(&self, object: &str) -> crate::Result<RevisionText> {
        let output = self.git(&["show", object]).await?;
        if output.status.success() {
            Ok(RevisionText::present(
                String::from_utf8_lossy(&output.stdout).into_owned(),
            ))
        } else {
            debug!(
                object,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Object not found in revision"
            );
            Ok(RevisionText::absent())
        }
    }
}

#[async_trait]
impl RevisionProvider for GitRevisionProvider {
    #[instrument(skip(self), fields(base = %self.base_ref))]
    async fn get_revision(&self, path: &str, which: Revision) -> crate::Result<RevisionText> {
        match (which, self.new_source) {
            (Revision::Old, _) => self.show(&format!("{}:{path}", self.base_ref)).await,
            (Revision::New, NewSource::Index) => self.show(&format!(":{path}")).await,
            (Revision::New, NewSource::Worktree) => {
                match tokio::fs::read_to_string(self.root.join(path)).await {
                    Ok(text) => Ok(RevisionText::present(text)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        Ok(RevisionText::absent())
                    }
                    Err(e) => Err(GuardrailError::Revision {
                        path: path.to_string(),
                        which: which.label().to_string(),
                        message: e.to_string(),
                    }),
                }
            }
        }
    }
}

/// In-memory revisions keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryRevisionProvider {
    files: HashMap<String, (Option<String>, Option<String>)>,
}

impl MemoryRevisionProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file; `None` marks it absent in that revision.
    #[must_use]
    pub fn with_file(
        mut self,
        path: impl Into<String>,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Self {
        self.files.insert(
            path.into(),
            (old.map(str::to_string), new.map(str::to_string)),
        );
        self
    }

    /// Paths in insertion-independent sorted order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl RevisionProvider for MemoryRevisionProvider {
    async fn get_revision(&self, path: &str, which: Revision) -> crate::Result<RevisionText> {
        let Some((old, new)) = self.files.get(path) else {
            return Err(GuardrailError::Revision {
                path: path.to_string(),
                which: which.label().to_string(),
                message: "unknown path".to_string(),
            });
        };
        let text = match which {
            Revision::Old => old,
            Revision::New => new,
        };
        Ok(text
            .as_deref()
            .map_or_else(RevisionText::absent, RevisionText::present))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_provider() {
        let provider = MemoryRevisionProvider::new()
            .with_file("app/api.py", Some("old = 1\n"), Some("new = 1\n"))
            .with_file("app/new.py", None, Some("x = 1\n"));

        let old = provider
            .get_revision("app/api.py", Revision::Old)
            .await
            .unwrap();
        assert_eq!(old, RevisionText::present("old = 1\n"));

        let missing = provider
            .get_revision("app/new.py", Revision::Old)
            .await
            .unwrap();
        assert!(!missing.exists);

        let err = provider
            .get_revision("nope.py", Revision::New)
            .await
            .unwrap_err();
        assert!(matches!(err, GuardrailError::Revision { .. }));
        assert_eq!(provider.paths(), vec!["app/api.py", "app/new.py"]);
    }

    #[tokio::test]
    async fn test_worktree_source_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("api.py"), "x = 1\n").unwrap();
        let config = RevisionsConfig {
            new_source: NewSource::Worktree,
            ..RevisionsConfig::default()
        };
        let provider = GitRevisionProvider::new(dir.path(), &config);

        let new = provider.get_revision("api.py", Revision::New).await.unwrap();
        assert_eq!(new.text, "x = 1\n");
        let gone = provider
            .get_revision("gone.py", Revision::New)
            .await
            .unwrap();
        assert!(!gone.exists);
    }

    #[test]
    fn test_added_file_has_no_old_revision() {
        let provider = MemoryRevisionProvider::new().with_file("app/new.py", None, Some("x = 1\n"));
        let old =
            tokio_test::block_on(provider.get_revision("app/new.py", Revision::Old)).unwrap();
        assert_eq!(old, RevisionText::absent());
    }

    #[test]
    fn test_revision_labels() {
        assert_eq!(Revision::Old.to_string(), "old");
        assert_eq!(serde_json::to_string(&Revision::New).unwrap(), "\"new\"");
    }
}
