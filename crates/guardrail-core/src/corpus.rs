// SPDX-License-Identifier: Apache-2.0

//! Candidate test files consulted by the test coverage oracle.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::GuardrailError;

/// A test file and its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFile {
    /// Path relative to the project root, `/`-separated.
    pub path: String,
    /// File contents.
    pub text: String,
}

impl TestFile {
    /// Creates a test file.
    #[must_use]
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: normalize_path(&path.into()),
            text: text.into(),
        }
    }

    /// File name component of the path.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Source of candidate test files, read once per run.
pub trait TestCorpus: Send + Sync {
    /// Lists every test file with its contents.
    ///
    /// # Errors
    ///
    /// Returns `GuardrailError::Corpus` if the corpus cannot be read.
    fn list_test_files(&self) -> crate::Result<Vec<TestFile>>;
}

/// Strips `./` and converts separators to `/`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").unwrap_or(&path).to_string()
}

/// Returns true for `test_*.py` and `*_test.py` file names.
#[must_use]
pub fn is_test_file_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".py") else {
        return false;
    };
    stem.starts_with("test_") || stem.ends_with("_test")
}

/// Returns true if `path` names a test file or lies in one of `test_dirs`.
#[must_use]
pub fn is_test_path(path: &str, test_dirs: &[String]) -> bool {
    let path = normalize_path(path);
    let name = path.rsplit('/').next().unwrap_or(&path);
    if is_test_file_name(name) {
        return true;
    }
    test_dirs.iter().any(|dir| {
        let dir = normalize_path(dir);
        let dir = dir.trim_end_matches('/');
        path.starts_with(&format!("{dir}/")) || path.contains(&format!("/{dir}/"))
    })
}

/// Walks test directories on disk, honouring `.gitignore`.
#[derive(Debug, Clone)]
pub struct FsTestCorpus {
    root: PathBuf,
    dirs: Vec<String>,
}

impl FsTestCorpus {
    /// Creates a corpus rooted at `root` that walks `dirs`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, dirs: Vec<String>) -> Self {
        Self {
            root: root.into(),
            dirs,
        }
    }

    fn relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        normalize_path(&relative.to_string_lossy())
    }
}

impl TestCorpus for FsTestCorpus {
    fn list_test_files(&self) -> crate::Result<Vec<TestFile>> {
        let mut files = Vec::new();
        for dir in &self.dirs {
            let start = self.root.join(dir);
            if !start.is_dir() {
                debug!(dir = %start.display(), "Test directory not found");
                continue;
            }

            for entry in ignore::WalkBuilder::new(&start).build() {
                let entry = entry.map_err(|e| GuardrailError::Corpus {
                    message: e.to_string(),
                })?;
                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                if !is_test_file_name(&name) {
                    continue;
                }
                let text =
                    std::fs::read_to_string(entry.path()).map_err(|e| GuardrailError::Corpus {
                        message: format!("{}: {e}", entry.path().display()),
                    })?;
                files.push(TestFile {
                    path: self.relative(entry.path()),
                    text,
                });
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);
        debug!(count = files.len(), "Test corpus loaded");
        Ok(files)
    }
}

/// Fixed test files held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTestCorpus {
    files: Vec<TestFile>,
}

impl MemoryTestCorpus {
    /// Creates a corpus from `files`.
    #[must_use]
    pub fn new(files: Vec<TestFile>) -> Self {
        Self { files }
    }
}

impl TestCorpus for MemoryTestCorpus {
    fn list_test_files(&self) -> crate::Result<Vec<TestFile>> {
        Ok(self.files.clone())
    }
}
