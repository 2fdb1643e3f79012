// SPDX-License-Identifier: Apache-2.0

//! Configuration management for Guardrail.
//!
//! Provides layered configuration from files and environment variables.
//! Uses XDG-compliant paths with environment variable support.
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables (prefix: `GUARDRAIL_`)
//! 2. Project file: `.guardrail.toml` in the working directory
//! 3. User file: `~/.config/guardrail/config.toml`
//! 4. Built-in defaults
//!
//! # Examples
//!
//! ```bash
//! # Make REMOVED findings blocking for a single run
//! GUARDRAIL_POLICY__ESCALATE_DELETIONS=true guardrail check
//! ```

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::GuardrailError;

/// Name of the per-project configuration file.
pub const PROJECT_CONFIG_FILE: &str = ".guardrail.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Which files are analysed.
    pub scope: ScopeConfig,
    /// Keyword registries for the pattern extractor.
    pub patterns: PatternsConfig,
    /// Test evidence lookup.
    pub oracle: OracleConfig,
    /// Verdict policy.
    pub policy: PolicyConfig,
    /// Revision retrieval.
    pub revisions: RevisionsConfig,
}

/// File selection and ignore rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// File extensions that are analysed (e.g., `[".py"]`).
    pub extensions: Vec<String>,
    /// Path fragments that exclude a file from analysis.
    pub exclude: Vec<String>,
    /// Pattern type ids whose findings are dropped (e.g., `["error_handling"]`).
    pub ignore_patterns: Vec<String>,
    /// Path prefixes whose findings are dropped.
    pub ignore_paths: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            extensions: vec![".py".to_string()],
            exclude: strings(&["conftest.py", "__init__.py", "/migrations/"]),
            ignore_patterns: Vec::new(),
            ignore_paths: Vec::new(),
        }
    }
}

impl ScopeConfig {
    /// Returns true if `path` has an analysed extension and no excluded fragment.
    #[must_use]
    pub fn includes(&self, path: &str) -> bool {
        let normalized = format!("/{}", path.replace('\\', "/"));
        self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
            && !self
                .exclude
                .iter()
                .any(|fragment| normalized.contains(fragment.as_str()))
    }

    /// Returns true if findings of `pattern_id` in `path` should be dropped.
    #[must_use]
    pub fn should_ignore(&self, pattern_id: &str, path: &str) -> bool {
        self.ignore_patterns.iter().any(|p| p == pattern_id)
            || self
                .ignore_paths
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Keyword registries used by the pattern extractor.
///
/// Matching is case-insensitive. Entries described as "fragments" match
/// anywhere inside a name; the others must match exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    /// Name fragments of authentication flags (`state.is_authenticated`).
    pub authentication_fragments: Vec<String>,
    /// String literals treated as role values.
    pub role_values: Vec<String>,
    /// Name fragments identifying a role operand.
    pub role_fragments: Vec<String>,
    /// Names of the variable checked against an action whitelist.
    pub action_names: Vec<String>,
    /// Exception name fragments denoting a permission failure.
    pub permission_error_fragments: Vec<String>,
    /// Function name fragments denoting authorization logic.
    pub authorization_function_fragments: Vec<String>,
    /// Decorator names denoting authorization.
    pub authorization_decorators: Vec<String>,
    /// Callee names that log an audit event.
    pub audit_calls: Vec<String>,
    /// Callee name fragments that log an audit event.
    pub audit_fragments: Vec<String>,
    /// Function name prefixes denoting input validation.
    pub validation_prefixes: Vec<String>,
    /// Verbs that, combined with an input noun, denote validation.
    pub validation_verbs: Vec<String>,
    /// Nouns that, combined with a verb, denote validation.
    pub validation_nouns: Vec<String>,
    /// Exceptions raised by validation code.
    pub validation_exceptions: Vec<String>,
    /// Exception name fragments raised by validation code.
    pub validation_exception_fragments: Vec<String>,
    /// Dotted name fragments denoting rate limiting.
    pub rate_limit_fragments: Vec<String>,
    /// Exception name fragments denoting HTTP errors.
    pub http_exception_fragments: Vec<String>,
    /// Receiver names of persistence writes (`db.add`).
    pub persistence_receivers: Vec<String>,
    /// Method names of persistence writes.
    pub persistence_methods: Vec<String>,
    /// Builtins that write attributes.
    pub attribute_writers: Vec<String>,
    /// Non-idempotent HTTP verbs on route decorators.
    pub route_verbs: Vec<String>,
    /// Verbs that make a function name a mutation (`create_`, `_update`).
    pub mutation_verbs: Vec<String>,
    /// Receivers whose attribute assignments mutate agent state (`state.x = ...`).
    pub state_receivers: Vec<String>,
    /// Variables whose assignment mutates agent state (`selected_api = ...`).
    pub state_variables: Vec<String>,
    /// Directory names where state mutations are reported; empty means everywhere.
    pub state_mutation_dirs: Vec<String>,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            authentication_fragments: strings(&["authenticated"]),
            role_values: strings(&["employee", "manager", "hr", "admin"]),
            role_fragments: strings(&["role"]),
            action_names: strings(&["action"]),
            permission_error_fragments: strings(&[
                "permission",
                "unauthorized",
                "forbidden",
                "accessdenied",
                "notauthorized",
            ]),
            authorization_function_fragments: strings(&[
                "authorize",
                "permission",
                "access",
                "require_role",
                "check_role",
                "check_auth",
            ]),
            authorization_decorators: strings(&[
                "require_role",
                "requires_role",
                "roles_required",
                "login_required",
                "permission_required",
                "require_auth",
                "requires_auth",
                "authorize",
            ]),
            audit_calls: strings(&[
                "log_event",
                "log_execution",
                "log_audit",
                "audit_log",
                "log_action",
            ]),
            audit_fragments: strings(&["audit"]),
            validation_prefixes: strings(&["validate_", "sanitize_"]),
            validation_verbs: strings(&[
                "validate", "sanitize", "check", "verify", "clean", "escape", "filter", "parse",
            ]),
            validation_nouns: strings(&[
                "input", "data", "param", "arg", "value", "payload", "request", "field",
            ]),
            validation_exceptions: strings(&["valueerror"]),
            validation_exception_fragments: strings(&["validation"]),
            rate_limit_fragments: strings(&["rate_limit", "ratelimit", "limiter", "throttle"]),
            http_exception_fragments: strings(&["httpexception"]),
            persistence_receivers: strings(&["db", "session"]),
            persistence_methods: strings(&["add", "delete", "commit", "merge"]),
            attribute_writers: strings(&["setattr", "delattr"]),
            route_verbs: strings(&["post", "put", "patch", "delete"]),
            mutation_verbs: strings(&["create", "update", "delete", "insert", "remove", "onboard"]),
            state_receivers: strings(&["state"]),
            state_variables: strings(&["selected_api"]),
            state_mutation_dirs: strings(&["agent"]),
        }
    }
}

/// Test evidence lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Directories walked for test files, relative to the working directory.
    pub test_dirs: Vec<String>,
    /// File name keywords of authorization test files.
    pub auth_test_keywords: Vec<String>,
    /// Minimum share of snippet words that must appear in a test file.
    pub min_keyword_overlap: f64,
    /// Minimum number of snippet words that must appear in a test file.
    pub min_keyword_hits: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            test_dirs: strings(&["tests"]),
            auth_test_keywords: strings(&["auth", "rbac", "permission", "access", "role"]),
            min_keyword_overlap: 0.6,
            min_keyword_hits: 2,
        }
    }
}

/// Verdict policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Treat REMOVED findings as blocking.
    pub escalate_deletions: bool,
    /// Block ADDED authentication/authorization findings without test evidence.
    pub require_tests_for_added_authorization: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            escalate_deletions: false,
            require_tests_for_added_authorization: true,
        }
    }
}

/// Where the new revision of a file is read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewSource {
    /// The staged content (`git show :<path>`).
    #[default]
    Index,
    /// The file on disk.
    Worktree,
}

/// Revision retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevisionsConfig {
    /// Git revision holding the old text.
    pub base_ref: String,
    /// Source of the new text.
    pub new_source: NewSource,
    /// Timeout for each `git` invocation in seconds.
    pub timeout_seconds: u64,
    /// Maximum number of concurrent revision fetches.
    pub concurrency: usize,
}

impl Default for RevisionsConfig {
    fn default() -> Self {
        Self {
            base_ref: "HEAD".to_string(),
            new_source: NewSource::Index,
            timeout_seconds: 10,
            concurrency: 8,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Returns the Guardrail configuration directory.
///
/// Respects the `XDG_CONFIG_HOME` environment variable if set,
/// otherwise defaults to `~/.config/guardrail`.
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return Some(PathBuf::from(xdg_config).join("guardrail"));
    }
    dirs::home_dir().map(|home| home.join(".config").join("guardrail"))
}

/// Returns the path to the user configuration file.
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Load application configuration for the current working directory.
///
/// Environment variables use the prefix `GUARDRAIL_` and double underscore
/// for nested keys (e.g., `GUARDRAIL_REVISIONS__BASE_REF`).
///
/// # Errors
///
/// Returns `GuardrailError::Config` if a config file exists but is invalid.
pub fn load_config() -> Result<AppConfig, GuardrailError> {
    load_config_from(Path::new("."))
}

/// Load application configuration with `project_dir` as the project root.
///
/// # Errors
///
/// Returns `GuardrailError::Config` if a config file exists but is invalid.
pub fn load_config_from(project_dir: &Path) -> Result<AppConfig, GuardrailError> {
    let mut builder = Config::builder();

    // Lowest priority first: user file, then project file, then environment
    if let Some(user_path) = config_file_path() {
        builder = builder.add_source(File::from(user_path).required(false));
    }

    let config = builder
        .add_source(File::from(project_dir.join(PROJECT_CONFIG_FILE)).required(false))
        .add_source(
            Environment::with_prefix("GUARDRAIL")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("scope.ignore_patterns")
                .with_list_parse_key("scope.ignore_paths")
                .with_list_parse_key("oracle.test_dirs")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    tracing::debug!(
        base_ref = %app_config.revisions.base_ref,
        escalate_deletions = app_config.policy.escalate_deletions,
        "Configuration loaded"
    );

    Ok(app_config)
}
