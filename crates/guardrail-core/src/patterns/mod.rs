// SPDX-License-Identifier: Apache-2.0

//! Security pattern detection.
//!
//! Walks a lowered [`SyntaxTree`](crate::syntax::SyntaxTree) and emits the
//! constructs that implement a security control (access checks, audit calls,
//! validation, rate limiting, error handling) or expose a write capability.
//! Detection is purely structural: strings and comments never match.

mod extractor;
mod rules;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use extractor::PatternExtractor;
pub use rules::PatternRules;

use crate::severity::Severity;
use crate::syntax::LineSpan;

/// Kind of security construct a pattern represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Condition on an authentication flag.
    AuthenticationCheck,
    /// Comparison against a role.
    RoleCheck,
    /// Membership test of an action against a fixed set.
    ActionWhitelist,
    /// Raise of a permission error.
    PermissionDenial,
    /// Function whose name denotes an authorization helper.
    AuthorizationFunction,
    /// Decorator that enforces authorization.
    AuthorizationDecorator,
    /// Call to an audit logger.
    AuditLogging,
    /// Validation function or validation failure.
    InputValidation,
    /// Rate limiter decorator or call.
    RateLimiting,
    /// `try`/`except` block or HTTP error raise.
    ErrorHandling,
    /// `is` / `is not` guard.
    DefensiveCheck,
    /// Database write or attribute mutation.
    PersistenceWrite,
    /// Route handling a mutating HTTP verb.
    MutatingEndpoint,
    /// Function whose name denotes a mutation.
    MutationFunction,
    /// Assignment to shared agent state.
    StateMutation,
}

impl PatternType {
    /// Every pattern type, in catalogue order.
    pub const ALL: [PatternType; 15] = [
        Self::AuthenticationCheck,
        Self::RoleCheck,
        Self::ActionWhitelist,
        Self::PermissionDenial,
        Self::AuthorizationFunction,
        Self::AuthorizationDecorator,
        Self::AuditLogging,
        Self::InputValidation,
        Self::RateLimiting,
        Self::ErrorHandling,
        Self::DefensiveCheck,
        Self::PersistenceWrite,
        Self::MutatingEndpoint,
        Self::MutationFunction,
        Self::StateMutation,
    ];

    /// Stable snake-case identifier (used in config and SARIF rule ids).
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::AuthenticationCheck => "authentication_check",
            Self::RoleCheck => "role_check",
            Self::ActionWhitelist => "action_whitelist",
            Self::PermissionDenial => "permission_denial",
            Self::AuthorizationFunction => "authorization_function",
            Self::AuthorizationDecorator => "authorization_decorator",
            Self::AuditLogging => "audit_logging",
            Self::InputValidation => "input_validation",
            Self::RateLimiting => "rate_limiting",
            Self::ErrorHandling => "error_handling",
            Self::DefensiveCheck => "defensive_check",
            Self::PersistenceWrite => "persistence_write",
            Self::MutatingEndpoint => "mutating_endpoint",
            Self::MutationFunction => "mutation_function",
            Self::StateMutation => "state_mutation",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AuthenticationCheck => "Authentication check",
            Self::RoleCheck => "Role check",
            Self::ActionWhitelist => "Action whitelist",
            Self::PermissionDenial => "Permission denial",
            Self::AuthorizationFunction => "Authorization function",
            Self::AuthorizationDecorator => "Authorization decorator",
            Self::AuditLogging => "Audit logging",
            Self::InputValidation => "Input validation",
            Self::RateLimiting => "Rate limiting",
            Self::ErrorHandling => "Error handling",
            Self::DefensiveCheck => "Defensive check",
            Self::PersistenceWrite => "Persistence write",
            Self::MutatingEndpoint => "Mutating endpoint",
            Self::MutationFunction => "Mutation function",
            Self::StateMutation => "State mutation",
        }
    }

    /// What triggers the pattern.
    #[must_use]
    pub fn trigger(self) -> &'static str {
        match self {
            Self::AuthenticationCheck => "condition on a name or attribute containing \"authenticated\"",
            Self::RoleCheck => "== / != comparison of a role operand with a string literal",
            Self::ActionWhitelist => "`action in (...)` membership test against literals",
            Self::PermissionDenial => "raise of a permission/authorization exception",
            Self::AuthorizationFunction => "def whose name denotes authorization",
            Self::AuthorizationDecorator => "authorization decorator such as @require_role",
            Self::AuditLogging => "call of an audit logging function",
            Self::InputValidation => "validation function or raise of ValueError/*Validation*",
            Self::RateLimiting => "decorator or call denoting rate limiting",
            Self::ErrorHandling => "try/except block or raise of an HTTP exception",
            Self::DefensiveCheck => "if test using `is` / `is not`",
            Self::PersistenceWrite => "db/session add, delete, commit, merge or setattr",
            Self::MutatingEndpoint => "route decorator for POST, PUT, PATCH or DELETE",
            Self::MutationFunction => "def named create_/update_/delete_/insert_/remove_...",
            Self::StateMutation => "assignment to `state.<attr>` or `selected_api` in agent code",
        }
    }

    /// What losing the pattern means, used in report text.
    #[must_use]
    pub fn implication(self) -> &'static str {
        match self {
            Self::AuthenticationCheck => "Unauthenticated callers may reach this code path",
            Self::RoleCheck | Self::ActionWhitelist => {
                "Users may perform actions their role does not allow"
            }
            Self::PermissionDenial => "Unauthorized requests may no longer be rejected",
            Self::AuthorizationFunction | Self::AuthorizationDecorator => {
                "Authorization may no longer be enforced"
            }
            Self::AuditLogging => "Security-relevant actions may go unrecorded",
            Self::InputValidation => "Malformed or malicious input may be accepted",
            Self::RateLimiting => "Endpoints may be open to abuse or brute force",
            Self::ErrorHandling | Self::DefensiveCheck => {
                "Failures may surface as crashes or leak internal details"
            }
            Self::PersistenceWrite | Self::MutatingEndpoint | Self::MutationFunction => {
                "New write capability without test coverage"
            }
            Self::StateMutation => "Agent behaviour may change without test coverage",
        }
    }

    /// Source kind of the pattern.
    #[must_use]
    pub fn source_kind(self) -> SourceKind {
        match self {
            Self::AuthenticationCheck => SourceKind::Authn,
            Self::RoleCheck
            | Self::ActionWhitelist
            | Self::PermissionDenial
            | Self::AuthorizationFunction
            | Self::AuthorizationDecorator => SourceKind::Authz,
            Self::AuditLogging => SourceKind::Audit,
            Self::InputValidation => SourceKind::Validation,
            Self::RateLimiting => SourceKind::RateLimit,
            Self::ErrorHandling | Self::DefensiveCheck => SourceKind::ErrorHandling,
            Self::PersistenceWrite | Self::MutationFunction | Self::StateMutation => {
                SourceKind::Mutation
            }
            Self::MutatingEndpoint => SourceKind::Endpoint,
        }
    }

    /// Returns true for write-capability patterns, which carry no severity.
    #[must_use]
    pub fn is_capability(self) -> bool {
        matches!(
            self.source_kind(),
            SourceKind::Mutation | SourceKind::Endpoint
        )
    }

    /// Parses a snake-case identifier.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Security control family of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Authentication.
    Authn,
    /// Authorization.
    Authz,
    /// Audit trail.
    Audit,
    /// Input validation.
    Validation,
    /// Rate limiting.
    RateLimit,
    /// Error handling.
    ErrorHandling,
    /// State mutation.
    Mutation,
    /// Externally reachable endpoint.
    Endpoint,
}

impl SourceKind {
    /// Short label used in reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Authn => "authn",
            Self::Authz => "authz",
            Self::Audit => "audit",
            Self::Validation => "validation",
            Self::RateLimit => "rate_limit",
            Self::ErrorHandling => "error_handling",
            Self::Mutation => "mutation",
            Self::Endpoint => "endpoint",
        }
    }

    /// Authentication or authorization.
    #[must_use]
    pub fn is_access_control(self) -> bool {
        matches!(self, Self::Authn | Self::Authz)
    }
}

/// A security-relevant construct located in one revision of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPattern {
    /// What was detected.
    pub pattern_type: PatternType,
    /// Severity, `None` for write capabilities.
    pub severity: Option<Severity>,
    /// Smallest line range identifying the construct.
    pub line_range: LineSpan,
    /// Source excerpt of `line_range`, trimmed to one line.
    pub snippet: String,
    /// One-line description for reports.
    pub context: String,
    /// Control family.
    pub source_kind: SourceKind,
    /// Identifiers a test would mention (function, callee, literal operands).
    pub anchors: Vec<String>,
    /// Function the pattern belongs to: the decorated or defined function
    /// for decorator and definition patterns, otherwise the enclosing one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Variable-name-insensitive structural signature.
    pub shape: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_type_ids_round_trip() {
        for pattern_type in PatternType::ALL {
            assert_eq!(PatternType::from_id(pattern_type.id()), Some(pattern_type));
            let json = serde_json::to_string(&pattern_type).unwrap();
            assert_eq!(json, format!("\"{}\"", pattern_type.id()));
        }
        assert_eq!(PatternType::from_id("sql_injection"), None);
    }

    #[test]
    fn test_capabilities() {
        assert!(PatternType::MutatingEndpoint.is_capability());
        assert!(PatternType::PersistenceWrite.is_capability());
        assert!(!PatternType::RoleCheck.is_capability());
        assert!(PatternType::RoleCheck.source_kind().is_access_control());
        assert!(
            PatternType::AuthenticationCheck
                .source_kind()
                .is_access_control()
        );
        assert!(!PatternType::AuditLogging.source_kind().is_access_control());
    }
}
