// SPDX-License-Identifier: Apache-2.0

//! Severity classification.
//!
//! Severity is a fixed function of the pattern type. Surrounding code never
//! raises or lowers it; a removed check in a debug-only branch is exactly as
//! severe as one on the main path.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::patterns::PatternType;

/// Severity level of a security pattern.
///
/// Ordering follows report order: `Critical < High < Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Access control: authentication and authorization.
    Critical,
    /// Audit logging, input validation and rate limiting.
    High,
    /// Error handling and defensive checks.
    Medium,
}

impl Severity {
    /// Upper-case label used in reports.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
        }
    }

    /// SARIF result level.
    #[must_use]
    pub fn sarif_level(self) -> &'static str {
        match self {
            Self::Critical | Self::High => "error",
            Self::Medium => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns the severity of a pattern type, or `None` for write capabilities.
///
/// Capability patterns are not ranked: they either need a test or they don't.
#[must_use]
pub fn classify(pattern_type: PatternType) -> Option<Severity> {
    match pattern_type {
        PatternType::AuthenticationCheck
        | PatternType::RoleCheck
        | PatternType::ActionWhitelist
        | PatternType::PermissionDenial
        | PatternType::AuthorizationFunction
        | PatternType::AuthorizationDecorator => Some(Severity::Critical),
        PatternType::AuditLogging | PatternType::InputValidation | PatternType::RateLimiting => {
            Some(Severity::High)
        }
        PatternType::ErrorHandling | PatternType::DefensiveCheck => Some(Severity::Medium),
        PatternType::PersistenceWrite
        | PatternType::MutatingEndpoint
        | PatternType::MutationFunction
        | PatternType::StateMutation => None,
    }
}

/// Sort rank of an optional severity. Capabilities sort after `Medium`.
#[must_use]
pub fn rank(severity: Option<Severity>) -> u8 {
    match severity {
        Some(Severity::Critical) => 0,
        Some(Severity::High) => 1,
        Some(Severity::Medium) => 2,
        None => 3,
    }
}
