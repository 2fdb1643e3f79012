// SPDX-License-Identifier: Apache-2.0

//! The security pattern catalogue.

use guardrail_core::{PatternType, Severity, SourceKind};
use serde::Serialize;

/// One catalogue entry.
#[derive(Debug, Serialize)]
pub struct PatternInfo {
    /// Pattern type id.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Severity, `None` for write capabilities.
    pub severity: Option<Severity>,
    /// Control family.
    pub source_kind: SourceKind,
    /// What triggers the pattern.
    pub trigger: &'static str,
    /// Why a change to it matters.
    pub implication: &'static str,
}

/// Result of `guardrail patterns`.
#[derive(Debug, Serialize)]
pub struct PatternCatalog {
    /// Entries in catalogue order.
    pub patterns: Vec<PatternInfo>,
}

/// Lists every pattern type.
pub fn run() -> PatternCatalog {
    PatternCatalog {
        patterns: PatternType::ALL
            .iter()
            .map(|&t| PatternInfo {
                id: t.id(),
                name: t.label(),
                severity: guardrail_core::severity::classify(t),
                source_kind: t.source_kind(),
                trigger: t.trigger(),
                implication: t.implication(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lists_every_pattern() {
        let catalog = run();
        assert_eq!(catalog.patterns.len(), 15);
        assert_eq!(catalog.patterns[0].id, "authentication_check");
        assert!(
            catalog
                .patterns
                .iter()
                .filter(|p| p.severity.is_none())
                .all(|p| matches!(p.source_kind, SourceKind::Mutation | SourceKind::Endpoint))
        );
    }
}
