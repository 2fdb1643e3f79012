// SPDX-License-Identifier: Apache-2.0

//! SARIF (Static Analysis Results Interchange Format) output support.
//!
//! Converts findings to SARIF 2.1.0 for GitHub Code Scanning and other
//! consumers. Rule ids are pattern type ids.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::patterns::PatternType;
use crate::report::{Finding, Report};

const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";

/// SARIF report structure (SARIF 2.1.0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifReport {
    /// SARIF schema version.
    pub version: String,
    /// SARIF schema URI.
    #[serde(rename = "$schema")]
    pub schema: String,
    /// List of runs (one per tool invocation).
    pub runs: Vec<SarifRun>,
}

/// A single run of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifRun {
    /// Tool information.
    pub tool: SarifTool,
    /// List of results (findings).
    pub results: Vec<SarifResult>,
}

/// Tool information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifTool {
    /// Driver (the tool itself).
    pub driver: SarifDriver,
}

/// Tool driver information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifDriver {
    /// Tool name.
    pub name: String,
    /// Tool version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// One rule per pattern type.
    pub rules: Vec<SarifRule>,
}

/// Rule metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifRule {
    /// Rule ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What triggers the rule.
    #[serde(rename = "shortDescription")]
    pub short_description: SarifMessage,
    /// Why a change to it matters.
    #[serde(rename = "fullDescription")]
    pub full_description: SarifMessage,
}

/// A single result (finding).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifResult {
    /// Rule ID that triggered this result.
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    /// Result level (note, warning, error).
    pub level: String,
    /// Human-readable message.
    pub message: SarifMessage,
    /// Locations where the issue was found.
    pub locations: Vec<SarifLocation>,
    /// Stable fingerprint for deduplication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprints: Option<SarifFingerprints>,
    /// Change kind, revision and policy outcome.
    pub properties: SarifProperties,
}

/// Message structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifMessage {
    /// Message text.
    pub text: String,
}

/// Location information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifLocation {
    /// Physical location in source code.
    #[serde(rename = "physicalLocation")]
    pub physical_location: SarifPhysicalLocation,
}

/// Physical location in source code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifPhysicalLocation {
    /// Artifact (file) location.
    #[serde(rename = "artifactLocation")]
    pub artifact_location: SarifArtifactLocation,
    /// Region (line) information.
    pub region: SarifRegion,
}

/// Artifact location (file path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifArtifactLocation {
    /// File URI or path.
    pub uri: String,
}

/// Region information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifRegion {
    /// Start line (1-indexed).
    #[serde(rename = "startLine")]
    pub start_line: usize,
    /// End line (1-indexed, inclusive).
    #[serde(rename = "endLine")]
    pub end_line: usize,
}

/// Fingerprints for deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifFingerprints {
    /// Primary fingerprint (SHA-256 hash).
    #[serde(rename = "primaryLocationLineHash")]
    pub primary_location_line_hash: String,
}

/// Guardrail-specific result properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarifProperties {
    /// `ADDED`, `MODIFIED` or `REMOVED`.
    #[serde(rename = "changeKind")]
    pub change_kind: String,
    /// Revision the region refers to (`old` or `new`).
    pub revision: String,
    /// Whether the finding blocks the commit.
    pub blocking: bool,
    /// Whether test evidence was found.
    #[serde(rename = "hasTestEvidence")]
    pub has_test_evidence: bool,
}

impl From<Vec<Finding>> for SarifReport {
    fn from(findings: Vec<Finding>) -> Self {
        let results: Vec<SarifResult> = findings.into_iter().map(SarifResult::from).collect();
        let rules = PatternType::ALL
            .iter()
            .map(|t| SarifRule {
                id: t.id().to_string(),
                name: t.label().to_string(),
                short_description: SarifMessage {
                    text: t.trigger().to_string(),
                },
                full_description: SarifMessage {
                    text: t.implication().to_string(),
                },
            })
            .collect();

        SarifReport {
            version: "2.1.0".to_string(),
            schema: SARIF_SCHEMA.to_string(),
            runs: vec![SarifRun {
                tool: SarifTool {
                    driver: SarifDriver {
                        name: "guardrail".to_string(),
                        version: Some(env!("CARGO_PKG_VERSION").to_string()),
                        rules,
                    },
                },
                results,
            }],
        }
    }
}

impl From<&Report> for SarifReport {
    fn from(report: &Report) -> Self {
        Self::from(report.findings.clone())
    }
}

impl From<Finding> for SarifResult {
    fn from(finding: Finding) -> Self {
        let pattern = &finding.pattern;
        // Capability findings have no severity; only blocking ones are errors.
        let level = match (pattern.severity, finding.blocking) {
            (_, true) => "error",
            (Some(severity), false) => severity.sarif_level(),
            (None, false) => "note",
        };

        // Stable across runs: file, revision, change, pattern and structural shape.
        let fingerprint_input = format!(
            "{}:{}:{}:{}:{}",
            finding.file_path,
            finding.location,
            finding.change_kind.label(),
            pattern.pattern_type.id(),
            pattern.shape
        );
        let fingerprint = hex::encode(Sha256::digest(fingerprint_input.as_bytes()));

        let text = format!(
            "{} {}: {}. {}",
            finding.change_kind.label(),
            pattern.pattern_type.label(),
            pattern.context,
            pattern.pattern_type.implication()
        );

        SarifResult {
            rule_id: pattern.pattern_type.id().to_string(),
            level: level.to_string(),
            message: SarifMessage { text },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifactLocation {
                        uri: finding.file_path.clone(),
                    },
                    region: SarifRegion {
                        start_line: pattern.line_range.start,
                        end_line: pattern.line_range.end,
                    },
                },
            }],
            fingerprints: Some(SarifFingerprints {
                primary_location_line_hash: fingerprint,
            }),
            properties: SarifProperties {
                change_kind: finding.change_kind.label().to_string(),
                revision: finding.location.label().to_string(),
                blocking: finding.blocking,
                has_test_evidence: finding.has_test_evidence,
            },
        }
    }
}
