//! The aggregated compliance verdict and its audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::finding::{Finding, Severity};

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Approved,
    RequiresReview,
}

/// Which stages actually ran (not whether they succeeded)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCompletion {
    pub extraction: bool,
    pub ai_validation: bool,
    pub regulatory_check: bool,
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Extraction,
    Quality,
    AiValidation,
    RegulatoryCheck,
    Aggregation,
}

/// How a stage ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Ran and its capability answered normally
    Completed,

    /// Ran, but fell back to a reduced-confidence result
    Degraded,

    /// Ran and its capability failed outright
    Failed,

    /// Not run because its input was missing
    Skipped,
}

/// One entry of the per-run audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageName,
    pub status: StageStatus,
    pub duration_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StageRecord {
    pub fn new(stage: StageName, status: StageStatus, duration_ms: u64) -> Self {
        Self {
            stage,
            status,
            duration_ms,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Whether the stage executed at all
    pub fn ran(&self) -> bool {
        self.status != StageStatus::Skipped
    }
}

/// Text and lists every finding was computed from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub corrected_text: String,

    /// Hex SHA-256 of `corrected_text`
    pub corrected_text_sha256: String,

    pub ingredients: Vec<String>,

    pub claims: Vec<String>,
}

impl Provenance {
    pub fn new(corrected_text: &str, ingredients: Vec<String>, claims: Vec<String>) -> Self {
        Self {
            corrected_text: corrected_text.to_string(),
            corrected_text_sha256: hash_text(corrected_text),
            ingredients,
            claims,
        }
    }
}

/// Hex SHA-256 of a text span
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Terminal artifact of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceVerdict {
    pub run_id: Uuid,

    pub filename: String,

    pub status: VerdictStatus,

    pub findings: Vec<Finding>,

    pub recommendations: Vec<Finding>,

    pub stage_completion: StageCompletion,

    pub stages: Vec<StageRecord>,

    pub provenance: Provenance,

    pub completed_at: DateTime<Utc>,
}

impl ComplianceVerdict {
    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    /// Findings produced by one stage
    pub fn findings_from<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.source == source)
    }

    pub fn stage(&self, name: StageName) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let a = Provenance::new("INGREDIENTS: Water", vec!["Water".into()], vec![]);
        let b = Provenance::new("INGREDIENTS: Water", vec![], vec![]);
        assert_eq!(a.corrected_text_sha256, b.corrected_text_sha256);
        assert_eq!(a.corrected_text_sha256.len(), 64);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&VerdictStatus::RequiresReview).unwrap(),
            "\"REQUIRES_REVIEW\""
        );
        let completion = StageCompletion {
            extraction: true,
            ai_validation: true,
            regulatory_check: false,
        };
        let json = serde_json::to_value(completion).unwrap();
        assert_eq!(json["aiValidation"], true);
        assert_eq!(json["regulatoryCheck"], false);
    }

    #[test]
    fn test_skipped_stage_did_not_run() {
        assert!(!StageRecord::new(StageName::RegulatoryCheck, StageStatus::Skipped, 0).ran());
        assert!(StageRecord::new(StageName::AiValidation, StageStatus::Degraded, 5).ran());
    }
}
