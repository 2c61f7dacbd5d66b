//! Findings: the normalized unit every stage after extraction emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a finding, least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Compliance,
    Error,
}

impl Severity {
    /// Severities that send a label to human review
    pub fn requires_review(&self) -> bool {
        matches!(self, Self::Compliance | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Compliance => "COMPLIANCE",
            Self::Error => "ERROR",
        }
    }
}

/// A single issue or recommendation with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Machine-readable kind, e.g. `unapproved_ingredient`
    #[serde(rename = "type")]
    pub kind: String,

    pub severity: Severity,

    pub message: String,

    /// Stage that produced the finding (`quality`, `ai`, `regulatory`, ...)
    pub source: String,

    /// Capability or tool behind the finding (`tesseract`, `validate_ingredients`, ...)
    pub source_tag: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl Finding {
    pub fn new(
        kind: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        source: impl Into<String>,
        source_tag: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            severity,
            message: message.into(),
            source: source.into(),
            source_tag: source_tag.into(),
            ingredient: None,
            claim: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_ingredient(mut self, ingredient: impl Into<String>) -> Self {
        self.ingredient = Some(ingredient.into());
        self
    }

    pub fn with_claim(mut self, claim: impl Into<String>) -> Self {
        self.claim = Some(claim.into());
        self
    }
}

/// Findings and recommendations emitted by one stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingSet {
    pub findings: Vec<Finding>,
    pub recommendations: Vec<Finding>,
}

impl FindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn recommend(&mut self, finding: Finding) {
        self.recommendations.push(finding);
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty() && self.recommendations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_serialization() {
        let finding = Finding::new(
            "unapproved_ingredient",
            Severity::Compliance,
            "Ingredient 'xylitol-x' is not FDA approved",
            "regulatory",
            "validate_ingredients",
        )
        .with_ingredient("xylitol-x");

        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["type"], "unapproved_ingredient");
        assert_eq!(json["severity"], "COMPLIANCE");
        assert_eq!(json["sourceTag"], "validate_ingredients");
        assert_eq!(json["ingredient"], "xylitol-x");
        assert!(json.get("claim").is_none());
    }

    #[test]
    fn test_review_severities() {
        assert!(!Severity::Info.requires_review());
        assert!(!Severity::Warning.requires_review());
        assert!(Severity::Compliance.requires_review());
        assert!(Severity::Error.requires_review());
    }

    #[test]
    fn test_finding_set_counts() {
        let mut set = FindingSet::new();
        set.push(Finding::new("a", Severity::Warning, "w", "quality", "ocr"));
        set.push(Finding::new("b", Severity::Warning, "w", "quality", "ocr"));
        set.recommend(Finding::new("c", Severity::Info, "i", "quality", "ocr"));

        assert_eq!(set.count(Severity::Warning), 2);
        assert_eq!(set.count(Severity::Info), 0);
        assert_eq!(set.recommendations.len(), 1);
    }
}
