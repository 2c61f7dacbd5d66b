//! Quality assessment of an extraction.

use serde::{Deserialize, Serialize};

/// Quality tier, worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

/// Output of the quality gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub tier: QualityTier,

    /// Overall extraction confidence (0..1) the tier was derived from
    pub confidence: f64,

    pub low_confidence_ratio: f64,

    pub issues: Vec<String>,

    pub recommendations: Vec<String>,
}

impl QualityAssessment {
    /// Whether downstream stages should carry a confidence caveat
    pub fn needs_caveat(&self) -> bool {
        self.tier <= QualityTier::Fair
    }
}
