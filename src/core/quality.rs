//! Quality gate.
//!
//! Pure scoring of an extraction into a tier plus issues and recommendations.
//! The gate never blocks the pipeline; downstream stages only read it as a
//! confidence caveat.

use crate::domain::{ExtractionResult, Finding, FindingSet, QualityAssessment, QualityTier, Severity};

pub const POOR_CONFIDENCE_BELOW: f64 = 0.70;
pub const FAIR_CONFIDENCE_BELOW: f64 = 0.85;
pub const EXCELLENT_MAX_LOW_CONFIDENCE_RATIO: f64 = 0.1;
pub const HIGH_LOW_CONFIDENCE_RATIO: f64 = 0.2;
pub const MIN_TEXT_CHARS: usize = 50;

pub const ISSUE_NO_TEXT: &str = "No text detected";
pub const ISSUE_LOW_CONFIDENCE: &str = "Low overall confidence";
pub const ISSUE_MODERATE_CONFIDENCE: &str = "Moderate confidence";
pub const ISSUE_LOW_CONFIDENCE_WORDS: &str = "High number of low-confidence words";
pub const ISSUE_SHORT_TEXT: &str = "Very short text extracted";

pub const SOURCE: &str = "quality";
const SOURCE_TAG: &str = "quality_gate";

/// Score an extraction
pub fn assess(result: &ExtractionResult) -> QualityAssessment {
    let confidence = result.confidence;
    let ratio = result.low_confidence_ratio();
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if result.text.trim().is_empty() {
        return QualityAssessment {
            tier: QualityTier::Poor,
            confidence,
            low_confidence_ratio: ratio,
            issues: vec![ISSUE_NO_TEXT.to_string()],
            recommendations: vec![
                "Retake the photo with the label filling the frame and in focus".to_string(),
            ],
        };
    }

    let mut tier = if confidence < POOR_CONFIDENCE_BELOW {
        issues.push(ISSUE_LOW_CONFIDENCE.to_string());
        recommendations.push(
            "Apply image preprocessing (deskew, contrast, denoise) or route to manual review"
                .to_string(),
        );
        QualityTier::Poor
    } else if confidence < FAIR_CONFIDENCE_BELOW {
        issues.push(ISSUE_MODERATE_CONFIDENCE.to_string());
        recommendations.push(
            "Manually verify critical sections (ingredients, allergens, warnings)".to_string(),
        );
        QualityTier::Fair
    } else if ratio < EXCELLENT_MAX_LOW_CONFIDENCE_RATIO {
        QualityTier::Excellent
    } else {
        QualityTier::Good
    };

    if ratio > HIGH_LOW_CONFIDENCE_RATIO {
        issues.push(ISSUE_LOW_CONFIDENCE_WORDS.to_string());
        recommendations
            .push("Review low-confidence words before relying on extracted values".to_string());
    }

    if result.text.trim().chars().count() < MIN_TEXT_CHARS {
        tier = QualityTier::Poor;
        issues.push(ISSUE_SHORT_TEXT.to_string());
        recommendations.push("Ensure the whole label is visible in the image".to_string());
    }

    QualityAssessment {
        tier,
        confidence,
        low_confidence_ratio: ratio,
        issues,
        recommendations,
    }
}

/// Findings for an assessment: issues are warnings on a poor tier, informational otherwise
pub fn findings(assessment: &QualityAssessment) -> FindingSet {
    let mut set = FindingSet::new();
    let severity = if assessment.tier == QualityTier::Poor {
        Severity::Warning
    } else {
        Severity::Info
    };

    set.push(Finding::new(
        "ocr_quality_summary",
        Severity::Info,
        format!(
            "OCR quality {} (confidence {:.0}%, {:.0}% low-confidence words)",
            assessment.tier.as_str(),
            assessment.confidence * 100.0,
            assessment.low_confidence_ratio * 100.0
        ),
        SOURCE,
        SOURCE_TAG,
    ));

    for issue in &assessment.issues {
        set.push(Finding::new("ocr_quality", severity, issue.clone(), SOURCE, SOURCE_TAG));
    }
    for recommendation in &assessment.recommendations {
        set.recommend(Finding::new(
            "ocr_quality_recommendation",
            Severity::Info,
            recommendation.clone(),
            SOURCE,
            SOURCE_TAG,
        ));
    }
    set
}
