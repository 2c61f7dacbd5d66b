//! Quality Gate Integration Tests
//!
//! Tier policy over extraction results produced by the extraction stage.

mod common;

use std::sync::Arc;

use common::{FakeOcr, CLEAR_LABEL};
use labelcheck::core::{extraction, quality, ExtractionStage};
use labelcheck::domain::{ExtractionResult, ImageSource, QualityTier};

async fn extract(engine: FakeOcr) -> ExtractionResult {
    let stage = ExtractionStage::new(Arc::new(engine));
    stage.extract(&ImageSource::Path("label.png".into())).await
}

#[tokio::test]
async fn test_clear_text_is_excellent() {
    let result = extract(FakeOcr::clear(CLEAR_LABEL)).await;

    assert!(result.confidence > 0.85);
    assert_eq!(result.low_confidence_ratio(), 0.0);
    let assessment = quality::assess(&result);
    assert_eq!(assessment.tier, QualityTier::Excellent);
    assert!(assessment.issues.is_empty());
}

#[tokio::test]
async fn test_low_confidence_words_keep_good_tier() {
    // Overall confidence 0.9 but every word below the 60 threshold
    let mut result = extract(FakeOcr::clear(CLEAR_LABEL).with_word_confidence(40.0)).await;
    result.confidence = 0.9;

    let assessment = quality::assess(&result);
    assert_eq!(assessment.tier, QualityTier::Good);
    assert!(assessment
        .issues
        .contains(&quality::ISSUE_LOW_CONFIDENCE_WORDS.to_string()));
}

#[tokio::test]
async fn test_confidence_bands() {
    let cases = [
        (65.0, QualityTier::Poor, quality::ISSUE_LOW_CONFIDENCE),
        (80.0, QualityTier::Fair, quality::ISSUE_MODERATE_CONFIDENCE),
    ];

    for (word_confidence, tier, issue) in cases {
        let result = extract(FakeOcr::clear(CLEAR_LABEL).with_word_confidence(word_confidence)).await;
        let assessment = quality::assess(&result);
        assert_eq!(assessment.tier, tier, "word confidence {}", word_confidence);
        assert!(assessment.issues.contains(&issue.to_string()));
    }
}

#[tokio::test]
async fn test_empty_text_is_poor() {
    let result = extract(FakeOcr::clear("")).await;
    let assessment = quality::assess(&result);

    assert_eq!(assessment.tier, QualityTier::Poor);
    assert!(assessment.issues.contains(&quality::ISSUE_NO_TEXT.to_string()));
}

#[tokio::test]
async fn test_engine_failure_is_captured() {
    let result = extract(FakeOcr::failing()).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("engine crashed"));
    assert_eq!(result.text, "");
    assert_eq!(result.confidence, 0.0);
    assert_eq!(quality::assess(&result).tier, QualityTier::Poor);

    let findings = extraction::findings(&result, "fake_ocr");
    assert_eq!(findings.findings[0].kind, "ocr_failure");
    assert_eq!(findings.findings[0].source_tag, "fake_ocr");
}

#[tokio::test]
async fn test_short_text_forces_poor() {
    let result = extract(FakeOcr::clear("INGREDIENTS: Water, Sugar, Salt")).await;
    let assessment = quality::assess(&result);

    assert_eq!(assessment.tier, QualityTier::Poor);
    assert!(assessment.issues.contains(&quality::ISSUE_SHORT_TEXT.to_string()));
}

#[test]
fn test_assessment_is_pure() {
    let result = extraction::from_text(CLEAR_LABEL);
    assert_eq!(quality::assess(&result), quality::assess(&result));
}

#[tokio::test]
async fn test_sections_detected_from_ocr_text() {
    let result = extract(FakeOcr::clear(CLEAR_LABEL)).await;
    assert!(result.section("ingredients").unwrap().starts_with("Water, Sugar, Salt"));
    assert!(result.section("manufacturer").is_some());
}
