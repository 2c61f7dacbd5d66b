//! AI Fallback Integration Tests
//!
//! Provider ordering, parse failures and degraded results of the AI stage.

mod common;

use std::time::Duration;

use common::{model_answer, ScriptedProvider, Script, CLEAR_LABEL};
use labelcheck::adapters::ProviderError;
use labelcheck::core::ai::{self, AiInput, AiValidationStage, ProviderSlot};
use labelcheck::core::{extraction, quality};
use labelcheck::domain::{AiProvider, Severity, ValidationRecord};

async fn validate(stage: &AiValidationStage) -> ValidationRecord {
    let extraction = extraction::from_text(CLEAR_LABEL);
    let assessment = quality::assess(&extraction);
    stage
        .validate(&AiInput {
            extraction: &extraction,
            quality: &assessment,
            regulations: &["FDA".to_string()],
        })
        .await
}

#[tokio::test]
async fn test_primary_success() {
    let primary = ScriptedProvider::new("primary", Script::Answer(model_answer(CLEAR_LABEL, &["Water", "Sugar", "Salt"])));
    let secondary = ScriptedProvider::new("secondary", Script::Fail(ProviderError::RateLimited));
    let stage = AiValidationStage::new(vec![
        ProviderSlot::configured(AiProvider::Primary, primary.clone()),
        ProviderSlot::configured(AiProvider::Secondary, secondary.clone()),
    ]);

    let record = validate(&stage).await;

    assert!(record.success);
    assert!(record.is_valid);
    assert_eq!(record.ai_provider, AiProvider::Primary);
    assert_eq!(record.extracted.ingredients, vec!["Water", "Sugar", "Salt"]);
    assert_eq!(record.completeness_score, 6);
    assert!(record.errors.is_empty());
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test]
async fn test_primary_throws_secondary_succeeds() {
    let primary = ScriptedProvider::new("primary", Script::Fail(ProviderError::Auth(401)));
    let secondary = ScriptedProvider::new("secondary", Script::Answer(model_answer(CLEAR_LABEL, &["Water"])));
    let stage = AiValidationStage::new(vec![
        ProviderSlot::configured(AiProvider::Primary, primary.clone()),
        ProviderSlot::configured(AiProvider::Secondary, secondary.clone()),
    ]);

    let record = validate(&stage).await;

    assert!(record.success);
    assert_eq!(record.ai_provider, AiProvider::Secondary);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
}

#[tokio::test]
async fn test_both_fail_degrades_to_none() {
    let primary = ScriptedProvider::new("primary", Script::Fail(ProviderError::Transport("connection refused".into())));
    let secondary = ScriptedProvider::new(
        "secondary",
        Script::Fail(ProviderError::Http {
            status: 503,
            body: "overloaded".into(),
        }),
    );
    let stage = AiValidationStage::new(vec![
        ProviderSlot::configured(AiProvider::Primary, primary),
        ProviderSlot::configured(AiProvider::Secondary, secondary),
    ]);

    let record = validate(&stage).await;

    assert!(!record.success);
    assert!(!record.is_valid);
    assert_eq!(record.ai_provider, AiProvider::None);
    assert!((0.3..=0.4).contains(&record.confidence));
    assert!(record.errors["primary"].contains("connection refused"));
    assert!(record.errors["secondary"].contains("503"));

    // Local fallback still extracts the ingredient list
    assert_eq!(record.extracted.ingredients, vec!["Water", "Sugar", "Salt"]);
    assert_eq!(record.corrected_text, record.source_text);

    let findings = ai::findings(&record);
    assert_eq!(findings.count(Severity::Error), 1);
    assert_eq!(findings.findings[0].kind, "ai_unavailable");
}

#[tokio::test]
async fn test_unconfigured_secondary_degrades() {
    let primary = ScriptedProvider::new("primary", Script::Fail(ProviderError::RateLimited));
    let stage = AiValidationStage::new(vec![
        ProviderSlot::configured(AiProvider::Primary, primary),
        ProviderSlot::unconfigured(AiProvider::Secondary),
    ]);

    let record = validate(&stage).await;

    assert_eq!(record.ai_provider, AiProvider::None);
    assert_eq!(record.errors.len(), 2);
    assert!(record.errors["secondary"].contains("not configured"));
}

#[tokio::test]
async fn test_parse_failure_does_not_retry() {
    let primary = ScriptedProvider::new("primary", Script::Answer("I could not read this label, sorry.".into()));
    let secondary = ScriptedProvider::new("secondary", Script::Answer(model_answer(CLEAR_LABEL, &["Water"])));
    let stage = AiValidationStage::new(vec![
        ProviderSlot::configured(AiProvider::Primary, primary.clone()),
        ProviderSlot::configured(AiProvider::Secondary, secondary.clone()),
    ]);

    let record = validate(&stage).await;

    assert!(!record.success);
    assert!(!record.is_valid);
    assert_eq!(record.ai_provider, AiProvider::Primary);
    assert!((0.4..=0.7).contains(&record.confidence));
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 0);

    let findings = ai::findings(&record);
    assert_eq!(findings.findings[0].kind, "ai_parse_failure");
    assert_eq!(findings.findings[0].severity, Severity::Warning);
}

#[tokio::test]
async fn test_missing_required_keys_is_parse_failure() {
    let sparse = "```json\n{\"isValid\": true, \"confidence\": 0.9}\n```";
    let primary = ScriptedProvider::new("primary", Script::Answer(sparse.into()));
    let stage = AiValidationStage::new(vec![ProviderSlot::configured(AiProvider::Primary, primary)]);

    let record = validate(&stage).await;

    assert!(!record.success);
    assert!(record.errors["primary"].contains("correctedText"));
}

#[tokio::test]
async fn test_hanging_provider_times_out() {
    let primary = ScriptedProvider::new("primary", Script::Hang);
    let secondary = ScriptedProvider::new("secondary", Script::Answer(model_answer(CLEAR_LABEL, &["Water"])));
    let stage = AiValidationStage::new(vec![
        ProviderSlot::configured(AiProvider::Primary, primary),
        ProviderSlot::configured(AiProvider::Secondary, secondary),
    ])
    .with_call_timeout(Duration::from_millis(100));

    let record = tokio::time::timeout(Duration::from_secs(5), validate(&stage))
        .await
        .expect("stage must not hang");

    assert_eq!(record.ai_provider, AiProvider::Secondary);
    assert!(record.errors["primary"].contains("timed out"));
}
