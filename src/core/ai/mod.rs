//! AI correction and extraction stage.
//!
//! Sends the OCR text to language-model providers in slot order and turns the
//! first usable answer into a `ValidationRecord`. Every path ends in a record:
//! - parsed answer: `success: true`
//! - unparseable answer: stub attributed to that provider, confidence 0.4-0.7
//! - no provider reachable: degraded stub with `ai_provider: none`, confidence 0.3-0.4

pub mod local;
pub mod parse;
pub mod policy;
pub mod prompt;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::adapters::{CompletionParams, CompletionProvider, ProviderError};
use crate::domain::{
    AiProvider, ExtractionResult, Finding, FindingSet, QualityAssessment, Severity,
    ValidationRecord,
};

pub use parse::{parse_completion, ParseFailure, ValidationPayload};
pub use policy::{AttemptOutcome, FallbackPolicy, PolicyDecision};
pub use prompt::{build_prompt, PromptInput};

pub const SOURCE: &str = "ai_validation";

/// Default upper bound on a single completion call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// A provider position in the fallback order
#[derive(Clone)]
pub struct ProviderSlot {
    pub role: AiProvider,
    pub provider: Option<Arc<dyn CompletionProvider>>,
}

impl ProviderSlot {
    pub fn configured(role: AiProvider, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            role,
            provider: Some(provider),
        }
    }

    /// A slot whose provider has no credentials; attempts fail as transport errors
    pub fn unconfigured(role: AiProvider) -> Self {
        Self {
            role,
            provider: None,
        }
    }
}

/// Input to the AI stage
#[derive(Debug, Clone, Copy)]
pub struct AiInput<'a> {
    pub extraction: &'a ExtractionResult,
    pub quality: &'a QualityAssessment,
    pub regulations: &'a [String],
}

/// AI correction and extraction stage
pub struct AiValidationStage {
    slots: Vec<ProviderSlot>,
    policy: FallbackPolicy,
    params: CompletionParams,
    call_timeout: Duration,
}

impl AiValidationStage {
    /// Create a stage that tries `slots` in order
    pub fn new(slots: Vec<ProviderSlot>) -> Self {
        Self {
            slots,
            policy: FallbackPolicy::default(),
            params: CompletionParams::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_params(mut self, params: CompletionParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Ask one provider and classify the answer
    async fn attempt(&self, slot: &ProviderSlot, prompt: &str) -> AttemptOutcome {
        let Some(provider) = &slot.provider else {
            return AttemptOutcome::TransportFailure(ProviderError::Unconfigured(format!(
                "no {} provider configured",
                slot.role
            )));
        };

        let completion =
            match tokio::time::timeout(self.call_timeout, provider.complete(prompt, &self.params))
                .await
            {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => return AttemptOutcome::TransportFailure(e),
                Err(_) => {
                    return AttemptOutcome::TransportFailure(ProviderError::Timeout(
                        self.call_timeout,
                    ))
                }
            };

        match parse_completion(&completion) {
            Ok(payload) => AttemptOutcome::Parsed(payload),
            Err(reason) => AttemptOutcome::ParseFailure {
                raw: completion,
                reason,
            },
        }
    }

    /// Validate an extraction. Never fails.
    #[instrument(skip(self, input), fields(providers = self.slots.len()))]
    pub async fn validate(&self, input: &AiInput<'_>) -> ValidationRecord {
        let started = Instant::now();
        let prompt = build_prompt(&PromptInput {
            text: &input.extraction.text,
            quality: input.quality,
            sections: &input.extraction.detected_sections,
            regulations: input.regulations,
        });

        let mut errors = BTreeMap::new();

        for (idx, slot) in self.slots.iter().enumerate() {
            let outcome = self.attempt(slot, &prompt).await;
            let has_next = idx + 1 < self.slots.len();
            let decision = self.policy.decide(&outcome, has_next);

            match outcome {
                AttemptOutcome::Parsed(payload) => {
                    info!(provider = %slot.role, "AI validation completed");
                    return accepted(
                        payload,
                        slot.role,
                        errors,
                        input.extraction,
                        elapsed_ms(started),
                    );
                }
                AttemptOutcome::ParseFailure { raw, reason } => {
                    warn!(
                        provider = %slot.role,
                        error = %reason,
                        response_chars = raw.chars().count(),
                        "AI response could not be parsed"
                    );
                    errors.insert(slot.role.to_string(), format!("parse failure: {}", reason));
                    if decision == PolicyDecision::Stub {
                        return fallback_validation(
                            input.extraction,
                            input.quality,
                            slot.role,
                            errors,
                            elapsed_ms(started),
                        );
                    }
                }
                AttemptOutcome::TransportFailure(e) => {
                    warn!(provider = %slot.role, error = %e, "AI provider failed");
                    errors.insert(slot.role.to_string(), e.to_string());
                }
            }

            if decision != PolicyDecision::TryNext {
                break;
            }
        }

        warn!(errors = errors.len(), "All AI providers failed, returning degraded result");
        degraded_validation(input.extraction, input.quality, errors, elapsed_ms(started))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Record for a well-formed provider answer
fn accepted(
    payload: ValidationPayload,
    role: AiProvider,
    errors: BTreeMap<String, String>,
    extraction: &ExtractionResult,
    processing_time_ms: u64,
) -> ValidationRecord {
    let confidence = payload.normalized_confidence();
    let completeness_score = payload.normalized_completeness();
    ValidationRecord {
        success: true,
        is_valid: payload.is_valid,
        confidence,
        source_text: extraction.text.clone(),
        corrected_text: payload.corrected_text,
        extracted: payload.extracted_information,
        ocr_issues_found: payload.ocr_issues_found,
        completeness_score,
        compliance_issues: payload.compliance_issues,
        recommendations: payload.recommendations,
        ai_provider: role,
        errors,
        processing_time_ms,
    }
}

fn stub(
    extraction: &ExtractionResult,
    quality: &QualityAssessment,
    role: AiProvider,
    confidence: f64,
    errors: BTreeMap<String, String>,
    processing_time_ms: u64,
) -> ValidationRecord {
    let extracted = local::extract(extraction);
    ValidationRecord {
        success: false,
        is_valid: false,
        confidence,
        source_text: extraction.text.clone(),
        corrected_text: extraction.text.clone(),
        completeness_score: extracted.completeness_score(),
        extracted,
        ocr_issues_found: quality.issues.clone(),
        compliance_issues: Vec::new(),
        recommendations: vec![
            "AI validation unavailable; verify the extracted fields manually".to_string(),
        ],
        ai_provider: role,
        errors,
        processing_time_ms,
    }
}

/// Stub for a provider that answered with something unusable
pub fn fallback_validation(
    extraction: &ExtractionResult,
    quality: &QualityAssessment,
    role: AiProvider,
    errors: BTreeMap<String, String>,
    processing_time_ms: u64,
) -> ValidationRecord {
    let confidence = (quality.confidence * 0.8).clamp(0.4, 0.7);
    stub(extraction, quality, role, confidence, errors, processing_time_ms)
}

/// Stub for the state where no provider could be reached
pub fn degraded_validation(
    extraction: &ExtractionResult,
    quality: &QualityAssessment,
    errors: BTreeMap<String, String>,
    processing_time_ms: u64,
) -> ValidationRecord {
    let confidence = (quality.confidence * 0.4).clamp(0.3, 0.4);
    stub(extraction, quality, AiProvider::None, confidence, errors, processing_time_ms)
}

/// Findings for a validation record
pub fn findings(record: &ValidationRecord) -> FindingSet {
    let mut set = FindingSet::new();
    let tag = record.ai_provider.as_str();

    if record.is_degraded() {
        let detail = record
            .errors
            .iter()
            .map(|(role, error)| format!("{}: {}", role, error))
            .collect::<Vec<_>>()
            .join("; ");
        set.push(Finding::new(
            "ai_unavailable",
            Severity::Error,
            format!("All AI providers failed; fields were extracted locally ({})", detail),
            SOURCE,
            tag,
        ));
    } else if !record.success {
        set.push(Finding::new(
            "ai_parse_failure",
            Severity::Warning,
            format!(
                "AI response could not be parsed; fields were extracted locally ({})",
                record.errors.get(tag).map(String::as_str).unwrap_or("unknown reason")
            ),
            SOURCE,
            tag,
        ));
    }

    if record.success {
        for issue in &record.compliance_issues {
            set.push(Finding::new("ai_compliance_issue", Severity::Compliance, issue.clone(), SOURCE, tag));
        }
        if !record.is_valid && record.compliance_issues.is_empty() {
            set.push(Finding::new(
                "label_invalid",
                Severity::Compliance,
                "AI validation marked the label as non-compliant",
                SOURCE,
                tag,
            ));
        }
        for issue in &record.ocr_issues_found {
            set.push(Finding::new("ocr_correction", Severity::Info, issue.clone(), SOURCE, tag));
        }
    }

    for recommendation in &record.recommendations {
        set.recommend(Finding::new(
            "ai_recommendation",
            Severity::Info,
            recommendation.clone(),
            SOURCE,
            tag,
        ));
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{extraction, quality};

    #[test]
    fn test_stub_confidence_ranges() {
        let extraction = extraction::from_text("Ingredients: Water, Salt, Sugar and other things on the label");
        let assessment = quality::assess(&extraction);

        let parse_stub = fallback_validation(&extraction, &assessment, AiProvider::Primary, BTreeMap::new(), 1);
        assert!((0.4..=0.7).contains(&parse_stub.confidence));
        assert_eq!(parse_stub.ai_provider, AiProvider::Primary);
        assert!(!parse_stub.success && !parse_stub.is_valid);

        let degraded = degraded_validation(&extraction, &assessment, BTreeMap::new(), 1);
        assert!((0.3..=0.4).contains(&degraded.confidence));
        assert!(degraded.is_degraded());
        assert_eq!(degraded.corrected_text, extraction.text);
        assert_eq!(degraded.extracted.ingredients[0], "Water");
    }

    #[test]
    fn test_degraded_findings_name_each_provider() {
        let extraction = extraction::from_text("x");
        let assessment = quality::assess(&extraction);
        let errors: BTreeMap<String, String> = [
            ("primary".to_string(), "rate limited (HTTP 429)".to_string()),
            ("secondary".to_string(), "provider not configured: no secondary provider configured".to_string()),
        ]
        .into_iter()
        .collect();

        let record = degraded_validation(&extraction, &assessment, errors, 0);
        let set = findings(&record);

        assert_eq!(set.count(Severity::Error), 1);
        let message = &set.findings[0].message;
        assert!(message.contains("primary: rate limited"));
        assert!(message.contains("secondary: provider not configured"));
        assert_eq!(set.findings[0].source_tag, "none");
    }
}
