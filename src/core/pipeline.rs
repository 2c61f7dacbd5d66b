//! Pipeline composition root.
//!
//! Owns one instance of each stage and the capability handles behind them.
//! Stages run strictly in order; each run owns its own records, so one
//! pipeline can serve concurrent runs.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{
    AnthropicProvider, CompletionProvider, HttpToolClient, OpenAiProvider, StdioToolClient,
    TesseractEngine, ToolClient,
};
use crate::config::{
    ProviderKind, ProviderSettings, RegulatorySettings, RegulatoryTransport, ResolvedConfig,
};
use crate::domain::{
    AiProvider, ComplianceVerdict, ExtractionResult, ImageSource, LabelJob, Provenance,
    QualityAssessment, StageName, StageRecord, StageStatus, ValidationRecord,
};

use super::aggregator::{self, StageOutputs};
use super::ai::{self, AiInput, AiValidationStage, ProviderSlot};
use super::extraction::{self, ExtractionStage};
use super::quality;
use super::regulatory::{self, RegulatoryInput, RegulatoryStage};

/// The label compliance pipeline
pub struct LabelPipeline {
    extraction: ExtractionStage,
    ai: AiValidationStage,
    regulatory: RegulatoryStage,
    /// Used when a job names no regulations
    default_regulations: Vec<String>,
}

impl LabelPipeline {
    pub fn new(extraction: ExtractionStage, ai: AiValidationStage, regulatory: RegulatoryStage) -> Self {
        Self {
            extraction,
            ai,
            regulatory,
            default_regulations: Vec::new(),
        }
    }

    pub fn with_default_regulations(mut self, regulations: Vec<String>) -> Self {
        self.default_regulations = regulations;
        self
    }

    /// Build every stage from resolved configuration
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let engine = TesseractEngine::with_binary_path(&config.ocr.binary)
            .with_language(&config.ocr.language)
            .with_timeout(config.ocr.timeout());
        let extraction = ExtractionStage::new(Arc::new(engine))
            .with_options(config.ocr.options())
            .with_low_confidence_threshold(config.ocr.low_confidence_threshold);

        let slots = vec![
            provider_slot(AiProvider::Primary, &config.ai.primary),
            provider_slot(AiProvider::Secondary, &config.ai.secondary),
        ];
        let ai = AiValidationStage::new(slots)
            .with_params(config.ai.params())
            .with_call_timeout(config.ai.timeout());

        let regulatory = RegulatoryStage::new(tool_client(&config.regulatory)?);

        Ok(Self::new(extraction, ai, regulatory).with_default_regulations(config.regulations.clone()))
    }

    fn regulations_for<'a>(&'a self, requested: &'a [String]) -> &'a [String] {
        if requested.is_empty() {
            &self.default_regulations
        } else {
            requested
        }
    }

    /// Run every stage for one job. Never fails; degraded stages show up in
    /// the verdict's stage records and findings.
    #[instrument(skip(self, job), fields(filename = %job.filename, run_id = tracing::field::Empty))]
    pub async fn run(&self, job: &LabelJob) -> ComplianceVerdict {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let regulations = self.regulations_for(&job.regulations);
        let mut stages = Vec::with_capacity(5);
        let mut outputs = StageOutputs::default();

        info!(image = ?job.image, "Starting label check");

        // Extraction
        let (extraction_result, assessment) = self.extract_with_records(&job.image, &mut stages).await;
        outputs.extraction = extraction::findings(&extraction_result, self.extraction.engine_name());
        outputs.quality = quality::findings(&assessment);

        // AI correction and extraction
        let started = Instant::now();
        let record = if extraction_result.success && !extraction_result.text.trim().is_empty() {
            let record = self
                .ai
                .validate(&AiInput {
                    extraction: &extraction_result,
                    quality: &assessment,
                    regulations,
                })
                .await;
            let status = if record.success {
                StageStatus::Completed
            } else {
                StageStatus::Degraded
            };
            stages.push(
                StageRecord::new(StageName::AiValidation, status, elapsed_ms(started))
                    .with_detail(format!("provider: {}", record.ai_provider)),
            );
            outputs.ai = ai::findings(&record);
            Some(record)
        } else {
            stages.push(
                StageRecord::new(StageName::AiValidation, StageStatus::Skipped, 0)
                    .with_detail("no text extracted"),
            );
            None
        };

        // Regulatory cross-check
        let started = Instant::now();
        let input = record
            .as_ref()
            .map(|r| RegulatoryInput::from_label(&r.extracted, regulations))
            .unwrap_or_default();
        let report = self.regulatory.check(&input).await;
        let status = if !report.invoked {
            StageStatus::Skipped
        } else if report.is_degraded() {
            StageStatus::Degraded
        } else {
            StageStatus::Completed
        };
        let mut regulatory_record = StageRecord::new(StageName::RegulatoryCheck, status, elapsed_ms(started));
        if report.is_degraded() {
            let failed: Vec<&str> = report.tool_failures.keys().map(String::as_str).collect();
            regulatory_record = regulatory_record.with_detail(format!("failed tools: {}", failed.join(", ")));
        }
        stages.push(regulatory_record);
        outputs.regulatory = regulatory::findings(&report);

        // Aggregation
        let provenance = match &record {
            Some(r) => Provenance::new(&r.corrected_text, r.extracted.ingredients.clone(), r.extracted.claims.clone()),
            None => Provenance::new(&extraction_result.text, Vec::new(), Vec::new()),
        };
        let started = Instant::now();
        let mut verdict = aggregator::aggregate(run_id, job.filename.clone(), stages, outputs, provenance);
        verdict
            .stages
            .push(StageRecord::new(StageName::Aggregation, StageStatus::Completed, elapsed_ms(started)));

        info!(
            status = ?verdict.status,
            findings = verdict.findings.len(),
            recommendations = verdict.recommendations.len(),
            "Label check complete"
        );
        verdict
    }

    async fn extract_with_records(
        &self,
        image: &ImageSource,
        stages: &mut Vec<StageRecord>,
    ) -> (ExtractionResult, QualityAssessment) {
        let result = self.extraction.extract(image).await;
        let record = if result.success {
            StageRecord::new(StageName::Extraction, StageStatus::Completed, result.processing_time_ms)
        } else {
            warn!(error = ?result.error, "Extraction failed");
            StageRecord::new(StageName::Extraction, StageStatus::Failed, result.processing_time_ms)
                .with_detail(result.error.clone().unwrap_or_default())
        };
        stages.push(record);

        let started = Instant::now();
        let assessment = quality::assess(&result);
        stages.push(
            StageRecord::new(StageName::Quality, StageStatus::Completed, elapsed_ms(started))
                .with_detail(format!("tier: {}", assessment.tier.as_str())),
        );
        (result, assessment)
    }

    /// Extraction and quality gate only
    pub async fn extract(&self, image: &ImageSource) -> (ExtractionResult, QualityAssessment) {
        let mut stages = Vec::new();
        self.extract_with_records(image, &mut stages).await
    }

    /// Direct single-call entry point: AI correction of already-extracted text
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn validate_text(&self, text: &str, regulations: &[String]) -> ValidationRecord {
        let extraction = extraction::from_text(text);
        let assessment = quality::assess(&extraction);
        self.ai
            .validate(&AiInput {
                extraction: &extraction,
                quality: &assessment,
                regulations: self.regulations_for(regulations),
            })
            .await
    }

    /// Cross-check a structured label without running the earlier stages
    pub async fn check_label(&self, input: &RegulatoryInput) -> regulatory::RegulatoryReport {
        self.regulatory.check(input).await
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn provider_slot(role: AiProvider, settings: &ProviderSettings) -> ProviderSlot {
    let Some(api_key) = settings.api_key.as_deref().filter(|_| settings.is_configured()) else {
        info!(role = %role, key_env = %settings.api_key_env, "Provider has no API key; slot left unconfigured");
        return ProviderSlot::unconfigured(role);
    };

    let provider: Arc<dyn CompletionProvider> = match settings.kind {
        ProviderKind::Anthropic => {
            let mut provider = AnthropicProvider::new(api_key, &settings.model);
            if let Some(base_url) = &settings.base_url {
                provider = provider.with_base_url(base_url);
            }
            Arc::new(provider)
        }
        ProviderKind::Openai => {
            let mut provider = OpenAiProvider::new(api_key, &settings.model);
            if let Some(base_url) = &settings.base_url {
                provider = provider.with_base_url(base_url);
            }
            Arc::new(provider)
        }
    };
    ProviderSlot::configured(role, provider)
}

/// Build the regulatory tool transport
pub fn tool_client(settings: &RegulatorySettings) -> Result<Arc<dyn ToolClient>> {
    let client: Arc<dyn ToolClient> = match &settings.transport {
        RegulatoryTransport::Stdio { command, args } => {
            if command.trim().is_empty() {
                bail!("regulatory.command is empty");
            }
            Arc::new(
                StdioToolClient::new(command, args.clone())
                    .with_timeout(settings.timeout())
                    .with_max_concurrent(settings.max_concurrent),
            )
        }
        RegulatoryTransport::Http { url } => {
            reqwest::Url::parse(url).with_context(|| format!("Invalid regulatory.url: {}", url))?;
            Arc::new(HttpToolClient::new(url).with_timeout(settings.timeout()))
        }
    };
    Ok(client)
}
