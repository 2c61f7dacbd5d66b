//! Pipeline stages.
//!
//! This module contains:
//! - extraction: OCR normalization and section detection
//! - quality: the quality gate (pure)
//! - ai: language-model correction with provider fallback
//! - regulatory: cross-check against the regulatory tool service
//! - aggregator: merge of stage findings into a verdict (pure)
//! - pipeline: the composition root that runs them in order

pub mod aggregator;
pub mod ai;
pub mod extraction;
pub mod pipeline;
pub mod quality;
pub mod regulatory;

// Re-export commonly used types
pub use aggregator::{aggregate, StageOutputs};
pub use ai::{AiInput, AiValidationStage, FallbackPolicy, ProviderSlot};
pub use extraction::ExtractionStage;
pub use pipeline::{tool_client, LabelPipeline};
pub use regulatory::{RegulatoryInput, RegulatoryReport, RegulatoryStage};
