//! Domain types for the label compliance pipeline.
//!
//! This module contains the records each stage produces:
//! - Extraction: OCR output normalized into text, words and sections
//! - Quality: tiered assessment of an extraction
//! - Validation: AI correction and structured label extraction
//! - Finding: the common currency every later stage emits
//! - Verdict: the aggregated terminal artifact
//! - Job: the opaque payload a host hands the pipeline

pub mod extraction;
pub mod finding;
pub mod job;
pub mod quality;
pub mod validation;
pub mod verdict;

// Re-export commonly used types
pub use extraction::{BoundingBox, ExtractionResult, ImageSource, OcrWord};
pub use finding::{Finding, FindingSet, Severity};
pub use job::LabelJob;
pub use quality::{QualityAssessment, QualityTier};
pub use validation::{AiProvider, StructuredLabel, ValidationRecord};
pub use verdict::{
    ComplianceVerdict, Provenance, StageCompletion, StageName, StageRecord, StageStatus,
    VerdictStatus,
};
