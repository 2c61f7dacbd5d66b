//! labelcheck - product label compliance pipeline
//!
//! Turns a photographed or scanned label into a compliance verdict:
//! OCR extraction, a quality gate, language-model correction and structured
//! extraction, a regulatory cross-check, and aggregation of every finding.
//!
//! # Architecture
//!
//! Each stage turns its predecessor's output plus one external call into a
//! typed record. Capability failures become degraded records and findings,
//! never errors, so a run always ends in a verdict.
//!
//! # Modules
//!
//! - `adapters`: External capabilities (Tesseract, Anthropic, OpenAI, regulatory tools)
//! - `core`: Pipeline stages and the composition root
//! - `domain`: Data structures (ExtractionResult, ValidationRecord, Finding, ComplianceVerdict)
//! - `reference`: Reference regulatory tool server
//! - `config`: Configuration loading
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Check a label image
//! labelcheck check label.png
//!
//! # Correct already-extracted text
//! cat label.txt | labelcheck validate-text
//!
//! # Call a regulatory tool directly
//! labelcheck tool validate_ingredients --args '{"ingredients":["water"]}'
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod reference;

// Re-export main types at crate root for convenience
pub use core::LabelPipeline;
pub use domain::{
    ComplianceVerdict, ExtractionResult, Finding, ImageSource, LabelJob, QualityAssessment,
    Severity, ValidationRecord, VerdictStatus,
};
