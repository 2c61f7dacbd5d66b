//! Adapter interfaces for external capabilities.
//!
//! Each unreliable capability the pipeline depends on sits behind a trait so
//! the composition root can inject real clients and tests can inject fakes:
//! - `OcrEngine`: optical text recognition (Tesseract)
//! - `CompletionProvider`: language-model completion (Anthropic, OpenAI-compatible)
//! - `ToolClient`: regulatory data tools over JSON-RPC (stdio subprocess or HTTP)

pub mod anthropic;
pub mod http_tool;
pub mod openai;
pub mod stdio_tool;
pub mod tesseract;
pub mod tool_protocol;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ImageSource, OcrWord};

// Re-export the concrete adapters
pub use anthropic::AnthropicProvider;
pub use http_tool::HttpToolClient;
pub use openai::OpenAiProvider;
pub use stdio_tool::StdioToolClient;
pub use tesseract::TesseractEngine;
pub use tool_protocol::ToolName;

// ============================================================================
// Optical recognition
// ============================================================================

/// Engine-agnostic page segmentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegmentation {
    /// Fully automatic layout analysis
    Auto,
    /// A single column of text of variable sizes
    SingleColumn,
    /// A single uniform block of text (typical for label panels)
    SingleBlock,
    /// As much text as possible in no particular order
    SparseText,
}

impl Default for PageSegmentation {
    fn default() -> Self {
        Self::SingleBlock
    }
}

/// Options passed to an OCR engine
#[derive(Debug, Clone, Default)]
pub struct OcrOptions {
    pub page_segmentation: PageSegmentation,

    /// Characters the engine may emit; `None` means unrestricted
    pub char_allowlist: Option<String>,
}

/// Raw engine output before normalization
#[derive(Debug, Clone, Default)]
pub struct OcrOutput {
    pub text: String,

    /// Overall confidence on the engine's 0-100 scale
    pub confidence: f64,

    pub words: Vec<OcrWord>,

    pub lines: Vec<String>,
}

/// Errors from an OCR engine
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to load image: {0}")]
    ImageLoad(String),

    #[error("failed to run OCR engine: {0}")]
    Engine(String),

    #[error("OCR engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("unreadable OCR output: {0}")]
    Output(String),
}

/// Trait for optical recognition engines
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Human-readable engine name, used as a finding's source tag
    fn name(&self) -> &str;

    /// Recognize text in an image
    async fn recognize(&self, image: &ImageSource, options: &OcrOptions)
        -> Result<OcrOutput, OcrError>;
}

// ============================================================================
// Language-model completion
// ============================================================================

/// Bounds for a single completion call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            temperature: 0.1,
        }
    }
}

/// Transport-level failures of a completion provider.
///
/// A provider that answered with text it could not be parsed is not an error
/// here; that is decided by the AI stage.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("provider not configured: {0}")]
    Unconfigured(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("authentication rejected (HTTP {0})")]
    Auth(u16),

    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("response contained no text")]
    EmptyResponse,
}

impl ProviderError {
    /// Map a non-success HTTP status to an error
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Auth(status),
            429 => Self::RateLimited,
            _ => Self::Http { status, body },
        }
    }
}

/// Trait for language-model completion providers
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for diagnostics
    fn name(&self) -> &str;

    /// Complete a single prompt
    async fn complete(&self, prompt: &str, params: &CompletionParams)
        -> Result<String, ProviderError>;
}

// ============================================================================
// Regulatory tools
// ============================================================================

/// Failures reaching or decoding a regulatory tool
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("tool '{tool}' did not respond within {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    #[error("failed to start tool server: {0}")]
    Spawn(String),

    #[error("tool server exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("tool server produced no output")]
    EmptyOutput,

    #[error("malformed tool response: {0}")]
    Malformed(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("tool reported an error: {0}")]
    ToolFailed(String),

    #[error("HTTP transport error: {0}")]
    Http(String),
}

impl ToolError {
    /// Whether the service could not be reached at all, as opposed to answering badly
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Spawn(_) | Self::Http(_))
    }
}

/// Trait for regulatory tool transports
#[async_trait]
pub trait ToolClient: Send + Sync {
    /// Transport name, used as a finding's source tag
    fn name(&self) -> &str;

    /// Invoke a tool and return its decoded payload
    async fn call_tool(
        &self,
        tool: ToolName,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError>;
}
