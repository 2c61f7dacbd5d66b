//! Text extraction records.
//!
//! An `ExtractionResult` is produced once per image and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the label image comes from
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ImageSource {
    /// Remote image fetched over HTTP(S)
    Url(String),

    /// Image on the local filesystem
    Path(PathBuf),

    /// Raw encoded image bytes (PNG, JPEG, ...)
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Interpret a CLI-style reference: http(s) URLs stay URLs, anything else is a path
    pub fn from_reference(reference: &str) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            Self::Url(reference.to_string())
        } else {
            Self::Path(PathBuf::from(reference))
        }
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

/// Pixel bounding box of a recognized word
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

/// A single recognized word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,

    /// Engine confidence on its own 0-100 scale
    pub confidence: f64,

    pub bbox: BoundingBox,
}

/// Normalized output of the text extraction stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// False when the OCR engine failed; text is then empty
    pub success: bool,

    /// Engine failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Full recognized text, one label line per line
    pub text: String,

    /// Overall confidence rescaled to 0..1
    pub confidence: f64,

    pub words: Vec<OcrWord>,

    pub lines: Vec<String>,

    /// Number of words below the low-confidence threshold
    pub low_confidence_words: usize,

    /// Section name (camelCase) -> section body
    pub detected_sections: BTreeMap<String, String>,

    pub processing_time_ms: u64,
}

impl ExtractionResult {
    /// Result for an engine failure
    pub fn failed(error: impl Into<String>, processing_time_ms: u64) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            text: String::new(),
            confidence: 0.0,
            words: Vec::new(),
            lines: Vec::new(),
            low_confidence_words: 0,
            detected_sections: BTreeMap::new(),
            processing_time_ms,
        }
    }

    /// Share of recognized words below the low-confidence threshold
    pub fn low_confidence_ratio(&self) -> f64 {
        if self.words.is_empty() {
            0.0
        } else {
            self.low_confidence_words as f64 / self.words.len() as f64
        }
    }

    pub fn section(&self, name: &str) -> Option<&str> {
        self.detected_sections.get(name).map(String::as_str)
    }
}
