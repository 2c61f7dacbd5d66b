//! The payload a hosting workflow hands to the pipeline.

use serde::{Deserialize, Serialize};

use super::extraction::ImageSource;

/// One label to check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelJob {
    /// Original upload name, carried for logs and the verdict
    pub filename: String,

    pub image: ImageSource,

    /// Target regulation set, e.g. `["FDA"]`
    #[serde(default)]
    pub regulations: Vec<String>,
}

impl LabelJob {
    pub fn new(filename: impl Into<String>, image: ImageSource) -> Self {
        Self {
            filename: filename.into(),
            image,
            regulations: Vec::new(),
        }
    }

    pub fn with_regulations(mut self, regulations: Vec<String>) -> Self {
        self.regulations = regulations;
        self
    }
}
