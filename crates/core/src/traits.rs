use crate::error::CapabilityError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path, language: &str) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String, CapabilityError>;
}

/// Renders a PDF into one image per page, returned in document order.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render_pages(&self, pdf: &Path, out_dir: &Path)
        -> Result<Vec<PathBuf>, CapabilityError>;
}
