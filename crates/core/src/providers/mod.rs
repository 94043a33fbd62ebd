pub mod http_ocr;
pub mod openai;
pub mod pdftoppm;
pub mod tesseract;

pub use http_ocr::HttpOcr;
pub use openai::OpenAiClient;
pub use pdftoppm::PdftoppmRenderer;
pub use tesseract::TesseractOcr;

use crate::error::CapabilityError;
use crate::traits::OcrEngine;
use async_trait::async_trait;
use std::path::Path;

/// OCR engine picked at startup.
pub enum OcrBackend {
    Tesseract(TesseractOcr),
    Http(HttpOcr),
}

#[async_trait]
impl OcrEngine for OcrBackend {
    async fn recognize(&self, image: &Path) -> Result<String, CapabilityError> {
        match self {
            Self::Tesseract(engine) => engine.recognize(image).await,
            Self::Http(engine) => engine.recognize(image).await,
        }
    }
}
