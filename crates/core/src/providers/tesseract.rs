use crate::error::CapabilityError;
use crate::traits::OcrEngine;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Local OCR through the `tesseract` command line tool.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    program: String,
    language: String,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl TesseractOcr {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &Path) -> Result<String, CapabilityError> {
        let output = Command::new(&self.program)
            .arg(image)
            .arg("stdout")
            .args(["-l", self.language.as_str()])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| CapabilityError::Command {
                program: self.program.clone(),
                details: error.to_string(),
            })?;

        if !output.status.success() {
            return Err(CapabilityError::Command {
                program: self.program.clone(),
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_a_command_error() {
        let ocr = TesseractOcr::new("definitely-not-a-real-ocr-binary", "eng");
        let result = ocr.recognize(Path::new("scan.png")).await;
        assert!(matches!(result, Err(CapabilityError::Command { .. })));
    }
}
