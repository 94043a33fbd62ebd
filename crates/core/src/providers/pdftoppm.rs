use crate::error::CapabilityError;
use crate::traits::PageRenderer;
use async_trait::async_trait;
use lopdf::Document;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Renders PDF pages to PNG with poppler's `pdftoppm`, one call per page.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    program: String,
    dpi: u32,
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self::new("pdftoppm", 150)
    }
}

impl PdftoppmRenderer {
    pub fn new(program: impl Into<String>, dpi: u32) -> Self {
        Self {
            program: program.into(),
            dpi,
        }
    }

    async fn render_page(
        &self,
        pdf: &Path,
        page: usize,
        out_dir: &Path,
    ) -> Result<PathBuf, CapabilityError> {
        let prefix = out_dir.join(page_stem(page));
        let page_arg = page.to_string();
        let dpi_arg = self.dpi.to_string();

        let output = Command::new(&self.program)
            .args(["-png", "-r", dpi_arg.as_str()])
            .args(["-f", page_arg.as_str(), "-l", page_arg.as_str(), "-singlefile"])
            .arg(pdf)
            .arg(&prefix)
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
                details: format!(
                    "page {page}: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(prefix.with_extension("png"))
    }
}

#[async_trait]
impl PageRenderer for PdftoppmRenderer {
    async fn render_pages(
        &self,
        pdf: &Path,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, CapabilityError> {
        let owned = pdf.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || page_count(&owned))
            .await
            .map_err(|error| CapabilityError::PdfParse(error.to_string()))??;
        debug!(pages, pdf = %pdf.display(), "rendering pdf pages");

        let mut rendered = Vec::with_capacity(pages);
        for page in 1..=pages {
            rendered.push(self.render_page(pdf, page, out_dir).await?);
        }

        Ok(rendered)
    }
}

pub fn page_count(pdf: &Path) -> Result<usize, CapabilityError> {
    let document =
        Document::load(pdf).map_err(|error| CapabilityError::PdfParse(error.to_string()))?;
    Ok(document.get_pages().len())
}

fn page_stem(page: usize) -> String {
    format!("page-{page:04}")
}
