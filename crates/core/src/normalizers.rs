//! Text normalizers: audio and scanned media into plain text.
//!
//! Both adapters degrade to empty text when their upstream capability fails,
//! times out or recognizes nothing. Only local filesystem problems are faults.

use crate::config::RetryPolicy;
use crate::stage::{call_bounded, StageOutcome};
use crate::traits::{OcrEngine, PageRenderer, Transcriber};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub struct TranscriptionAdapter<T> {
    transcriber: T,
    timeout: Duration,
    retry: RetryPolicy,
}

impl<T> TranscriptionAdapter<T>
where
    T: Transcriber,
{
    pub fn new(transcriber: T, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            transcriber,
            timeout,
            retry,
        }
    }

    pub async fn transcribe(&self, audio: &Path, language: &str) -> StageOutcome<String> {
        if let Err(error) = ensure_readable(audio).await {
            return StageOutcome::Fault(error);
        }

        let transcriber = &self.transcriber;
        let result = call_bounded("transcription", self.timeout, self.retry, || async move {
            transcriber.transcribe(audio, language).await
        })
        .await;

        match result {
            Ok(transcript) if transcript.trim().is_empty() => {
                StageOutcome::Degraded("transcription returned no text".to_string())
            }
            Ok(transcript) => {
                debug!(chars = transcript.len(), language, "audio transcribed");
                StageOutcome::Ok(transcript)
            }
            Err(error) => StageOutcome::Degraded(format!("transcription failed: {error}")),
        }
    }
}

pub struct OcrAdapter<O, R> {
    ocr: O,
    renderer: R,
    ocr_timeout: Duration,
    render_timeout: Duration,
    retry: RetryPolicy,
}

impl<O, R> OcrAdapter<O, R>
where
    O: OcrEngine,
    R: PageRenderer,
{
    pub fn new(
        ocr: O,
        renderer: R,
        ocr_timeout: Duration,
        render_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ocr,
            renderer,
            ocr_timeout,
            render_timeout,
            retry,
        }
    }

    pub async fn recognize_image(&self, image: &Path) -> StageOutcome<String> {
        if let Err(error) = ensure_readable(image).await {
            return StageOutcome::Fault(error);
        }

        match self.recognize(image).await {
            Ok(text) if text.trim().is_empty() => {
                StageOutcome::Degraded("ocr recognized no text".to_string())
            }
            Ok(text) => StageOutcome::Ok(text),
            Err(reason) => StageOutcome::Degraded(reason),
        }
    }

    /// Renders every page into `pages_dir`, then recognizes the pages one by
    /// one in document order. Any page failure degrades the whole document.
    pub async fn recognize_pdf(&self, pdf: &Path, pages_dir: &Path) -> StageOutcome<String> {
        if let Err(error) = ensure_readable(pdf).await {
            return StageOutcome::Fault(error);
        }
        if let Err(error) = tokio::fs::create_dir_all(pages_dir).await {
            return StageOutcome::Fault(format!(
                "cannot create page directory {}: {error}",
                pages_dir.display()
            ));
        }

        let renderer = &self.renderer;
        let rendered = call_bounded(
            "page renderer",
            self.render_timeout,
            self.retry,
            || async move { renderer.render_pages(pdf, pages_dir).await },
        )
        .await;

        let pages = match rendered {
            Ok(pages) if pages.is_empty() => {
                return StageOutcome::Degraded("pdf rendered no pages".to_string())
            }
            Ok(pages) => pages,
            Err(error) => return StageOutcome::Degraded(format!("pdf rendering failed: {error}")),
        };

        let mut texts = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            match self.recognize(page).await {
                Ok(text) => texts.push(text),
                Err(reason) => {
                    return StageOutcome::Degraded(format!("page {}: {reason}", index + 1))
                }
            }
        }

        let joined = texts.join("\n");
        if joined.trim().is_empty() {
            return StageOutcome::Degraded("ocr recognized no text in any page".to_string());
        }

        debug!(pages = pages.len(), chars = joined.len(), "pdf recognized");
        StageOutcome::Ok(joined)
    }

    async fn recognize(&self, image: &Path) -> Result<String, String> {
        let ocr = &self.ocr;
        call_bounded("ocr", self.ocr_timeout, self.retry, || async move {
            ocr.recognize(image).await
        })
        .await
        .map_err(|error| format!("ocr failed: {error}"))
    }
}

async fn ensure_readable(path: &Path) -> Result<(), String> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(format!("{} is not a file", path.display())),
        Err(error) => Err(format!("cannot read {}: {error}", path.display())),
    }
}
