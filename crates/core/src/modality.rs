use crate::error::IngestError;
use crate::models::ContentType;
use std::path::Path;

pub const AUDIO_EXTENSIONS: [&str; 5] = [".mp3", ".wav", ".m4a", ".ogg", ".flac"];
pub const IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".bmp", ".gif", ".tiff"];
pub const PDF_EXTENSIONS: [&str; 1] = [".pdf"];
pub const CONTACT_EXTENSIONS: [&str; 2] = [".vcf", ".vcard"];

/// The preprocessing path a piece of content takes before entity extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Text,
    Audio,
    Image,
    Pdf,
    ContactCard,
}

impl Modality {
    pub fn for_content_type(content_type: ContentType) -> Self {
        match content_type {
            ContentType::Text => Self::Text,
            ContentType::Voice => Self::Audio,
            ContentType::Image => Self::Image,
            ContentType::Pdf => Self::Pdf,
            ContentType::Carddav => Self::ContactCard,
        }
    }

    pub fn content_type(self) -> ContentType {
        match self {
            Self::Text => ContentType::Text,
            Self::Audio => ContentType::Voice,
            Self::Image => ContentType::Image,
            Self::Pdf => ContentType::Pdf,
            Self::ContactCard => ContentType::Carddav,
        }
    }

    pub fn supported_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Text => &[],
            Self::Audio => &AUDIO_EXTENSIONS,
            Self::Image => &IMAGE_EXTENSIONS,
            Self::Pdf => &PDF_EXTENSIONS,
            Self::ContactCard => &CONTACT_EXTENSIONS,
        }
    }

    /// Only the media modalities gate on extension; text and contact cards
    /// accept any file name.
    pub fn is_gated(self) -> bool {
        matches!(self, Self::Audio | Self::Image | Self::Pdf)
    }

    pub fn accepts(self, filename: &str) -> bool {
        if !self.is_gated() {
            return true;
        }

        file_extension(filename)
            .is_some_and(|extension| self.supported_extensions().contains(&extension.as_str()))
    }

    /// Fails with `UnsupportedFormat` unless `filename` may enter this modality.
    pub fn ensure_accepts(self, filename: &str) -> Result<(), IngestError> {
        if self.accepts(filename) {
            return Ok(());
        }

        let message = match self {
            Self::Pdf => "File is not a PDF".to_string(),
            _ => format!(
                "Unsupported {} format. Supported: {}",
                self.label(),
                self.supported_extensions()
                    .iter()
                    .map(|extension| extension.trim_start_matches('.').to_ascii_uppercase())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };

        Err(IngestError::UnsupportedFormat(message))
    }

    fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::ContactCard => "contact card",
        }
    }
}

/// Lower-cased extension including the leading dot, e.g. `".jpg"`.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| format!(".{}", extension.to_ascii_lowercase()))
}

/// Picks a modality from a file name alone.
pub fn classify_file(filename: &str) -> Option<Modality> {
    let extension = file_extension(filename)?;
    [
        Modality::Audio,
        Modality::Image,
        Modality::Pdf,
        Modality::ContactCard,
    ]
    .into_iter()
    .find(|modality| modality.supported_extensions().contains(&extension.as_str()))
    .or_else(|| (extension == ".txt").then_some(Modality::Text))
}
