use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Voice,
    Image,
    Pdf,
    Carddav,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Carddav => "carddav",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the content came from. Recorded for provenance only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Telegram,
    Carddav,
    File,
    #[default]
    Manual,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum IngestContent {
    Text(String),
    Upload(UploadedFile),
}

#[derive(Debug, Clone)]
pub struct IngestionRequest {
    pub content: IngestContent,
    pub content_type: ContentType,
    pub source_type: SourceType,
    pub source_id: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl IngestionRequest {
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(IngestContent::Text(content.into()), ContentType::Text)
    }

    pub fn upload(content_type: ContentType, file: UploadedFile) -> Self {
        Self::new(IngestContent::Upload(file), content_type).with_source(SourceType::File, None)
    }

    pub fn vcard(vcf_content: impl Into<String>) -> Self {
        Self::new(IngestContent::Text(vcf_content.into()), ContentType::Carddav)
            .with_source(SourceType::Carddav, None)
    }

    fn new(content: IngestContent, content_type: ContentType) -> Self {
        Self {
            content,
            content_type,
            source_type: SourceType::Manual,
            source_id: None,
            metadata: None,
        }
    }

    pub fn with_source(mut self, source_type: SourceType, source_id: Option<String>) -> Self {
        self.source_type = source_type;
        self.source_id = source_id;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Individual,
    Family,
    Event,
    Unknown,
}

impl EntityType {
    /// Case-insensitive match; anything unrecognized is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "INDIVIDUAL" => Self::Individual,
            "FAMILY" => Self::Family,
            "EVENT" => Self::Event,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedEntity {
    pub entity_type: EntityType,
    pub data: Map<String, Value>,
    pub confidence: f64,
}

impl ExtractedEntity {
    pub const DEFAULT_CONFIDENCE: f64 = 0.5;

    pub fn new(entity_type: EntityType, data: Map<String, Value>, confidence: f64) -> Self {
        Self {
            entity_type,
            data,
            confidence: clamp_confidence(confidence),
        }
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        ExtractedEntity::DEFAULT_CONFIDENCE
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactRecord {
    pub display_name: String,
    pub given_names: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcription,
    Ocr,
    Extraction,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Ocr => "ocr",
            Self::Extraction => "extraction",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage that recovered by producing an empty result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Degradation {
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionOutcome {
    pub ingestion_id: String,
    pub status: IngestionStatus,
    pub entities: Vec<ExtractedEntity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
    pub completed_at: DateTime<Utc>,
}

impl IngestionOutcome {
    pub fn success(
        ingestion_id: String,
        entities: Vec<ExtractedEntity>,
        raw_text: Option<String>,
        degradations: Vec<Degradation>,
    ) -> Self {
        Self {
            ingestion_id,
            status: IngestionStatus::Success,
            entities,
            error_message: None,
            raw_text,
            degradations,
            completed_at: Utc::now(),
        }
    }

    pub fn error(ingestion_id: String, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "ingestion failed".to_string()
        } else {
            message
        };

        Self {
            ingestion_id,
            status: IngestionStatus::Error,
            entities: Vec::new(),
            error_message: Some(message),
            raw_text: None,
            degradations: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == IngestionStatus::Success
    }
}
