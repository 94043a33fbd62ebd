pub mod config;
pub mod entities;
pub mod error;
pub mod extractor;
pub mod modality;
pub mod models;
pub mod normalizers;
pub mod orchestrator;
pub mod providers;
pub mod stage;
pub mod traits;
pub mod upload;
pub mod vcard;

pub use config::{ExtractionSettings, IngestConfig, RetryPolicy, DEFAULT_MAX_FILE_SIZE};
pub use entities::{normalize_entities, normalize_entity};
pub use error::{CapabilityError, IngestError};
pub use extractor::{build_extraction_prompt, parse_extraction_response, EntityExtractor};
pub use modality::{classify_file, file_extension, Modality};
pub use models::{
    ContactRecord, ContentType, Degradation, EntityType, ExtractedEntity, IngestContent,
    IngestionOutcome, IngestionRequest, IngestionStatus, SourceType, Stage, UploadedFile,
};
pub use normalizers::{OcrAdapter, TranscriptionAdapter};
pub use orchestrator::IngestionPipeline;
pub use providers::{HttpOcr, OcrBackend, OpenAiClient, PdftoppmRenderer, TesseractOcr};
pub use stage::StageOutcome;
pub use traits::{CompletionRequest, LanguageModel, OcrEngine, PageRenderer, Transcriber};
pub use vcard::{parse_vcf, parse_vcf_file};
