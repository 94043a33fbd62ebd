use crate::config::IngestConfig;
use crate::entities::normalize_entities;
use crate::error::IngestError;
use crate::extractor::EntityExtractor;
use crate::modality::Modality;
use crate::models::{
    ContentType, Degradation, ExtractedEntity, IngestContent, IngestionOutcome, IngestionRequest,
    Stage, UploadedFile,
};
use crate::normalizers::{OcrAdapter, TranscriptionAdapter};
use crate::traits::{LanguageModel, OcrEngine, PageRenderer, Transcriber};
use crate::upload::ScopedUpload;
use crate::vcard::{is_named, parse_vcf, parse_vcf_file};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Single entry point of the ingestion pipeline.
///
/// Classifies the request, normalizes it to text (or parses contact cards
/// directly), extracts entities and assembles the outcome. Every internal
/// failure is turned into an ERROR outcome here; nothing escapes as `Err`.
pub struct IngestionPipeline<L, T, O, R> {
    config: IngestConfig,
    extractor: EntityExtractor<L>,
    transcription: TranscriptionAdapter<T>,
    ocr: OcrAdapter<O, R>,
}

struct Processed {
    entities: Vec<ExtractedEntity>,
    raw_text: Option<String>,
    degradations: Vec<Degradation>,
}

impl Processed {
    fn contacts(contacts: impl IntoIterator<Item = crate::models::ContactRecord>) -> Self {
        Self {
            entities: contacts.into_iter().map(ExtractedEntity::from).collect(),
            raw_text: None,
            degradations: Vec::new(),
        }
    }
}

impl<L, T, O, R> IngestionPipeline<L, T, O, R>
where
    L: LanguageModel,
    T: Transcriber,
    O: OcrEngine,
    R: PageRenderer,
{
    pub fn new(config: IngestConfig, model: L, transcriber: T, ocr: O, renderer: R) -> Self {
        let extractor = EntityExtractor::new(model, config.extraction.clone(), config.retry);
        let transcription =
            TranscriptionAdapter::new(transcriber, config.transcription_timeout, config.retry);
        let ocr = OcrAdapter::new(
            ocr,
            renderer,
            config.ocr_timeout,
            config.render_timeout,
            config.retry,
        );

        Self {
            config,
            extractor,
            transcription,
            ocr,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub async fn ingest(&self, request: IngestionRequest) -> IngestionOutcome {
        let ingestion_id = Uuid::new_v4().to_string();
        let content_type = request.content_type;

        info!(
            ingestion_id = %ingestion_id,
            content_type = %content_type,
            source_type = ?request.source_type,
            source_id = request.source_id.as_deref().unwrap_or("-"),
            "ingestion started"
        );

        match self.run(&ingestion_id, request).await {
            Ok(processed) => {
                info!(
                    ingestion_id = %ingestion_id,
                    content_type = %content_type,
                    entities = processed.entities.len(),
                    degraded_stages = processed.degradations.len(),
                    "ingestion succeeded"
                );
                IngestionOutcome::success(
                    ingestion_id,
                    processed.entities,
                    processed.raw_text,
                    processed.degradations,
                )
            }
            Err(error) => {
                warn!(
                    ingestion_id = %ingestion_id,
                    content_type = %content_type,
                    error = %error,
                    "ingestion failed"
                );
                IngestionOutcome::error(ingestion_id, error.to_string())
            }
        }
    }

    pub async fn ingest_text(&self, content: impl Into<String>) -> IngestionOutcome {
        self.ingest(IngestionRequest::text(content)).await
    }

    pub async fn ingest_voice(&self, file: UploadedFile) -> IngestionOutcome {
        self.ingest(IngestionRequest::upload(ContentType::Voice, file)).await
    }

    pub async fn ingest_image(&self, file: UploadedFile) -> IngestionOutcome {
        self.ingest(IngestionRequest::upload(ContentType::Image, file)).await
    }

    pub async fn ingest_pdf(&self, file: UploadedFile) -> IngestionOutcome {
        self.ingest(IngestionRequest::upload(ContentType::Pdf, file)).await
    }

    pub async fn ingest_carddav(&self, vcf_text: impl Into<String>) -> IngestionOutcome {
        self.ingest(IngestionRequest::vcard(vcf_text)).await
    }

    pub async fn ingest_carddav_file(&self, file: UploadedFile) -> IngestionOutcome {
        self.ingest(IngestionRequest::upload(ContentType::Carddav, file)).await
    }

    async fn run(
        &self,
        ingestion_id: &str,
        request: IngestionRequest,
    ) -> Result<Processed, IngestError> {
        let modality = Modality::for_content_type(request.content_type);
        let language = request
            .metadata_str("language")
            .unwrap_or(&self.config.default_language)
            .to_string();

        match (modality, request.content) {
            (Modality::Text, IngestContent::Text(text)) => {
                self.extract_entities(text, Vec::new()).await
            }
            (Modality::Text, IngestContent::Upload(_)) => Err(IngestError::InvalidArgument(
                "text content must be sent inline, not as a file upload".to_string(),
            )),
            (Modality::ContactCard, IngestContent::Text(vcf)) => {
                let contact = Some(parse_vcf(&vcf)).filter(is_named);
                if contact.is_none() {
                    debug!(ingestion_id, "contact card has no display name; nothing emitted");
                }
                Ok(Processed::contacts(contact))
            }
            (_, IngestContent::Text(_)) => Err(IngestError::InvalidArgument(format!(
                "{} content requires an uploaded file",
                request.content_type
            ))),
            (modality, IngestContent::Upload(file)) => {
                self.run_upload(ingestion_id, modality, file, &language).await
            }
        }
    }

    /// Gates the upload, persists it for the duration of processing and
    /// removes it again on every path.
    async fn run_upload(
        &self,
        ingestion_id: &str,
        modality: Modality,
        file: UploadedFile,
        language: &str,
    ) -> Result<Processed, IngestError> {
        modality.ensure_accepts(&file.filename)?;
        if file.bytes.len() > self.config.max_file_size {
            return Err(IngestError::PayloadTooLarge {
                size: file.bytes.len(),
                limit: self.config.max_file_size,
            });
        }

        let upload = ScopedUpload::acquire(
            &self.config.upload_dir,
            ingestion_id,
            &file.filename,
            &file.bytes,
        )
        .await?;
        drop(file);

        let result = self.process_upload(modality, &upload, language).await;

        if let Err(error) = upload.release().await {
            warn!(ingestion_id, error = %error, "failed to remove upload");
        }

        result
    }

    async fn process_upload(
        &self,
        modality: Modality,
        upload: &ScopedUpload,
        language: &str,
    ) -> Result<Processed, IngestError> {
        let mut degradations = Vec::new();

        let text = match modality {
            Modality::Audio => self
                .transcription
                .transcribe(upload.path(), language)
                .await
                .resolve(Stage::Transcription, &mut degradations)?,
            Modality::Image => self
                .ocr
                .recognize_image(upload.path())
                .await
                .resolve(Stage::Ocr, &mut degradations)?,
            Modality::Pdf => self
                .ocr
                .recognize_pdf(upload.path(), &upload.scratch_dir("pages"))
                .await
                .resolve(Stage::Ocr, &mut degradations)?,
            Modality::ContactCard => {
                let bytes = tokio::fs::read(upload.path()).await?;
                let content = String::from_utf8(bytes)?;
                return Ok(Processed::contacts(parse_vcf_file(&content)));
            }
            Modality::Text => {
                return Err(IngestError::InvalidArgument(
                    "text content cannot be uploaded".to_string(),
                ))
            }
        };

        self.extract_entities(text, degradations).await
    }

    async fn extract_entities(
        &self,
        text: String,
        mut degradations: Vec<Degradation>,
    ) -> Result<Processed, IngestError> {
        let records = self
            .extractor
            .extract(&text)
            .await
            .resolve(Stage::Extraction, &mut degradations)?;

        Ok(Processed {
            entities: normalize_entities(&records),
            raw_text: Some(text),
            degradations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::tests::ScriptedModel;
    use crate::models::{EntityType, IngestionStatus};
    use crate::normalizers::tests::{FakeRenderer, FakeTranscriber, StemOcr};
    use serde_json::{json, Map};
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::Ordering;
    use tempfile::{tempdir, TempDir};

    type TestPipeline = IngestionPipeline<ScriptedModel, FakeTranscriber, StemOcr, FakeRenderer>;

    struct Harness {
        pipeline: TestPipeline,
        model: ScriptedModel,
        transcriber: FakeTranscriber,
        ocr: StemOcr,
        renderer: FakeRenderer,
        uploads: TempDir,
    }

    impl Harness {
        fn new(model: ScriptedModel, transcriber: FakeTranscriber) -> Self {
            Self::with_config(model, transcriber, |config| config)
        }

        fn with_config(
            model: ScriptedModel,
            transcriber: FakeTranscriber,
            adjust: impl FnOnce(IngestConfig) -> IngestConfig,
        ) -> Self {
            let uploads = tempdir().expect("temp upload dir");
            let ocr = StemOcr::default();
            let renderer = FakeRenderer {
                pages: 2,
                ..FakeRenderer::default()
            };
            let config = adjust(IngestConfig::default().with_upload_dir(uploads.path()));
            let pipeline = IngestionPipeline::new(
                config,
                model.clone(),
                transcriber.clone(),
                ocr.clone(),
                renderer.clone(),
            );

            Self {
                pipeline,
                model,
                transcriber,
                ocr,
                renderer,
                uploads,
            }
        }

        fn upload_dir_is_empty(&self) -> bool {
            dir_is_empty(self.uploads.path())
        }
    }

    fn dir_is_empty(path: &Path) -> bool {
        std::fs::read_dir(path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    const PERSON_ANSWER: &str = r#"[{"entity_type":"INDIVIDUAL",
        "data":{"given_names":"Elsa","surname":"Lind"},"confidence":0.85}]"#;

    #[tokio::test]
    async fn text_is_extracted_and_kept_for_audit() {
        let harness = Harness::new(
            ScriptedModel::answering(PERSON_ANSWER),
            FakeTranscriber::default(),
        );
        let outcome = harness.pipeline.ingest_text("Elsa Lind was my grandmother.").await;

        assert_eq!(outcome.status, IngestionStatus::Success);
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].entity_type, EntityType::Individual);
        assert_eq!(outcome.entities[0].data["surname"], "Lind");
        assert_eq!(outcome.raw_text.as_deref(), Some("Elsa Lind was my grandmother."));
        assert!(outcome.error_message.is_none());
    }

    #[tokio::test]
    async fn extractor_confidence_is_clamped() {
        let harness = Harness::new(
            ScriptedModel::answering(
                r#"[{"entity_type":"EVENT","confidence":7.5},
                    {"entity_type":"FAMILY","confidence":-1}]"#,
            ),
            FakeTranscriber::default(),
        );
        let outcome = harness.pipeline.ingest_text("A wedding in 1923.").await;

        let confidences: Vec<f64> = outcome.entities.iter().map(|e| e.confidence).collect();
        assert_eq!(confidences, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn ingestion_ids_are_unique() {
        let harness = Harness::new(
            ScriptedModel::answering("[]"),
            FakeTranscriber::default(),
        );
        let mut ids = HashSet::new();
        for _ in 0..10 {
            let outcome = harness.pipeline.ingest_text("nothing here").await;
            assert!(!outcome.ingestion_id.is_empty());
            ids.insert(outcome.ingestion_id);
        }
        assert_eq!(ids.len(), 10);
    }

    #[tokio::test]
    async fn identical_text_gives_identical_entities() {
        let harness = Harness::new(
            ScriptedModel::answering(PERSON_ANSWER),
            FakeTranscriber::default(),
        );
        let first = harness.pipeline.ingest_text("Elsa Lind").await;
        let second = harness.pipeline.ingest_text("Elsa Lind").await;

        assert_ne!(first.ingestion_id, second.ingestion_id);
        assert_eq!(first.entities, second.entities);
    }

    #[tokio::test]
    async fn unsupported_voice_extension_is_rejected_without_upstream_calls() {
        let harness = Harness::new(
            ScriptedModel::answering(PERSON_ANSWER),
            FakeTranscriber::default(),
        );
        let outcome = harness
            .pipeline
            .ingest_voice(UploadedFile::new("installer.exe", b"MZ".to_vec()))
            .await;

        assert_eq!(outcome.status, IngestionStatus::Error);
        assert!(outcome
            .error_message
            .as_deref()
            .is_some_and(|message| message.starts_with("Unsupported audio format")));
        assert!(outcome.entities.is_empty());
        assert_eq!(harness.transcriber.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.model.call_count(), 0);
        assert!(harness.upload_dir_is_empty());
    }

    #[tokio::test]
    async fn failed_transcription_is_success_with_no_entities() {
        let harness = Harness::new(
            ScriptedModel::answering(PERSON_ANSWER),
            FakeTranscriber::default(),
        );
        let outcome = harness
            .pipeline
            .ingest_voice(UploadedFile::new("memo.ogg", b"OggS".to_vec()))
            .await;

        assert_eq!(outcome.status, IngestionStatus::Success);
        assert!(outcome.entities.is_empty());
        assert_eq!(outcome.raw_text.as_deref(), Some(""));
        assert_eq!(outcome.degradations.len(), 1);
        assert_eq!(outcome.degradations[0].stage, Stage::Transcription);
        assert_eq!(harness.transcriber.calls.load(Ordering::SeqCst), 1);
        assert!(harness.upload_dir_is_empty());
    }

    #[tokio::test]
    async fn voice_language_comes_from_metadata() {
        let transcriber = FakeTranscriber {
            transcript: Some("Min farfar hette Karl.".to_string()),
            ..FakeTranscriber::default()
        };
        let harness = Harness::new(ScriptedModel::answering(PERSON_ANSWER), transcriber);

        let mut metadata = Map::new();
        metadata.insert("language".to_string(), json!("sv"));
        let request = IngestionRequest::upload(
            ContentType::Voice,
            UploadedFile::new("memo.m4a", b"audio".to_vec()),
        )
        .with_metadata(metadata);

        let outcome = harness.pipeline.ingest(request).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.raw_text.as_deref(), Some("Min farfar hette Karl."));
        assert_eq!(outcome.entities.len(), 1);

        let languages = harness
            .transcriber
            .languages
            .lock()
            .map(|languages| languages.clone())
            .unwrap_or_default();
        assert_eq!(languages, vec!["sv".to_string()]);
    }

    #[tokio::test]
    async fn malformed_extraction_is_success_with_no_entities() {
        let harness = Harness::new(
            ScriptedModel::answering("I found two people: Elsa and Karl."),
            FakeTranscriber::default(),
        );
        let outcome = harness.pipeline.ingest_text("Elsa and Karl").await;

        assert_eq!(outcome.status, IngestionStatus::Success);
        assert!(outcome.entities.is_empty());
        assert_eq!(outcome.degradations[0].stage, Stage::Extraction);
    }

    #[tokio::test]
    async fn unavailable_model_is_success_with_no_entities() {
        let harness = Harness::new(ScriptedModel::failing(), FakeTranscriber::default());
        let outcome = harness.pipeline.ingest_text("Elsa and Karl").await;

        assert!(outcome.is_success());
        assert!(outcome.entities.is_empty());
    }

    #[tokio::test]
    async fn pdf_pages_flow_into_extraction_and_are_cleaned_up() {
        let harness = Harness::new(
            ScriptedModel::answering(PERSON_ANSWER),
            FakeTranscriber::default(),
        );
        let outcome = harness
            .pipeline
            .ingest_pdf(UploadedFile::new("parish-register.pdf", b"%PDF-1.4".to_vec()))
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.raw_text.as_deref(), Some("page-0001\npage-0002"));
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(harness.renderer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.ocr.calls.load(Ordering::SeqCst), 2);
        assert!(harness.upload_dir_is_empty());
    }

    #[tokio::test]
    async fn image_is_recognized_then_removed() {
        let harness = Harness::new(
            ScriptedModel::answering("[]"),
            FakeTranscriber::default(),
        );
        let outcome = harness
            .pipeline
            .ingest_image(UploadedFile::new("headstone.JPG", b"jpeg".to_vec()))
            .await;

        assert!(outcome.is_success());
        let raw = outcome.raw_text.unwrap_or_default();
        assert!(raw.ends_with("_headstone"), "{raw}");
        assert!(harness.upload_dir_is_empty());
    }

    #[tokio::test]
    async fn non_pdf_is_rejected() {
        let harness = Harness::new(
            ScriptedModel::answering("[]"),
            FakeTranscriber::default(),
        );
        let outcome = harness
            .pipeline
            .ingest_pdf(UploadedFile::new("register.docx", b"PK".to_vec()))
            .await;

        assert_eq!(outcome.status, IngestionStatus::Error);
        assert_eq!(outcome.error_message.as_deref(), Some("File is not a PDF"));
        assert_eq!(harness.renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_before_touching_disk() {
        let harness = Harness::with_config(
            ScriptedModel::answering("[]"),
            FakeTranscriber::default(),
            |mut config| {
                config.max_file_size = 4;
                config
            },
        );
        let outcome = harness
            .pipeline
            .ingest_image(UploadedFile::new("scan.png", b"too large".to_vec()))
            .await;

        assert_eq!(outcome.status, IngestionStatus::Error);
        assert_eq!(harness.ocr.calls.load(Ordering::SeqCst), 0);
        assert!(harness.upload_dir_is_empty());
    }

    #[tokio::test]
    async fn single_vcard_maps_directly_to_an_individual() {
        let harness = Harness::new(
            ScriptedModel::answering(PERSON_ANSWER),
            FakeTranscriber::default(),
        );
        let outcome = harness
            .pipeline
            .ingest_carddav("BEGIN:VCARD\nFN:John Doe\nN:Doe;John;;;\nBDAY:1980-01-15\nEND:VCARD")
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.entities.len(), 1);
        let entity = &outcome.entities[0];
        assert_eq!(entity.entity_type, EntityType::Individual);
        assert_eq!(entity.data["given_names"], "John");
        assert_eq!(entity.data["surname"], "Doe");
        assert_eq!(entity.data["birth_date"], "1980-01-15");
        assert_eq!(entity.confidence, 0.9);
        assert!(outcome.raw_text.is_none());
        assert_eq!(harness.model.call_count(), 0);
    }

    #[tokio::test]
    async fn single_vcard_without_display_name_emits_nothing() {
        let harness = Harness::new(
            ScriptedModel::answering(PERSON_ANSWER),
            FakeTranscriber::default(),
        );
        let outcome = harness
            .pipeline
            .ingest_carddav("BEGIN:VCARD\nN:Doe;Jane;;;\nEND:VCARD")
            .await;

        assert_eq!(outcome.status, IngestionStatus::Success);
        assert!(outcome.entities.is_empty());
        assert!(outcome.error_message.is_none());
        assert_eq!(harness.model.call_count(), 0);
    }

    #[tokio::test]
    async fn vcard_file_keeps_only_named_contacts() {
        let harness = Harness::new(
            ScriptedModel::answering(PERSON_ANSWER),
            FakeTranscriber::default(),
        );
        let file = "BEGIN:VCARD\nFN:John Doe\nEND:VCARD\n\
                    BEGIN:VCARD\nN:Unnamed;Someone;;;\nEND:VCARD\n\
                    BEGIN:VCARD\nFN:Jane Roe\nEND:VCARD\n";
        let outcome = harness
            .pipeline
            .ingest_carddav_file(UploadedFile::new("family.vcf", file.as_bytes().to_vec()))
            .await;

        assert!(outcome.is_success());
        let names: Vec<_> = outcome
            .entities
            .iter()
            .map(|entity| entity.data["display_name"].clone())
            .collect();
        assert_eq!(names, vec![json!("John Doe"), json!("Jane Roe")]);
        assert_eq!(harness.model.call_count(), 0);
        assert!(harness.upload_dir_is_empty());
    }

    #[tokio::test]
    async fn fault_after_upload_still_cleans_up() {
        let harness = Harness::new(
            ScriptedModel::answering("[]"),
            FakeTranscriber::default(),
        );
        let outcome = harness
            .pipeline
            .ingest_carddav_file(UploadedFile::new("broken.vcf", vec![0xff, 0xfe, 0x00]))
            .await;

        assert_eq!(outcome.status, IngestionStatus::Error);
        assert!(outcome
            .error_message
            .as_deref()
            .is_some_and(|message| !message.is_empty()));
        assert!(harness.upload_dir_is_empty());
    }

    #[tokio::test]
    async fn mismatched_content_shapes_are_errors() {
        let harness = Harness::new(
            ScriptedModel::answering("[]"),
            FakeTranscriber::default(),
        );

        let inline_voice = IngestionRequest {
            content: IngestContent::Text("not audio".to_string()),
            content_type: ContentType::Voice,
            source_type: Default::default(),
            source_id: None,
            metadata: None,
        };
        let uploaded_text = IngestionRequest::upload(
            ContentType::Text,
            UploadedFile::new("notes.txt", b"hi".to_vec()),
        );

        for request in [inline_voice, uploaded_text] {
            let outcome = harness.pipeline.ingest(request).await;
            assert_eq!(outcome.status, IngestionStatus::Error);
            assert!(outcome.entities.is_empty());
        }
        assert!(harness.upload_dir_is_empty());
    }
}
