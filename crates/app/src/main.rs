mod server;

use anyhow::{anyhow, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use genealogy_ingest_core::providers::openai::{
    DEFAULT_OPENAI_BASE_URL, DEFAULT_TRANSCRIPTION_MODEL,
};
use genealogy_ingest_core::{
    classify_file, ContentType, ExtractionSettings, HttpOcr, IngestConfig, IngestionPipeline,
    IngestionRequest, Modality, OcrBackend, OpenAiClient, PdftoppmRenderer, RetryPolicy,
    TesseractOcr, UploadedFile, DEFAULT_MAX_FILE_SIZE,
};
use serde_json::{Map, Value};
use server::{AppState, Pipeline};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "genealogy-ingest", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory for per-ingestion scratch files
    #[arg(long, env = "INGEST_UPLOAD_DIR", default_value = "./uploads")]
    upload_dir: PathBuf,

    /// Largest accepted upload in bytes
    #[arg(long, env = "INGEST_MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    max_file_size: usize,

    /// Transcription language when a request carries none
    #[arg(long, env = "INGEST_DEFAULT_LANGUAGE", default_value = "en")]
    default_language: String,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Chat model used for entity extraction
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4")]
    model: String,

    /// Audio transcription model
    #[arg(long, env = "OPENAI_TRANSCRIPTION_MODEL", default_value = DEFAULT_TRANSCRIPTION_MODEL)]
    transcription_model: String,

    /// Remote OCR endpoint; local tesseract is used when unset
    #[arg(long, env = "OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// Bearer key for the remote OCR endpoint
    #[arg(long, env = "OCR_API_KEY", hide_env_values = true)]
    ocr_api_key: Option<String>,

    /// Tesseract language pack
    #[arg(long, env = "TESSERACT_LANG", default_value = "eng")]
    tesseract_lang: String,

    /// Retries for transcription, OCR and extraction calls
    #[arg(long, env = "INGEST_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the ingestion HTTP API.
    Serve {
        #[arg(long, env = "INGEST_BIND", default_value = "0.0.0.0:8001")]
        bind: SocketAddr,
    },
    /// Ingest one local file or inline text and print the outcome as JSON.
    Ingest {
        /// File to ingest; its kind is inferred from the extension unless --kind is given.
        #[arg(long, conflicts_with = "text", required_unless_present = "text")]
        file: Option<PathBuf>,
        /// Inline text (or vCard text with --kind carddav).
        #[arg(long)]
        text: Option<String>,
        #[arg(long, value_enum)]
        kind: Option<Kind>,
        /// Language hint for voice recordings.
        #[arg(long)]
        language: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Text,
    Voice,
    Image,
    Pdf,
    Carddav,
}

impl From<Kind> for ContentType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Text => ContentType::Text,
            Kind::Voice => ContentType::Voice,
            Kind::Image => ContentType::Image,
            Kind::Pdf => ContentType::Pdf,
            Kind::Carddav => ContentType::Carddav,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let pipeline = build_pipeline(&cli)?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        upload_dir = %pipeline.config().upload_dir.display(),
        "genealogy-ingest boot"
    );

    match cli.command {
        Command::Serve { bind } => {
            server::serve(AppState::new(pipeline), bind).await?;
        }
        Command::Ingest {
            file,
            text,
            kind,
            language,
        } => {
            let mut request = match (file, text) {
                (Some(path), _) => file_request(path, kind).await?,
                (None, Some(text)) => text_request(text, kind),
                (None, None) => bail!("either --file or --text is required"),
            };

            if let Some(language) = language {
                let mut metadata = request.metadata.take().unwrap_or_else(Map::new);
                metadata.insert("language".to_string(), Value::String(language));
                request = request.with_metadata(metadata);
            }

            let outcome = pipeline.ingest(request).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);

            if !outcome.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn build_pipeline(cli: &Cli) -> anyhow::Result<Pipeline> {
    let config = IngestConfig {
        upload_dir: cli.upload_dir.clone(),
        max_file_size: cli.max_file_size,
        default_language: cli.default_language.clone(),
        extraction: ExtractionSettings {
            model: cli.model.clone(),
            ..ExtractionSettings::default()
        },
        retry: RetryPolicy {
            max_retries: cli.max_retries,
            ..RetryPolicy::default()
        },
        ..IngestConfig::default()
    };
    config.validate()?;

    if cli.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; model calls will be unauthenticated");
    }

    let openai = OpenAiClient::new(&cli.openai_base_url, cli.openai_api_key.clone())?
        .with_transcription_model(&cli.transcription_model);

    let ocr = match cli.ocr_endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => {
            info!(endpoint, "using remote ocr endpoint");
            OcrBackend::Http(HttpOcr::new(endpoint, cli.ocr_api_key.clone())?)
        }
        _ => OcrBackend::Tesseract(TesseractOcr::new("tesseract", &cli.tesseract_lang)),
    };

    Ok(IngestionPipeline::new(
        config,
        openai.clone(),
        openai,
        ocr,
        PdftoppmRenderer::default(),
    ))
}

async fn file_request(path: PathBuf, kind: Option<Kind>) -> anyhow::Result<IngestionRequest> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;

    let content_type = match kind {
        Some(kind) => ContentType::from(kind),
        None => classify_file(&filename)
            .map(Modality::content_type)
            .ok_or_else(|| anyhow!("cannot infer the kind of {filename}; pass --kind"))?,
    };

    let bytes = tokio::fs::read(&path).await?;
    let request = match content_type {
        ContentType::Text => IngestionRequest::text(String::from_utf8(bytes)?),
        other => IngestionRequest::upload(other, UploadedFile::new(filename, bytes)),
    };

    Ok(request)
}

fn text_request(text: String, kind: Option<Kind>) -> IngestionRequest {
    match kind.map(ContentType::from) {
        Some(ContentType::Carddav) => IngestionRequest::vcard(text),
        Some(other) => {
            let mut request = IngestionRequest::text(text);
            request.content_type = other;
            request
        }
        None => IngestionRequest::text(text),
    }
}
