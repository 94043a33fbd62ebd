use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use genealogy_ingest_core::{
    ContentType, IngestionOutcome, IngestionPipeline, IngestionRequest, OcrBackend, OpenAiClient,
    PdftoppmRenderer, SourceType, UploadedFile,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub type Pipeline = IngestionPipeline<OpenAiClient, OpenAiClient, OcrBackend, PdftoppmRenderer>;

const UPLOAD_FIELD: &str = "file";
/// Room for multipart framing on top of the largest accepted file, so that
/// oversized files still reach the pipeline and come back as ERROR outcomes.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state
        .pipeline
        .config()
        .max_file_size
        .saturating_add(MULTIPART_OVERHEAD);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let ingest = Router::new()
        .route("/text", post(ingest_text))
        .route("/voice", post(ingest_voice))
        .route("/image", post(ingest_image))
        .route("/pdf", post(ingest_pdf))
        .route("/carddav", post(ingest_carddav))
        .route("/carddav-file", post(ingest_carddav_file))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/ingest", ingest)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn serve(state: AppState, bind: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(%bind, "genealogy ingestion service listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("genealogy ingestion service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "unable to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: String,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request".to_string(),
            message: message.into(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self {
            status: error.status(),
            code: "invalid_multipart".to_string(),
            message: error.body_text(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            code: "invalid_json".to_string(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct TextBody {
    content: String,
    #[serde(default)]
    content_type: Option<ContentType>,
    #[serde(default)]
    source_type: Option<SourceType>,
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct CardBody {
    vcf_content: String,
}

#[derive(Debug, Default, Deserialize)]
struct LanguageQuery {
    language: Option<String>,
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Genealogy Ingestion Service",
        "version": env!("CARGO_PKG_VERSION"),
        "routes": [
            "/api/ingest/text",
            "/api/ingest/voice",
            "/api/ingest/image",
            "/api/ingest/pdf",
            "/api/ingest/carddav",
            "/api/ingest/carddav-file",
        ],
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ingest_text(
    State(state): State<AppState>,
    payload: Result<Json<TextBody>, JsonRejection>,
) -> Result<Json<IngestionOutcome>, ApiError> {
    let Json(body) = payload?;
    let mut request = IngestionRequest::text(body.content)
        .with_source(body.source_type.unwrap_or_default(), body.source_id);
    if let Some(content_type) = body.content_type {
        request.content_type = content_type;
    }
    if let Some(metadata) = body.metadata {
        request = request.with_metadata(metadata);
    }

    Ok(Json(state.pipeline.ingest(request).await))
}

async fn ingest_voice(
    State(state): State<AppState>,
    Query(query): Query<LanguageQuery>,
    multipart: Multipart,
) -> Result<Json<IngestionOutcome>, ApiError> {
    let file = read_upload(multipart).await?;
    let mut request = IngestionRequest::upload(ContentType::Voice, file);

    if let Some(language) = query.language.filter(|value| !value.trim().is_empty()) {
        let mut metadata = Map::new();
        metadata.insert("language".to_string(), Value::String(language));
        request = request.with_metadata(metadata);
    }

    Ok(Json(state.pipeline.ingest(request).await))
}

async fn ingest_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IngestionOutcome>, ApiError> {
    let file = read_upload(multipart).await?;
    Ok(Json(state.pipeline.ingest_image(file).await))
}

async fn ingest_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IngestionOutcome>, ApiError> {
    let file = read_upload(multipart).await?;
    Ok(Json(state.pipeline.ingest_pdf(file).await))
}

async fn ingest_carddav(
    State(state): State<AppState>,
    payload: Result<Json<CardBody>, JsonRejection>,
) -> Result<Json<IngestionOutcome>, ApiError> {
    let Json(body) = payload?;
    Ok(Json(state.pipeline.ingest_carddav(body.vcf_content).await))
}

async fn ingest_carddav_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IngestionOutcome>, ApiError> {
    let file = read_upload(multipart).await?;
    Ok(Json(state.pipeline.ingest_carddav_file(file).await))
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok(UploadedFile::new(filename, bytes.to_vec()));
    }

    Err(ApiError::bad_request(format!(
        "multipart field `{UPLOAD_FIELD}` is required"
    )))
}
