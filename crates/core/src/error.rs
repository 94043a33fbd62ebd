use thiserror::Error;

/// Faults that end an ingestion with status ERROR.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("upload has no usable file name: {0:?}")]
    MissingFileName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("content is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::string::FromUtf8Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{stage} stage failed: {reason}")]
    StageFault { stage: String, reason: String },
}

/// Failures of an external capability (language model, transcription, OCR, page rendering).
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid response from {service}: {details}")]
    Backend { service: String, details: String },

    #[error("{service} did not answer within {seconds:.1}s")]
    Timeout { service: String, seconds: f64 },

    #[error("{0} returned an empty response")]
    EmptyResponse(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("`{program}` failed: {details}")]
    Command { program: String, details: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
