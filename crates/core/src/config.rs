use crate::error::IngestError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Settings for the language-model extraction call.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            temperature: 0.3,
            max_tokens: 2_000,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Retries applied to upstream capability calls. Zero retries means a failed
/// call degrades immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub const NONE: Self = Self {
        max_retries: 0,
        initial_backoff: Duration::from_millis(500),
    };

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub upload_dir: PathBuf,
    pub max_file_size: usize,
    pub default_language: String,
    pub extraction: ExtractionSettings,
    pub transcription_timeout: Duration,
    pub ocr_timeout: Duration,
    pub render_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            default_language: "en".to_string(),
            extraction: ExtractionSettings::default(),
            transcription_timeout: Duration::from_secs(120),
            ocr_timeout: Duration::from_secs(120),
            render_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }
}

impl IngestConfig {
    pub fn with_upload_dir(mut self, upload_dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = upload_dir.into();
        self
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_file_size == 0 {
            return Err(IngestError::InvalidConfig(
                "max_file_size must be greater than zero".to_string(),
            ));
        }

        if self.extraction.model.trim().is_empty() {
            return Err(IngestError::InvalidConfig("model name is empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.extraction.temperature) {
            return Err(IngestError::InvalidConfig(format!(
                "temperature {} is outside 0.0..=2.0",
                self.extraction.temperature
            )));
        }

        let timeouts = [
            ("extraction", self.extraction.timeout),
            ("transcription", self.transcription_timeout),
            ("ocr", self.ocr_timeout),
            ("render", self.render_timeout),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, timeout)| timeout.is_zero()) {
            return Err(IngestError::InvalidConfig(format!("{name} timeout must be non-zero")));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.max_file_size, 50 * 1024 * 1024);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = IngestConfig::default();
        config.ocr_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(IngestError::InvalidConfig(_))));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff_for(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(400));
    }
}
