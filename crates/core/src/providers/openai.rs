use crate::error::CapabilityError;
use crate::traits::{CompletionRequest, LanguageModel, Transcriber};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use std::path::Path;
use url::Url;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// OpenAI-compatible chat completion and audio transcription client.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    transcription_model: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, CapabilityError> {
        let parsed = Url::parse(base_url)?;

        Ok(Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            client: Client::new(),
        })
    }

    pub fn with_transcription_model(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = model.into();
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CapabilityError> {
        let body = json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.prompt},
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self.post("/v1/chat/completions").json(&body).send().await?;
        if !response.status().is_success() {
            return Err(CapabilityError::Backend {
                service: "openai chat".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: Value = response.json().await?;
        chat_content(&payload)
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, audio: &Path, language: &str) -> Result<String, CapabilityError> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("audio")
            .to_string();

        let form = Form::new()
            .text("model", self.transcription_model.clone())
            .text("language", language.to_string())
            .part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .post("/v1/audio/transcriptions")
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CapabilityError::Backend {
                service: "openai transcription".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: Value = response.json().await?;
        Ok(payload
            .pointer("/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

fn chat_content(payload: &Value) -> Result<String, CapabilityError> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CapabilityError::EmptyResponse("openai chat completion".to_string()))
}
