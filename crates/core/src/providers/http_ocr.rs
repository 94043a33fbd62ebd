use crate::error::CapabilityError;
use crate::traits::OcrEngine;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct OcrRequest {
    image_base64: String,
    source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    pages: Option<Vec<OcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

/// OCR served by a remote (often multimodal LLM) endpoint.
pub struct HttpOcr {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpOcr {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, CapabilityError> {
        let endpoint = Url::parse(endpoint.trim())?.to_string();
        let api_key = api_key.and_then(|value| {
            let key = value.trim().to_string();
            if key.is_empty() {
                None
            } else {
                Some(key)
            }
        });

        Ok(Self {
            endpoint,
            api_key,
            client: Client::new(),
        })
    }
}

#[async_trait]
impl OcrEngine for HttpOcr {
    async fn recognize(&self, image: &Path) -> Result<String, CapabilityError> {
        let bytes = tokio::fs::read(image).await?;
        let payload = OcrRequest {
            image_base64: STANDARD.encode(bytes),
            source_path: image.to_string_lossy().to_string(),
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(CapabilityError::Backend {
                service: format!("ocr endpoint {}", self.endpoint),
                details: response.status().to_string(),
            });
        }

        let payload: OcrResponse = response.json().await?;
        response_text(&payload)
    }
}

fn response_text(payload: &OcrResponse) -> Result<String, CapabilityError> {
    if let Some(listed) = &payload.pages {
        let mut pages = listed
            .iter()
            .filter_map(|page| {
                let text = page.text.as_ref().map(|value| value.trim().to_string())?;
                (!text.is_empty()).then(|| (page.page.unwrap_or(1), text))
            })
            .collect::<Vec<_>>();

        if !pages.is_empty() {
            pages.sort_by_key(|(number, _)| *number);
            return Ok(pages
                .into_iter()
                .map(|(_, text)| text)
                .collect::<Vec<_>>()
                .join("\n"));
        }
    }

    if let Some(raw_text) = &payload.text {
        let text = raw_text.trim();
        if !text.is_empty() {
            return Ok(text.to_string());
        }
    }

    Err(CapabilityError::EmptyResponse("ocr endpoint".to_string()))
}
