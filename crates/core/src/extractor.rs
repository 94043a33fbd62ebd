use crate::config::{ExtractionSettings, RetryPolicy};
use crate::stage::{call_bounded, StageOutcome};
use crate::traits::{CompletionRequest, LanguageModel};
use serde_json::Value;
use tracing::debug;

pub const EXTRACTION_SYSTEM_PROMPT: &str =
    "You are a genealogy data extraction expert. Always return valid JSON.";

/// Builds the fixed extraction instruction around `text`.
pub fn build_extraction_prompt(text: &str) -> String {
    format!(
        "You are a genealogy data extraction expert. Extract genealogical information from the \
following text and return it as JSON.

Extract the following entity types when present:
1. INDIVIDUAL - a person with given_names, surname, sex, birth_date, birth_place, death_date, \
death_place, note
2. FAMILY - marriage/partnership with spouses and children, marriage and divorce date and place
3. EVENT - births, deaths, marriages, censuses, etc. with event_type, date, place, description

For the text below, extract all genealogical entities and return as a JSON array with objects \
containing:
- entity_type: string (INDIVIDUAL, FAMILY, EVENT)
- data: object with extracted fields
- confidence: float (0-1) representing confidence in extraction

Text to extract from:
{text}

Return only valid JSON, no additional text."
    )
}

/// Decodes a model answer into raw entity records. A lone object counts as a
/// one-element list.
pub fn parse_extraction_response(raw: &str) -> Result<Vec<Value>, serde_json::Error> {
    let decoded: Value = serde_json::from_str(raw.trim())?;
    Ok(match decoded {
        Value::Array(records) => records,
        single => vec![single],
    })
}

/// Asks a language model for genealogical entities in a piece of text.
pub struct EntityExtractor<L> {
    model: L,
    settings: ExtractionSettings,
    retry: RetryPolicy,
}

impl<L> EntityExtractor<L>
where
    L: LanguageModel,
{
    pub fn new(model: L, settings: ExtractionSettings, retry: RetryPolicy) -> Self {
        Self {
            model,
            settings,
            retry,
        }
    }

    pub fn completion_request(&self, text: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            system: EXTRACTION_SYSTEM_PROMPT.to_string(),
            prompt: build_extraction_prompt(text),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }

    /// Never fails: an unavailable model or a malformed answer degrades to no
    /// records.
    pub async fn extract(&self, text: &str) -> StageOutcome<Vec<Value>> {
        if text.trim().is_empty() {
            debug!("skipping extraction for blank text");
            return StageOutcome::Ok(Vec::new());
        }

        let request = self.completion_request(text);
        let model = &self.model;
        let request = &request;
        let answer = call_bounded(
            "language model",
            self.settings.timeout,
            self.retry,
            || async move { model.complete(request).await },
        )
        .await;

        let answer = match answer {
            Ok(answer) => answer,
            Err(error) => {
                return StageOutcome::Degraded(format!("language model call failed: {error}"))
            }
        };

        match parse_extraction_response(&answer) {
            Ok(records) => {
                debug!(records = records.len(), "extraction response decoded");
                StageOutcome::Ok(records)
            }
            Err(error) => {
                StageOutcome::Degraded(format!("extraction response is not valid JSON: {error}"))
            }
        }
    }
}
