//! Enrichment client: one LM request per institution.
//!
//! The client builds the schema prompt, hands it to an [`LmBackend`], pulls a
//! JSON object out of the reply and normalizes it into an [`EnrichedRecord`].
//! Every failure comes back as an [`EnrichError`] value so a caller looping
//! over many institutions can count it and move on.
use crate::record::{BaseRecord, EnrichedRecord};
use serde_json::Value;
use std::time::Instant;
use thiserror::Error;

pub mod backend;
pub mod extract;
pub mod payload;

pub use backend::{ChatCompletionsBackend, CommandBackend, LmBackend, LmRequest};
pub use extract::extract_json;
pub use payload::CollegePayload;

const SYSTEM_PROMPT: &str = include_str!("../prompts/college_system.md");
const SCHEMA_PROMPT: &str = include_str!("../prompts/college_schema.md");

/// Characters of an unparseable response kept in logs and errors.
pub const PARSE_PREVIEW_BYTES: usize = 200;

/// Per-item enrichment failure.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// The reply did not contain a usable JSON object.
    #[error("unparseable response for {name}: {message}")]
    Parse {
        name: String,
        message: String,
        preview: String,
    },
    /// The request itself failed (network, HTTP status, quota, auth, command).
    #[error("request failed for {name}: {message}")]
    Request { name: String, message: String },
}

impl EnrichError {
    /// Request failures may succeed on another attempt; parse failures are
    /// treated as permanent for this run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request { .. })
    }
}

/// Sampling settings sent with every request.
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1000,
        }
    }
}

/// Source of enriched records, one institution at a time.
pub trait Enricher {
    fn enrich(&self, base: &BaseRecord) -> Result<EnrichedRecord, EnrichError>;
}

/// LM-backed [`Enricher`].
pub struct EnrichmentClient {
    backend: Box<dyn LmBackend>,
    options: GenerationOptions,
}

impl EnrichmentClient {
    pub fn new(backend: Box<dyn LmBackend>, options: GenerationOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend_label(&self) -> String {
        self.backend.describe()
    }

    fn request_for(&self, base: &BaseRecord) -> LmRequest {
        LmRequest {
            system: SYSTEM_PROMPT.trim().to_string(),
            prompt: build_prompt(base),
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        }
    }
}

impl Enricher for EnrichmentClient {
    fn enrich(&self, base: &BaseRecord) -> Result<EnrichedRecord, EnrichError> {
        let request = self.request_for(base);
        let start = Instant::now();
        let text = self.backend.complete(&request).map_err(|err| {
            tracing::warn!(name = %base.name, error = %format!("{err:#}"), "enrichment request failed");
            EnrichError::Request {
                name: base.name.clone(),
                message: format!("{err:#}"),
            }
        })?;
        tracing::info!(
            name = %base.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = request.prompt.len(),
            response_bytes = text.len(),
            "lm invoke complete"
        );
        parse_response(&text, base)
    }
}

/// Fill the schema prompt for one institution.
pub fn build_prompt(base: &BaseRecord) -> String {
    SCHEMA_PROMPT
        .replace("{name}", &base.name)
        .replace("{url}", &base.url)
}

/// Parse raw LM text into a normalized record for `base`.
///
/// Only a single JSON object is accepted.
pub fn parse_response(text: &str, base: &BaseRecord) -> Result<EnrichedRecord, EnrichError> {
    let parsed = serde_json::from_str::<Value>(extract_json(text))
        .map_err(|err| err.to_string())
        .and_then(|value| match value {
            Value::Object(_) => {
                serde_json::from_value::<CollegePayload>(value).map_err(|err| err.to_string())
            }
            other => Err(format!("expected a JSON object, got {}", json_kind(&other))),
        });
    match parsed {
        Ok(payload) => Ok(payload.into_record(base)),
        Err(message) => {
            let preview = extract::preview(text, PARSE_PREVIEW_BYTES);
            tracing::warn!(
                name = %base.name,
                error = %message,
                preview = %preview,
                "could not parse enrichment response"
            );
            Err(EnrichError::Parse {
                name: base.name.clone(),
                message,
                preview,
            })
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[path = "lm_tests.rs"]
mod tests;
