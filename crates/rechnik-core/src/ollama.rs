//! Client for a local Ollama server's `/api/generate` endpoint.
//!
//! Two instances exist at runtime: the primary Bulgarian-tuned model for
//! lemma/inflection/metadata work, and a larger general model for
//! example-sentence generation.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::validator::ValidationError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_WORD_MODEL: &str = "todorov/bggpt:latest";
pub const DEFAULT_SENTENCE_MODEL: &str = "qwen2.5:14b";

/// Seam for the chat model so the pipeline can run against a stub.
pub trait ChatBackend: Send + Sync {
    /// Sends one prompt and returns the model's raw text response.
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Identifier for logging.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub model: String,
    pub temperature: f32,
    pub num_ctx: u32,
    pub timeout: Duration,
}

impl ModelOptions {
    pub fn word_model() -> Self {
        ModelOptions {
            model: DEFAULT_WORD_MODEL.to_string(),
            temperature: 0.2,
            num_ctx: 2048,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn sentence_model() -> Self {
        ModelOptions {
            model: DEFAULT_SENTENCE_MODEL.to_string(),
            temperature: 0.7,
            num_ctx: 4096,
            timeout: Duration::from_secs(180),
        }
    }
}

pub struct OllamaClient {
    base_url: String,
    options: ModelOptions,
    system: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, options: ModelOptions, system: impl Into<String>) -> Self {
        OllamaClient {
            base_url: base_url.into(),
            options,
            system: system.into(),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_ctx: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl ChatBackend for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.options.model,
            prompt,
            system: &self.system,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: self.options.temperature,
                num_ctx: self.options.num_ctx,
            },
        };

        debug!(model = %self.options.model, prompt_len = prompt.len(), "calling ollama");

        let response = ureq::post(&format!("{}/api/generate", self.base_url))
            .timeout(self.options.timeout)
            .send_json(&request)
            .with_context(|| format!("failed to call ollama model {}", self.options.model))?;

        let response: GenerateResponse = response
            .into_json()
            .context("failed to parse ollama response envelope")?;

        Ok(response.response)
    }

    fn name(&self) -> &str {
        &self.options.model
    }
}

/// Parses the model's raw text as a strictly-typed JSON payload.
///
/// Models occasionally wrap JSON in prose; only the outermost braced
/// region is considered. Any deviation from the expected shape is a
/// [`ValidationError`], not a transport error.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let start = raw
        .find('{')
        .ok_or_else(|| ValidationError::new("no JSON object in model response"))?;
    let end = raw
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| ValidationError::new("unterminated JSON object in model response"))?;
    serde_json::from_str(&raw[start..=end])
        .map_err(|e| ValidationError::new(format!("malformed model JSON: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses::LemmaDetection;

    #[test]
    fn test_parse_model_json_plain() {
        let d: LemmaDetection = parse_model_json(
            r#"{"wordForm":"котки","lemma":"котка","partOfSpeech":"NOUN"}"#,
        )
        .unwrap();
        assert_eq!(d.word_form, "котки");
    }

    #[test]
    fn test_parse_model_json_wrapped_in_prose() {
        let raw = "Here you go:\n{\"wordForm\":\"котки\",\"lemma\":\"котка\",\"partOfSpeech\":\"NOUN\"}\nHope that helps!";
        let d: LemmaDetection = parse_model_json(raw).unwrap();
        assert_eq!(d.lemma, "котка");
    }

    #[test]
    fn test_parse_model_json_failure_is_validation_error() {
        let err = parse_model_json::<LemmaDetection>("not json at all").unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_some());

        let err = parse_model_json::<LemmaDetection>(r#"{"lemma":"котка"}"#).unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_some());
    }
}
