//! Language model boundary.
//!
//! Steps talk to a [`LanguageModel`] trait object. The production
//! implementation, [`GeminiClient`], calls the Generative Language REST API
//! with a blocking HTTP client so that a step's `run` only returns once it has
//! a definitive answer.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use taskflow_shared::{AppConfig, LlmConfig, Result, TaskflowError, resolve_api_key};

/// Collaborator name used in degradation records and errors.
pub const LANGUAGE_MODEL: &str = "language-model";

/// User-Agent string for model requests.
const USER_AGENT: &str = concat!("TaskFlow/", env!("CARGO_PKG_VERSION"));

/// A text-in, text-out generative model.
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    /// Generate a completion for `prompt`.
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the configured model, or report why it is unavailable.
pub fn model_from_config(config: &AppConfig) -> Result<Arc<dyn LanguageModel>> {
    let api_key = resolve_api_key(config)?;
    Ok(Arc::new(GeminiClient::new(&config.llm, api_key)?))
}

// ---------------------------------------------------------------------------
// Gemini REST client
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Blocking client for `models/{model}:generateContent`.
pub struct GeminiClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TaskflowError::Llm(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }
}

impl LanguageModel for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .map_err(|e| TaskflowError::Llm(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TaskflowError::Llm(format!(
                "{url}: HTTP {status}: {}",
                body.trim()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| TaskflowError::Llm(format!("{url}: invalid response body: {e}")))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(TaskflowError::Llm(format!("{url}: response had no text")));
        }

        debug!(response_len = text.len(), "model responded");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Remove Markdown code fences (```` ```json ```` … ```` ``` ````) around a model answer.
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (e.g. `json`) on the opening fence line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        },
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse a JSON answer, tolerating surrounding code fences.
pub fn parse_json_response<T: DeserializeOwned>(response: &str) -> Result<T> {
    serde_json::from_str(strip_code_fences(response))
        .map_err(|e| TaskflowError::parse(format!("model returned malformed JSON: {e}")))
}

/// Truncate `text` to at most `max_chars` characters for a prompt.
pub(crate) fn prompt_excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}
