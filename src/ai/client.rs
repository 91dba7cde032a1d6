use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::AiError;
use crate::config::Config;

/// Text generation backend. Blocking; async callers go through `spawn_blocking`.
pub trait LlmClient {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AiError>;
}

/// Run `generate` and log model, outcome and elapsed time.
pub fn generate_logged(
    client: &dyn LlmClient,
    model: &str,
    prompt: &str,
) -> Result<String, AiError> {
    let started = Instant::now();
    let result = client.generate(model, prompt);
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(text) => tracing::info!(model, elapsed_ms, chars = text.len(), "AI call succeeded"),
        Err(e) => tracing::warn!(model, elapsed_ms, error = %e, "AI call failed"),
    }
    result
}

/// Build the client described by the configuration. Without an API key,
/// every call fails with `AiError::NotConfigured` and callers fall back.
pub fn llm_from_config(config: &Config) -> Result<Box<dyn LlmClient + Send + Sync>, AiError> {
    match &config.gemini_api_key {
        Some(key) => Ok(Box::new(GeminiClient::new(
            &config.gemini_base_url,
            key,
            config.ai_timeout,
        )?)),
        None => {
            tracing::warn!("GEMINI_API_KEY not set; AI features will use fallbacks");
            Ok(Box::new(DisabledLlmClient))
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Gemini
// ═══════════════════════════════════════════════════════════

/// Header carrying the API key, kept out of the URL so it never shows up
/// in error messages or logs.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Generative Language API client (`generateContent`).
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    /// Must be built outside the async runtime (blocking client).
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, AiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

/// Request body for `models/{model}:generateContent`
#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Concatenate the text parts of the first candidate.
fn response_text(response: GenerateResponse) -> Result<String, AiError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AiError::EmptyResponse);
    }
    Ok(text)
}

impl LlmClient for GeminiClient {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AiError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    AiError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    AiError::Timeout(self.timeout_secs)
                } else {
                    AiError::HttpClient(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| AiError::ResponseParsing(e.without_url().to_string()))?;

        response_text(parsed)
    }
}

/// Stand-in used when no API key is configured.
pub struct DisabledLlmClient;

impl LlmClient for DisabledLlmClient {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, AiError> {
        Err(AiError::NotConfigured)
    }
}

// ═══════════════════════════════════════════════════════════
// Mock
// ═══════════════════════════════════════════════════════════

/// Mock LLM client for testing: returns a configurable response or error.
pub struct MockLlmClient {
    response: Option<String>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Some(response.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails as if the service were unreachable.
    pub fn failing() -> Self {
        Self {
            response: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// (model, prompt) pairs received so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AiError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((model.to_string(), prompt.to_string()));
        }
        self.response
            .clone()
            .ok_or_else(|| AiError::Connection("mock".into()))
    }
}
