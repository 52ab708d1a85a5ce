//! OpenRouter predictor.
//!
//! Sends the history window to an LLM through OpenRouter's
//! OpenAI-compatible chat completions API and parses a JSON answer of
//! the form `{"number": 17, "confidence": 42}`. Out-of-range values are
//! clamped onto the wheel and into 0..=100.
//!
//! Every failure is returned as an error; the gateway turns it into a
//! fallback prediction.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::Predictor;
use crate::engine::buffer::HistoryWindow;
use crate::types::{Prediction, PredictionSource};
use crate::wheel;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const DEFAULT_PRIMARY_MODEL: &str = "google/gemini-2.5-flash";

const DEFAULT_MAX_TOKENS: u32 = 256;

/// Retries on rate limit / server errors per model attempt.
const MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 500;

// ---------------------------------------------------------------------------
// API types (OpenAI-compatible)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

/// The JSON object the model is asked to produce.
#[derive(Debug, Deserialize)]
struct RawPrediction {
    number: f64,
    confidence: f64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenRouterPredictor {
    http: Client,
    api_key: SecretString,
    primary_model: String,
    fallback_model: Option<String>,
    max_tokens: u32,
    total_calls: AtomicU64,
}

impl OpenRouterPredictor {
    /// Create a new OpenRouter predictor.
    ///
    /// An empty `api_key` is accepted here; every call then fails and the
    /// gateway falls back locally.
    pub fn new(
        api_key: String,
        primary_model: Option<String>,
        fallback_model: Option<String>,
        max_tokens: Option<u32>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to build OpenRouter HTTP client")?;

        Ok(Self {
            http,
            api_key: SecretString::new(api_key),
            primary_model: primary_model.unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
            fallback_model,
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            total_calls: AtomicU64::new(0),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.primary_model
    }

    /// Total number of successful API calls made.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    pub fn system_prompt() -> &'static str {
        "You analyse sequences of European roulette outcomes (single zero, values 0-36). \
         Look for pseudo-patterns, hot and cold numbers, and simple frequencies. \
         Reply with ONLY a JSON object of the form {\"number\": <0-36>, \"confidence\": <1-100>}."
    }

    /// User prompt listing the window, most recent first.
    pub fn build_prompt(history: &HistoryWindow) -> String {
        let sequence = history
            .iter()
            .map(|o| o.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Analyze the following sequence of roulette outcomes, most recent first: [{sequence}]. \
             Predict the most likely next number (0-36) and give a confidence score (1-100)."
        )
    }

    /// Parse the model's reply into a catalog prediction.
    ///
    /// Tolerates prose or code fences around the JSON object. Values are
    /// rounded, then clamped.
    pub fn parse_prediction(text: &str) -> Result<Prediction> {
        let start = text.find('{').context("No JSON object in response")?;
        let end = text.rfind('}').context("Unterminated JSON object in response")?;
        if end < start {
            bail!("Malformed JSON object in response");
        }

        let raw: RawPrediction = serde_json::from_str(&text[start..=end])
            .context("Response JSON missing number/confidence")?;

        let value = raw.number.round().clamp(0.0, wheel::MAX_VALUE as f64) as u8;
        let confidence = raw.confidence.round().clamp(0.0, 100.0) as u8;

        Ok(Prediction {
            outcome: wheel::lookup(value)?,
            confidence,
            source: PredictionSource::Remote,
        })
    }

    /// Send a chat completion request for a specific model,
    /// with retry + exponential backoff.
    async fn call_model(&self, model: &str, user_message: &str) -> Result<String> {
        let request = ChatRequest {
            model: model.to_string(),
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Self::system_prompt().to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, model, "Retrying OpenRouter API call");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let resp = self
                .http
                .post(OPENROUTER_API_URL)
                .bearer_auth(self.api_key.expose_secret())
                .header("X-Title", "Roulette Tracker")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: ChatResponse = response
                            .json()
                            .await
                            .context("Failed to parse OpenRouter response")?;

                        self.total_calls.fetch_add(1, Ordering::Relaxed);

                        return body
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.message)
                            .map(|m| m.content)
                            .context("OpenRouter response had no message");
                    }

                    // Retryable errors: 429 (rate limit), 5xx
                    if status.as_u16() == 429 || status.is_server_error() {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, model, "Retryable OpenRouter error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    bail!("OpenRouter API error {status} (model={model}): {error_text}");
                }
                Err(e) => {
                    warn!(attempt, model, error = %e, "OpenRouter request failed");
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        bail!(
            "OpenRouter API failed after {} retries (model={}): {}",
            MAX_RETRIES,
            model,
            last_error.unwrap_or_default()
        )
    }

    /// Call the primary model, then the secondary one if configured and
    /// the primary fails.
    async fn call_api(&self, user_message: &str) -> Result<String> {
        match self.call_model(&self.primary_model, user_message).await {
            Ok(text) => Ok(text),
            Err(primary_err) => match self.fallback_model {
                Some(ref fallback) => {
                    warn!(
                        primary = %self.primary_model,
                        fallback = %fallback,
                        error = %primary_err,
                        "Primary model failed, trying secondary model"
                    );
                    self.call_model(fallback, user_message).await.with_context(|| {
                        format!(
                            "Both primary ({}) and secondary ({}) models failed. Primary error: {}",
                            self.primary_model, fallback, primary_err
                        )
                    })
                }
                None => Err(primary_err),
            },
        }
    }
}

#[async_trait]
impl Predictor for OpenRouterPredictor {
    async fn predict(&self, history: &HistoryWindow) -> Result<Prediction> {
        if self.api_key.expose_secret().is_empty() {
            bail!("API key missing");
        }

        let prompt = Self::build_prompt(history);
        debug!(model = %self.primary_model, history_len = history.len(), "Requesting prediction");

        let text = self.call_api(&prompt).await?;
        Self::parse_prediction(&text).context("Failed to parse prediction from LLM response")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction_defaults() {
        let client = OpenRouterPredictor::new("test-key".into(), None, None, None).unwrap();
        assert_eq!(client.model_name(), DEFAULT_PRIMARY_MODEL);
        assert!(client.fallback_model.is_none());
        assert_eq!(client.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(client.total_calls(), 0);
    }

    #[test]
    fn test_client_custom_models() {
        let client = OpenRouterPredictor::new(
            "k".into(),
            Some("anthropic/claude-sonnet-4".into()),
            Some("x-ai/grok-4.1-fast".into()),
            Some(512),
        )
        .unwrap();
        assert_eq!(client.model_name(), "anthropic/claude-sonnet-4");
        assert_eq!(client.fallback_model.as_deref(), Some("x-ai/grok-4.1-fast"));
        assert_eq!(client.max_tokens, 512);
    }

    #[test]
    fn test_build_prompt_lists_history() {
        let history = HistoryWindow::from(vec![
            wheel::lookup(32).unwrap(),
            wheel::lookup(0).unwrap(),
        ]);
        let prompt = OpenRouterPredictor::build_prompt(&history);
        assert!(prompt.contains("[32 (red), 0 (green)]"));
    }

    #[test]
    fn test_parse_plain_json() {
        let p = OpenRouterPredictor::parse_prediction(r#"{"number": 17, "confidence": 42}"#).unwrap();
        assert_eq!(p.outcome.value, 17);
        assert_eq!(p.confidence, 42);
        assert_eq!(p.source, PredictionSource::Remote);
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "Here you go:\n```json\n{\"number\": 5, \"confidence\": 30}\n```";
        let p = OpenRouterPredictor::parse_prediction(text).unwrap();
        assert_eq!(p.outcome.value, 5);
    }

    #[test]
    fn test_parse_clamps_out_of_range() {
        let p = OpenRouterPredictor::parse_prediction(r#"{"number": 99, "confidence": 250}"#).unwrap();
        assert_eq!(p.outcome.value, 36);
        assert_eq!(p.confidence, 100);

        let p = OpenRouterPredictor::parse_prediction(r#"{"number": -4, "confidence": -1}"#).unwrap();
        assert_eq!(p.outcome.value, 0);
        assert_eq!(p.confidence, 0);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(OpenRouterPredictor::parse_prediction("no idea").is_err());
        assert!(OpenRouterPredictor::parse_prediction(r#"{"number": "seven"}"#).is_err());
        assert!(OpenRouterPredictor::parse_prediction(r#"{"confidence": 50}"#).is_err());
        assert!(OpenRouterPredictor::parse_prediction("} {").is_err());
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let client = OpenRouterPredictor::new(String::new(), None, None, None).unwrap();
        let history = HistoryWindow::from(vec![wheel::lookup(3).unwrap()]);
        let err = client.predict(&history).await.unwrap_err();
        assert!(err.to_string().contains("API key missing"));
    }
}
