//! Scoring and sentiment services.
//!
//! [`HttpScoringClient`] talks to the prediction backend over JSON/HTTP:
//!
//! | Call        | Endpoint                 | Body                       |
//! |-------------|--------------------------|----------------------------|
//! | predict     | `POST /api/predict`      | [`ScoringRequest`]         |
//! | sentiment   | `POST /api/analyze-text` | `{ "text": "..." }`        |
//!
//! All connection details come from [`ScoringConfig`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::request::ScoringRequest;
use crate::config::ScoringConfig;

// ---------------------------------------------------------------------------
// ScoringError
// ---------------------------------------------------------------------------

/// Errors that can occur while calling the scoring or sentiment service.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoringError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("scoring request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("failed to parse service response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ScoringError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ScoringError::Timeout
        } else {
            ScoringError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedScore {
    pub probability: f64,
    pub risk_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhqScore {
    pub score: u8,
    pub severity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextScore {
    pub probability: f64,
}

/// Echo of the visual signal, present only when visual data was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualScore {
    pub probability: f64,
    pub flat_affect: f64,
    pub samples: usize,
}

/// The fields of the prediction response this client reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub combined: CombinedScore,
    pub phq: PhqScore,
    pub text: TextScore,
    #[serde(default)]
    pub visual: Option<VisualScore>,
}

/// Negative / neutral / positive shares of the interview text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub neg: f64,
    pub neu: f64,
    pub pos: f64,
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    sentiment: Option<Sentiment>,
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Service traits
// ---------------------------------------------------------------------------

/// Turns the collected signals into a risk estimate.
#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn predict(&self, request: &ScoringRequest) -> Result<ScoringResult, ScoringError>;
}

/// Sentiment breakdown of free text.
#[async_trait]
pub trait SentimentService: Send + Sync {
    async fn sentiment(&self, text: &str) -> Result<Sentiment, ScoringError>;
}

// ---------------------------------------------------------------------------
// HttpScoringClient
// ---------------------------------------------------------------------------

pub struct HttpScoringClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScoringClient {
    /// Build a client from config.  The per-request timeout comes from
    /// `config.timeout_secs`; a default client is used if the builder fails.
    pub fn from_config(config: &ScoringConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ScoringError>
    where
        B: Serialize + ?Sized + Sync,
        R: serde::de::DeserializeOwned,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ScoringError::Status {
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ScoringError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ScoringService for HttpScoringClient {
    async fn predict(&self, request: &ScoringRequest) -> Result<ScoringResult, ScoringError> {
        log::debug!(
            "scoring: POST /api/predict ({} chars of text, visual: {})",
            request.interview_text.len(),
            request.visual_data.is_some()
        );
        self.post("/api/predict", request).await
    }
}

#[async_trait]
impl SentimentService for HttpScoringClient {
    async fn sentiment(&self, text: &str) -> Result<Sentiment, ScoringError> {
        let body = serde_json::json!({ "text": text });
        let response: SentimentResponse = self.post("/api/analyze-text", &body).await?;
        match (response.sentiment, response.error) {
            (Some(sentiment), _) => Ok(sentiment),
            (None, Some(error)) => Err(ScoringError::Parse(error)),
            (None, None) => Err(ScoringError::Parse("response has no sentiment".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
