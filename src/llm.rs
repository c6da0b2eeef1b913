//! LLM backend for model-backed debate agents.
//!
//! Agents depend only on the [`Completer`] trait; the shipped
//! [`ChatClient`] speaks any OpenAI-compatible `/chat/completions`
//! endpoint and bounds its own latency with a request timeout and a
//! small exponential-backoff retry loop, so a slow or flaky backend
//! degrades into an agent error instead of hanging a round barrier.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender ("system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Trait for backends that can complete a prompt with text.
///
/// This is the seam between the debate core and any vendor transport;
/// implementations must return an error rather than block indefinitely.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Produce a completion for the given messages.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError>;

    /// Human-readable backend identity, used in logs and rosters.
    fn model(&self) -> &str;
}

/// Internal request structure for the OpenAI-compatible API.
#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Internal response structure from the OpenAI-compatible API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ChatMessage,
}

/// Error response body from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct ChatClient {
    /// Base URL for the API.
    api_base: String,
    /// API key for authentication.
    api_key: String,
    /// Model identifier sent with every request.
    model: String,
    /// Sampling temperature.
    temperature: Option<f64>,
    /// Completion length cap.
    max_tokens: Option<u32>,
    /// Attempts before giving up (retryable failures only).
    max_attempts: u32,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl ChatClient {
    const DEFAULT_API_BASE: &'static str = "https://openrouter.ai/api/v1";
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Create a new client with explicit configuration.
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            max_attempts: 3,
            http_client: Client::builder()
                .timeout(Self::DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Create a client from environment variables.
    ///
    /// Reads `DEBATE_API_KEY` (required), `DEBATE_API_BASE` (defaults to
    /// OpenRouter) and uses the supplied model identifier.
    pub fn from_env(model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = env::var("DEBATE_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        let api_base =
            env::var("DEBATE_API_BASE").unwrap_or_else(|_| Self::DEFAULT_API_BASE.to_string());
        Ok(Self::new(api_base, api_key, model))
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    /// Set the max completion tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        self
    }

    /// Set how many attempts a request gets before failing.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    async fn request_once(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let api_request = ApiRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/chat/completions", self.api_base);

        let http_response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = http_response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::ApiError { code, message });
        }

        let response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LlmError::EmptyResponse(self.model.clone()))
    }

    fn is_retryable(err: &LlmError) -> bool {
        match err {
            LlmError::RequestFailed(_) => true,
            LlmError::ApiError { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

#[async_trait]
impl Completer for ChatClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let mut backoff = Duration::from_secs(1);
        let mut attempt = 1;
        loop {
            match self.request_once(&messages).await {
                Ok(content) => return Ok(content),
                Err(err) if attempt < self.max_attempts && Self::is_retryable(&err) => {
                    tracing::warn!(
                        model = %self.model,
                        attempt,
                        error = %err,
                        "LLM request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(8));
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_request_skips_unset_fields() {
        let request = ApiRequest {
            model: "test-model".to_string(),
            messages: vec![ChatMessage::user("hi")],
            temperature: None,
            max_tokens: None,
        };

        let json = serde_json::to_value(&request).expect("serializes");
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["model"], "test-model");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ChatClient::is_retryable(&LlmError::RequestFailed(
            "timeout".into()
        )));
        assert!(ChatClient::is_retryable(&LlmError::ApiError {
            code: 429,
            message: "rate limited".into()
        }));
        assert!(ChatClient::is_retryable(&LlmError::ApiError {
            code: 503,
            message: "overloaded".into()
        }));
        assert!(!ChatClient::is_retryable(&LlmError::ApiError {
            code: 400,
            message: "bad request".into()
        }));
        assert!(!ChatClient::is_retryable(&LlmError::EmptyResponse(
            "m".into()
        )));
    }

    #[test]
    fn test_config_builders_clamp() {
        let client = ChatClient::new("http://localhost:4000", "key", "m")
            .with_temperature(5.0)
            .with_max_attempts(0);
        assert_eq!(client.temperature, Some(2.0));
        assert_eq!(client.max_attempts, 1);
    }
}
