//! Chat-completion client.
//!
//! One request per call, no retries. Every way the upstream can fail is
//! mapped to its own [`RelayError`] variant by [`parse_completion`] (for the
//! response body) or by `From<reqwest::Error>` (for transport faults).

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{RelayError, Result};
use crate::prompt::{Conversation, Message};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1:free";
pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 800;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest slice of an unparseable body written to the log.
const LOGGED_BODY_CHARS: usize = 500;

/// Anything that can turn a conversation into the assistant's reply.
#[async_trait]
pub trait CompletionBackend: Send + Sync + 'static {
    async fn complete(&self, conversation: &Conversation) -> Result<String>;
}

/// Connection and sampling settings for [`OpenRouterClient`].
#[derive(Clone)]
pub struct CompletionConfig {
    /// API root; `/chat/completions` is appended.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Upper bound on the whole request, connect through body.
    pub timeout: Duration,
    /// Sent as `HTTP-Referer` for upstream attribution.
    pub referer: Option<String>,
    /// Sent as `X-Title` for upstream attribution.
    pub title: Option<String>,
}

impl CompletionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
            referer: None,
            title: None,
        }
    }
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &mask_token(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .finish()
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    max_tokens: u32,
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    config: CompletionConfig,
    endpoint: String,
}

impl OpenRouterClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RelayError::UpstreamTransport(format!("failed to build HTTP client: {e}")))?;
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        Ok(Self {
            http,
            config,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionBackend for OpenRouterClient {
    async fn complete(&self, conversation: &Conversation) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: conversation.messages(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        info!(
            model = %self.config.model,
            message_count = conversation.len(),
            api_key = %mask_token(&self.config.api_key),
            "sending chat completion request"
        );

        let mut request = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(referer) = &self.config.referer {
            request = request.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.config.title {
            request = request.header("X-Title", title);
        }

        let response = request.send().await.map_err(log_transport)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(log_transport)?;
        debug!(status, bytes = text.len(), "chat completion response received");

        parse_completion(status, &text)
    }
}

fn log_transport(e: reqwest::Error) -> RelayError {
    let mapped = RelayError::from(e);
    error!(error = %mapped, "chat completion transport failure");
    mapped
}

/// Extract the first choice's text from a raw completion response.
pub fn parse_completion(status: u16, body: &str) -> Result<String> {
    if body.trim().is_empty() {
        error!(status, "completion API returned an empty body");
        return Err(RelayError::UpstreamEmpty);
    }

    let value: Value = serde_json::from_str(body).map_err(|e| {
        let excerpt: String = body.chars().take(LOGGED_BODY_CHARS).collect();
        error!(status, error = %e, body = %excerpt, "completion API returned non-JSON body");
        RelayError::UpstreamMalformed { status }
    })?;

    match value.get("error") {
        None | Some(Value::Null) => {}
        Some(err) => {
            let message = match err {
                Value::String(s) => s.clone(),
                other => other
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_owned(),
            };
            error!(status, message = %message, "completion API reported an error");
            return Err(RelayError::UpstreamError { message });
        }
    }

    let first = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| {
            error!(status, "completion API response has no choices");
            RelayError::UpstreamNoChoices
        })?;

    first
        .pointer("/message/content")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| {
            warn!(status, "first choice carries no message content");
            RelayError::UpstreamMalformed { status }
        })
}

/// Masks an API key for logging: first 7 chars + `***` + last 4 chars,
/// or just `***` when the key is too short to reveal anything safely.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 11 {
        return "***".to_owned();
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}

// ── Tests ──────────────────────────────────────────────────────────────────────
