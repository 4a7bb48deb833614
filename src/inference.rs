//! Inference Gateway
//!
//! Boundary to the language-model server. [`OllamaGateway`] performs one
//! non-streaming `POST /api/chat` per call with fixed sampling options and an
//! explicit timeout. There are no retries; any failure is reported as a
//! [`GenerationError`] and the caller decides what to store.

use crate::prompt::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Model server returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout(e.to_string())
        } else if e.is_decode() {
            GenerationError::MalformedResponse(e.to_string())
        } else {
            GenerationError::Network(e.to_string())
        }
    }
}

/// Chat-completion backend
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Produce the assistant reply for an assembled message list
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError>;

    /// Model identifier, for logging and status reporting
    fn model(&self) -> &str;
}

/// Reply body as decoded from the model server.
///
/// Variants are tried in order: a typed `message.content` string, then any
/// JSON object, then any other JSON value. Decoding valid JSON never fails.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChatReply {
    Structured { message: ReplyMessage },
    Mapping(serde_json::Map<String, Value>),
    Opaque(Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyMessage {
    pub content: String,
}

impl ChatReply {
    /// Extract the reply text, degrading to a JSON rendering of the raw body
    /// when no `message.content` is present.
    pub fn into_text(self) -> String {
        match self {
            ChatReply::Structured { message } => message.content,
            ChatReply::Mapping(map) => {
                match map.get("message").and_then(|m| m.get("content")) {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => Value::Object(map).to_string(),
                }
            }
            ChatReply::Opaque(Value::String(s)) => s,
            ChatReply::Opaque(other) => other.to_string(),
        }
    }
}

/// Ollama connection and sampling settings
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Server base URL
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    /// Maximum number of tokens to generate
    pub num_predict: u32,
    /// Overall request timeout
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "gemma3n".to_string(),
            temperature: 0.7,
            num_predict: 4096,
            timeout: Duration::from_secs(120),
        }
    }
}

impl OllamaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("OLLAMA_HOST")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s.starts_with("http://") || s.starts_with("https://") {
                    s
                } else {
                    format!("http://{}", s)
                }
            })
            .unwrap_or(defaults.base_url);

        let model = std::env::var("OLLAMA_CHAT_MODEL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.model);

        let temperature = std::env::var("OLLAMA_CHAT_TEMPERATURE")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.temperature);

        let num_predict = std::env::var("OLLAMA_CHAT_NUM_PREDICT")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.num_predict);

        let timeout = std::env::var("OLLAMA_CHAT_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            base_url,
            model,
            temperature,
            num_predict,
            timeout,
        }
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: u32,
}

/// Ollama `/api/chat` client
pub struct OllamaGateway {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaGateway {
    pub fn new(config: OllamaConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(60))
            .user_agent(format!("ollama-chat/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url.trim_end_matches('/'))
    }
}

/// Ollama reports failures as `{"error": "..."}`; prefer that text when present.
fn upstream_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl InferenceGateway for OllamaGateway {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
        let payload = OllamaChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.num_predict,
            },
        };

        let response = self.client.post(self.chat_url()).json(&payload).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                body: upstream_error_message(&body),
            });
        }

        let reply: ChatReply = serde_json::from_str(&body)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        Ok(reply.into_text())
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
