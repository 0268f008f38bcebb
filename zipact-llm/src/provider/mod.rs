//! # Chat completion backends
//!
//! `LlmProvider` is the seam; `AnyProvider` picks a backend at
//! runtime so async methods never need boxing.
//!
//! - `openai`: the chat completions API, also spoken by vLLM and Ollama
//! - `anthropic`: the messages API

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIProvider;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Falls back to the provider's configured model
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages, ..Default::default() }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub finish_reason: FinishReason,
    /// `None` when the backend did not report usage
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    /// Cut off at `max_tokens`
    Length,
    Other,
}

/// Tokens one call consumed, as reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

#[derive(Debug)]
pub enum ProviderError {
    Network(String),
    Api { status: u16, message: String },
    Parse(String),
    RateLimited { retry_after: Option<u64> },
    AuthenticationFailed,
    Other(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "network error: {}", e),
            Self::Api { status, message } => write!(f, "api error ({}): {}", status, message),
            Self::Parse(e) => write!(f, "unreadable response: {}", e),
            Self::RateLimited { retry_after: Some(secs) } => write!(f, "rate limited, retry after {}s", secs),
            Self::RateLimited { retry_after: None } => write!(f, "rate limited"),
            Self::AuthenticationFailed => write!(f, "authentication failed"),
            Self::Other(e) => f.write_str(e),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<ProviderError> for zipact_error::Error {
    fn from(err: ProviderError) -> Self {
        use zipact_error::ErrorKind;

        let kind = match &err {
            ProviderError::Network(_) => ErrorKind::NetworkFailed,
            ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
            ProviderError::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            ProviderError::Parse(_) => ErrorKind::ParseFailed,
            ProviderError::Api { .. } | ProviderError::Other(_) => ErrorKind::InferenceFailed,
        };
        zipact_error::Error::new(kind, err.to_string())
            .with_operation("provider::complete")
            .set_source(err)
    }
}

#[allow(async_fn_in_trait)]
pub trait LlmProvider: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}

/// Send a JSON request and decode the JSON reply, mapping HTTP failures.
pub(crate) async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let message = response.text().await.unwrap_or_default();
        return Err(match status.as_u16() {
            429 => ProviderError::RateLimited { retry_after },
            401 | 403 => ProviderError::AuthenticationFailed,
            code => ProviderError::Api { status: code, message },
        });
    }

    response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))
}

pub(crate) fn http_client(config: &ProviderConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

pub enum AnyProvider {
    OpenAI(OpenAIProvider),
    Anthropic(AnthropicProvider),
}

impl AnyProvider {
    pub fn from_config(config: ProviderConfig) -> Self {
        match config.provider_type {
            ProviderType::Anthropic => AnyProvider::Anthropic(AnthropicProvider::new(config)),
            ProviderType::OpenAI | ProviderType::Local => AnyProvider::OpenAI(OpenAIProvider::new(config)),
        }
    }
}

impl LlmProvider for AnyProvider {
    fn name(&self) -> &str {
        match self {
            AnyProvider::OpenAI(p) => p.name(),
            AnyProvider::Anthropic(p) => p.name(),
        }
    }

    fn default_model(&self) -> &str {
        match self {
            AnyProvider::OpenAI(p) => p.default_model(),
            AnyProvider::Anthropic(p) => p.default_model(),
        }
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        match self {
            AnyProvider::OpenAI(p) => p.complete(request).await,
            AnyProvider::Anthropic(p) => p.complete(request).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    Anthropic,
    /// OpenAI-compatible server without authentication
    Local,
}

impl FromStr for ProviderType {
    type Err = zipact_error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAI),
            "anthropic" => Ok(ProviderType::Anthropic),
            "local" => Ok(ProviderType::Local),
            other => Err(zipact_error::Error::config_invalid(format!(
                "unknown provider '{}', expected openai, anthropic or local",
                other
            ))),
        }
    }
}

impl ProviderConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::OpenAI,
            api_key: Some(api_key.into()),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            timeout_secs: 120,
        }
    }

    pub fn anthropic(api_key: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::Anthropic,
            api_key: Some(api_key.into()),
            base_url: "https://api.anthropic.com/v1".into(),
            model: "claude-sonnet-4-20250514".into(),
            timeout_secs: 120,
        }
    }

    /// vLLM, Ollama and friends. Local models are slow, hence the long timeout.
    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::Local,
            api_key: None,
            base_url: base_url.into(),
            model: model.into(),
            timeout_secs: 300,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}
