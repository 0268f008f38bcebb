//! The agent-facing LLM client
//!
//! Agents never see provider errors: a failed call is logged and turns into an
//! empty reply, which the response parser treats as "no action found".

use crate::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use serde::{Deserialize, Serialize};

/// Sampling parameters for one call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl ChatOptions {
    pub fn new(temperature: f32, max_tokens: usize) -> Self {
        Self { temperature, max_tokens }
    }
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self::new(0.0, 512)
    }
}

/// Running token totals since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
    #[serde(default, skip_serializing)]
    pub calls: usize,
}

impl TokenUsage {
    fn add(&mut self, input: usize, output: usize) {
        self.input_tokens += input;
        self.output_tokens += output;
        self.total_tokens = self.input_tokens + self.output_tokens;
    }
}

/// Rough token count for messages when the backend reports no usage:
/// a quarter of the characters per message, plus framing overhead.
pub fn estimate_tokens(messages: &[ChatMessage]) -> usize {
    let body: usize = messages
        .iter()
        .map(|m| 4 + m.role.as_str().len() / 4 + 1 + m.content.len() / 4 + 1)
        .sum();
    body + 2
}

/// Wraps a provider for a fixed model and keeps token accounting.
pub struct LlmClient<P> {
    provider: P,
    model: String,
    usage: TokenUsage,
    verbose: bool,
    last_error: Option<zipact_error::Error>,
}

impl<P: LlmProvider> LlmClient<P> {
    pub fn new(provider: P, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            usage: TokenUsage::default(),
            verbose: false,
            last_error: None,
        }
    }

    /// Log every call's usage at info level
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Send one chat request. Never fails; errors yield an empty string.
    pub async fn chat(&mut self, messages: Vec<ChatMessage>, options: ChatOptions) -> String {
        self.usage.calls += 1;

        let request = CompletionRequest::new(messages.clone())
            .with_model(self.model.clone())
            .with_temperature(options.temperature)
            .with_max_tokens(options.max_tokens);

        let response = match self.provider.complete(request).await {
            Ok(response) => {
                self.last_error = None;
                response
            }
            Err(e) => {
                let err = zipact_error::Error::from(e)
                    .with_operation("llm::chat")
                    .with_context("model", self.model.clone());
                tracing::error!(
                    provider = self.provider.name(),
                    kind = %err.kind(),
                    retryable = err.is_retryable(),
                    error = %err,
                    "llm call failed"
                );
                self.last_error = Some(err);
                return String::new();
            }
        };

        if response.finish_reason == FinishReason::Length {
            tracing::debug!(model = %self.model, max_tokens = options.max_tokens, "completion cut off at max_tokens");
        }
        let content = response.content.unwrap_or_default();
        let (input, output) = match response.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (
                estimate_tokens(&messages),
                estimate_tokens(&[ChatMessage::assistant(content.as_str())]),
            ),
        };
        self.usage.add(input, output);

        if self.verbose {
            tracing::info!(
                call = self.usage.calls,
                input,
                output,
                cumulative_input = self.usage.input_tokens,
                cumulative_output = self.usage.output_tokens,
                cumulative_total = self.usage.total_tokens,
                "token usage"
            );
        } else {
            tracing::debug!(call = self.usage.calls, input, output, "token usage");
        }

        content
    }

    /// Why the most recent call came back empty, if it failed.
    pub fn last_error(&self) -> Option<&zipact_error::Error> {
        self.last_error.as_ref()
    }

    pub fn token_usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn reset_token_count(&mut self) {
        self.usage = TokenUsage::default();
    }
}
