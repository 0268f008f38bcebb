//! Anthropic messages API.

use super::*;
use reqwest::Client;

const API_VERSION: &str = "2023-06-01";
/// The messages API requires `max_tokens`.
const DEFAULT_MAX_TOKENS: usize = 1024;

pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { client: http_client(&config), config }
    }
}

/// System turns move into the top-level `system` field, joined by blank lines.
fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<WireMessage<'_>>) {
    let (system, rest): (Vec<&ChatMessage>, Vec<&ChatMessage>) =
        messages.iter().partition(|m| m.role == Role::System);

    let system = (!system.is_empty()).then(|| {
        system.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n\n")
    });
    let rest = rest
        .into_iter()
        .map(|m| WireMessage { role: m.role.as_str(), content: &m.content })
        .collect();
    (system, rest)
}

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let api_key = self.config.api_key.as_deref().ok_or(ProviderError::AuthenticationFailed)?;
        let (system, messages) = split_system(&request.messages);

        let body = MessagesBody {
            model: request.model.as_deref().unwrap_or(&self.config.model),
            messages,
            system,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
        };

        let http = self
            .client
            .post(self.config.endpoint("messages"))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body);

        let reply: MessagesReply = send_json(http).await?;
        let text: String = reply
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect();

        Ok(CompletionResponse {
            content: (!text.is_empty()).then_some(text),
            finish_reason: match reply.stop_reason.as_deref() {
                Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
                Some("max_tokens") => FinishReason::Length,
                _ => FinishReason::Other,
            },
            usage: Some(Usage {
                prompt_tokens: reply.usage.input_tokens,
                completion_tokens: reply.usage.output_tokens,
            }),
        })
    }
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: ReplyUsage,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ReplyUsage {
    input_tokens: usize,
    output_tokens: usize,
}
