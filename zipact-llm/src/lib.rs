//! # ZipAct LLM
//!
//! The transport layer between agents and language models.
//!
//! ## Core Concepts
//! - **Provider**: trait-based chat completion backend (OpenAI-compatible, Anthropic)
//! - **Client**: wraps a provider for a fixed model, never fails (errors become an
//!   empty reply) and keeps running token totals for the episode
//! - **Scripted**: a provider that replays canned replies, for tests

pub mod provider;
pub mod client;
pub mod scripted;

pub use provider::{
    LlmProvider, AnyProvider, ProviderConfig, ProviderType, ProviderError,
    ChatMessage, Role, CompletionRequest, CompletionResponse,
    FinishReason, Usage,
    OpenAIProvider, AnthropicProvider,
};
pub use client::{LlmClient, ChatOptions, TokenUsage, estimate_tokens};
pub use scripted::ScriptedProvider;
