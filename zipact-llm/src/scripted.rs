//! A provider that replays canned replies in order and records what it was asked.

use crate::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider, ProviderError};
use std::collections::VecDeque;
use std::sync::Mutex;

pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `reply` once the script runs out instead of failing
    pub fn with_fallback(mut self, reply: impl Into<String>) -> Self {
        self.fallback = Some(reply.into());
        self
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self
            .replies
            .lock()
            .map_err(|_| ProviderError::Other("script lock poisoned".into()))?
            .pop_front();

        let content = next
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| ProviderError::Other("script exhausted".into()))?;

        Ok(CompletionResponse {
            content: Some(content),
            finish_reason: FinishReason::Stop,
            usage: None,
        })
    }
}
