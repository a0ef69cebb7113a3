//! Scripted adapter for tests in dependent crates.
//!
//! Enabled by the `test-util` feature. The adapter replays a fixed
//! sequence of replies; once a single reply remains it repeats
//! forever, which keeps loop-shaped tests (chains, ReAct) from
//! running the script dry.

use crate::adapter::{ChunkStream, ModelAdapter};
use crate::config::{ProviderConfig, ValidationReport};
use crate::error::ProviderError;
use crate::model::{ModelCapabilities, ModelInfo, Pricing};
use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, Choice, MessageContent, Role, TokenUsage,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Adapter that replays a fixed list of responses.
pub struct ScriptedModel {
    provider: &'static str,
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedModel {
    /// A scripted adapter named "scripted".
    pub fn new(replies: &[&str]) -> Self {
        Self::named("scripted", replies)
    }

    /// A scripted adapter with a custom provider name.
    pub fn named(provider: &'static str, replies: &[&str]) -> Self {
        Self {
            provider,
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn next_reply(&self) -> String {
        let mut replies = self.replies.lock().expect("script poisoned");
        if replies.len() > 1 {
            replies.pop_front().unwrap_or_default()
        } else {
            replies.front().cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl ModelAdapter for ScriptedModel {
    fn provider_name(&self) -> &str {
        self.provider
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(vec![ModelInfo {
            id: "scripted-1".into(),
            name: "Scripted".into(),
            max_tokens: 4096,
            context_window: 32_000,
            capabilities: ModelCapabilities {
                images: false,
                prompt_cache: false,
                reasoning_budget: false,
                temperature: true,
            },
            pricing: Pricing::default(),
            tiers: vec![],
            deprecated: false,
        }])
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        Ok(ChatResponse {
            id: "scripted".into(),
            model: request.model,
            created: 0,
            choices: vec![Choice {
                index: 0,
                message: ChatMessage {
                    role: Role::Assistant,
                    content: MessageContent::Text(self.next_reply()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                finish_reason: Some("stop".into()),
            }],
            usage: None,
        })
    }

    async fn chat_stream(&self, _request: ChatRequest) -> Result<ChunkStream, ProviderError> {
        Err(ProviderError::transport("scripted adapter does not stream"))
    }

    fn validate_config(&self, _config: &ProviderConfig) -> ValidationReport {
        ValidationReport::ok()
    }

    fn estimate_cost(&self, _model: &str, _usage: &TokenUsage) -> Decimal {
        Decimal::ZERO
    }

    fn max_output_tokens(&self, _model: &str) -> u32 {
        4096
    }
}
