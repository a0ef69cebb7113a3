//! The [`ModelAdapter`] trait — one implementation per LLM vendor.

use crate::config::{ProviderConfig, ValidationReport};
use crate::error::ProviderError;
use crate::model::ModelInfo;
use crate::types::{ChatChunk, ChatRequest, ChatResponse, TokenUsage};
use async_trait::async_trait;
use futures::Stream;
use rust_decimal::Decimal;
use std::pin::Pin;

/// A boxed stream of chat chunks, as returned by [`ModelAdapter::chat_stream`].
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, ProviderError>> + Send>>;

/// Uniform capability set every vendor adapter implements.
///
/// Object-safe on purpose: the scheduler holds adapters as
/// `Arc<dyn ModelAdapter>` and picks among them per request.
///
/// Implementations own one shared HTTP client apiece and must not
/// reshape one vendor's responses into another vendor's format —
/// translation to the shared wire types is explicit per adapter.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Stable provider name ("anthropic", "openai", ...).
    fn provider_name(&self) -> &str;

    /// Models this adapter can serve, including deprecated ones
    /// (the scheduler filters those).
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;

    /// Execute a unary chat request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Execute a streaming chat request.
    ///
    /// The stream yields ordered chunks and ends either at the
    /// vendor's `[DONE]` sentinel or at a chunk with a non-null
    /// `finish_reason`. Dropping the stream aborts the underlying
    /// HTTP request.
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, ProviderError>;

    /// Check a configuration against this vendor's requirements.
    fn validate_config(&self, config: &ProviderConfig) -> ValidationReport;

    /// USD cost of the given usage on the given model.
    fn estimate_cost(&self, model: &str, usage: &TokenUsage) -> Decimal;

    /// Maximum output tokens for the given model.
    fn max_output_tokens(&self, model: &str) -> u32;
}
