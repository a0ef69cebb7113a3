#![deny(missing_docs)]
//! # loreweaver-provider — the LLM adapter contract
//!
//! Defines the [`ModelAdapter`] trait every vendor adapter implements,
//! the OpenAI-shaped wire types the runtime speaks internally
//! (requests, responses, streaming chunks, usage), model metadata with
//! pricing, and the shared SSE line decoder used by streaming
//! adapters.
//!
//! Adapters translate between these types and their vendor's wire
//! format. They never reshape one vendor's response into another's —
//! mapping is explicit, per adapter, in that adapter's crate.

pub mod adapter;
pub mod config;
pub mod error;
pub mod model;
pub mod sse;
#[cfg(feature = "test-util")]
pub mod testing;
pub mod types;

pub use adapter::{ChunkStream, ModelAdapter};
pub use config::{ProviderConfig, ValidationReport};
pub use error::ProviderError;
pub use model::{estimate_cost, ModelCapabilities, ModelInfo, Pricing, ServiceTier};
pub use sse::{SseFrame, SseLineBuffer};
pub use types::{
    ChatChunk, ChatMessage, ChatRequest, ChatResponse, Choice, ChunkChoice, Delta, MessageContent,
    MessagePart, Role, TokenUsage, ToolCallSpec, ToolSpec,
};
