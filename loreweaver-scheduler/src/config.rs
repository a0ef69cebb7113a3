//! Scheduler configuration and the per-request context.

use loreweaver_provider::{ChatMessage, ToolSpec};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Request urgency; affects candidate scoring and acceptability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work.
    Low,
    /// Normal interactive work.
    #[default]
    Medium,
    /// Player-blocking work.
    High,
}

impl Priority {
    /// Score bonus for this priority.
    pub(crate) fn bonus(self) -> f64 {
        match self {
            Priority::High => 20.0,
            Priority::Medium => 10.0,
            Priority::Low => 0.0,
        }
    }
}

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Provider preferred when acceptable.
    pub default_provider: String,
    /// Providers tried, in order, after the chosen one fails all retries.
    pub fallback_providers: Vec<String>,
    /// Extra attempts after the first (so `max_retries + 1` tries total).
    pub max_retries: u32,
    /// Base backoff delay; attempt n waits `retry_delay * 2^n`.
    pub retry_delay: Duration,
    /// Above this estimated cost a candidate takes the full cost penalty
    /// and the default provider stops being acceptable.
    pub cost_threshold: Option<Decimal>,
    /// For high-priority requests, the default provider must answer
    /// faster than this (milliseconds) to stay acceptable.
    pub high_priority_latency_threshold: u64,
    /// Latency assumptions (milliseconds) used before any requests
    /// have been measured.
    pub default_latencies: HashMap<String, u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_provider: "anthropic".into(),
            fallback_providers: Vec::new(),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            cost_threshold: None,
            high_priority_latency_threshold: 5000,
            default_latencies: [
                ("anthropic".to_string(), 2000),
                ("openrouter".to_string(), 3000),
                ("ollama".to_string(), 500),
            ]
            .into_iter()
            .collect(),
        }
    }
}

/// One request submitted to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Pin to a specific model id, if set.
    pub model: Option<String>,
    /// Maximum completion tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Whether the caller wants a streaming response.
    pub stream: bool,
    /// Request urgency.
    pub priority: Priority,
    /// Tools the model may call.
    pub tools: Option<Vec<ToolSpec>>,
    /// Tool-choice directive.
    pub tool_choice: Option<serde_json::Value>,
    /// System prompt.
    pub system: Option<String>,
    /// Thinking-token budget.
    pub reasoning_budget: Option<u32>,
}

impl RequestContext {
    /// A context with just messages, everything else default.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }
}

/// Outcome of candidate selection, before execution.
#[derive(Debug, Clone)]
pub struct ScheduleResult {
    /// Chosen provider name.
    pub provider: String,
    /// Chosen model id.
    pub model: String,
    /// Estimated USD cost of the request.
    pub estimated_cost: Decimal,
    /// Estimated latency in milliseconds.
    pub estimated_latency: u64,
}
