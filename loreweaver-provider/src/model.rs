//! Model metadata: capabilities, pricing, and the shared cost formula.

use crate::types::TokenUsage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Capability flags for one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Accepts image inputs.
    pub images: bool,
    /// Supports prompt caching.
    pub prompt_cache: bool,
    /// Accepts a reasoning/thinking token budget.
    pub reasoning_budget: bool,
    /// Accepts a temperature parameter.
    pub temperature: bool,
}

/// USD prices per one million tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    /// Per 1e6 prompt tokens.
    pub input: Decimal,
    /// Per 1e6 completion tokens.
    pub output: Decimal,
    /// Per 1e6 cache-write tokens, when the vendor bills them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write: Option<Decimal>,
    /// Per 1e6 cache-read tokens, when the vendor bills them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read: Option<Decimal>,
}

/// Alternative pricing tier offered by a vendor (flex, priority, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTier {
    /// Tier name.
    pub name: String,
    /// Context window in this tier.
    pub context_window: u32,
    /// Tier pricing.
    pub pricing: Pricing,
}

/// Metadata for one model an adapter can serve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Vendor model id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Context window size.
    pub context_window: u32,
    /// Capability flags.
    pub capabilities: ModelCapabilities,
    /// Standard pricing.
    pub pricing: Pricing,
    /// Alternative tiers, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tiers: Vec<ServiceTier>,
    /// Whether the vendor has deprecated this model. The scheduler
    /// never selects deprecated models.
    #[serde(default)]
    pub deprecated: bool,
}

/// The uniform cost formula: `sum((tokens_k / 1e6) * price_k)` across
/// prompt, completion, and the cache legs where pricing defines them.
pub fn estimate_cost(pricing: &Pricing, usage: &TokenUsage) -> Decimal {
    let million = Decimal::from(1_000_000u64);
    let mut cost = Decimal::from(usage.prompt_tokens) / million * pricing.input
        + Decimal::from(usage.completion_tokens) / million * pricing.output;

    if let (Some(price), Some(tokens)) = (pricing.cache_write, usage.cache_creation_tokens) {
        cost += Decimal::from(tokens) / million * price;
    }
    if let (Some(price), Some(tokens)) = (pricing.cache_read, usage.cache_read_tokens) {
        cost += Decimal::from(tokens) / million * price;
    }
    cost
}
