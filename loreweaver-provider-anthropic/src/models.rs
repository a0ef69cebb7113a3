//! Static model table for the Anthropic adapter.
//!
//! Anthropic has no public model-listing endpoint suitable for
//! runtime discovery; the table mirrors the published documentation.

use loreweaver_provider::{ModelCapabilities, ModelInfo, Pricing};
use rust_decimal_macros::dec;

pub(crate) fn model_table() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "claude-3-5-sonnet-20240620".into(),
            name: "Claude 3.5 Sonnet".into(),
            max_tokens: 8192,
            context_window: 200_000,
            capabilities: ModelCapabilities {
                images: true,
                prompt_cache: true,
                reasoning_budget: true,
                temperature: true,
            },
            pricing: Pricing {
                input: dec!(3.0),
                output: dec!(15.0),
                cache_write: Some(dec!(3.75)),
                cache_read: Some(dec!(0.3)),
            },
            tiers: vec![],
            deprecated: false,
        },
        ModelInfo {
            id: "claude-3-opus-20240229".into(),
            name: "Claude 3 Opus".into(),
            max_tokens: 4096,
            context_window: 200_000,
            capabilities: ModelCapabilities {
                images: true,
                prompt_cache: false,
                reasoning_budget: false,
                temperature: true,
            },
            pricing: Pricing {
                input: dec!(15.0),
                output: dec!(75.0),
                cache_write: None,
                cache_read: None,
            },
            tiers: vec![],
            deprecated: false,
        },
        ModelInfo {
            id: "claude-3-haiku-20240307".into(),
            name: "Claude 3 Haiku".into(),
            max_tokens: 4096,
            context_window: 200_000,
            capabilities: ModelCapabilities {
                images: true,
                prompt_cache: false,
                reasoning_budget: false,
                temperature: true,
            },
            pricing: Pricing {
                input: dec!(0.25),
                output: dec!(1.25),
                cache_write: None,
                cache_read: None,
            },
            tiers: vec![],
            deprecated: false,
        },
        // Superseded by 3.5; kept listed so stored sessions that pinned
        // it fail over cleanly instead of erroring on an unknown id.
        ModelInfo {
            id: "claude-3-sonnet-20240229".into(),
            name: "Claude 3 Sonnet".into(),
            max_tokens: 4096,
            context_window: 200_000,
            capabilities: ModelCapabilities {
                images: true,
                prompt_cache: false,
                reasoning_budget: false,
                temperature: true,
            },
            pricing: Pricing {
                input: dec!(3.0),
                output: dec!(15.0),
                cache_write: None,
                cache_read: None,
            },
            tiers: vec![],
            deprecated: true,
        },
    ]
}

pub(crate) const DEFAULT_MAX_TOKENS: u32 = 8192;
