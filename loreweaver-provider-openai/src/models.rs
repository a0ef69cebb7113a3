//! Static model tables for the OpenAI family.

use loreweaver_provider::{ModelCapabilities, ModelInfo, Pricing};
use rust_decimal_macros::dec;

fn model(
    id: &str,
    name: &str,
    max_tokens: u32,
    context_window: u32,
    images: bool,
    input: rust_decimal::Decimal,
    output: rust_decimal::Decimal,
) -> ModelInfo {
    ModelInfo {
        id: id.into(),
        name: name.into(),
        max_tokens,
        context_window,
        capabilities: ModelCapabilities {
            images,
            prompt_cache: false,
            reasoning_budget: false,
            temperature: true,
        },
        pricing: Pricing {
            input,
            output,
            cache_write: None,
            cache_read: None,
        },
        tiers: vec![],
        deprecated: false,
    }
}

pub(crate) fn openai_models() -> Vec<ModelInfo> {
    vec![
        model("gpt-4o", "GPT-4o", 16_384, 128_000, true, dec!(2.5), dec!(10)),
        model(
            "gpt-4o-mini",
            "GPT-4o mini",
            16_384,
            128_000,
            true,
            dec!(0.15),
            dec!(0.6),
        ),
        {
            let mut m = model(
                "gpt-4-turbo",
                "GPT-4 Turbo",
                4_096,
                128_000,
                true,
                dec!(10),
                dec!(30),
            );
            m.deprecated = true;
            m
        },
    ]
}

pub(crate) fn groq_models() -> Vec<ModelInfo> {
    vec![
        model(
            "llama-3.3-70b-versatile",
            "Llama 3.3 70B",
            32_768,
            128_000,
            false,
            dec!(0.59),
            dec!(0.79),
        ),
        model(
            "llama-3.1-8b-instant",
            "Llama 3.1 8B",
            8_192,
            128_000,
            false,
            dec!(0.05),
            dec!(0.08),
        ),
    ]
}

pub(crate) fn zhipu_models() -> Vec<ModelInfo> {
    vec![
        model("glm-4-plus", "GLM-4 Plus", 8_192, 128_000, false, dec!(0.7), dec!(0.7)),
        model("glm-4-flash", "GLM-4 Flash", 8_192, 128_000, false, dec!(0), dec!(0)),
    ]
}

pub(crate) const DEFAULT_MAX_TOKENS: u32 = 4096;
