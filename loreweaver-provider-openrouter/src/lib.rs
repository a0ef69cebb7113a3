#![deny(missing_docs)]
//! OpenRouter adapter.
//!
//! OpenRouter speaks the OpenAI wire shape with two extra attribution
//! headers. Unlike the pinned vendors it exposes a live `/models`
//! listing, which this adapter fetches and caches with a TTL, falling
//! back to a small static table when the listing is unreachable.

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use loreweaver_provider::error::map_reqwest_error;
use loreweaver_provider::{
    estimate_cost, ChatChunk, ChatRequest, ChatResponse, ChunkStream, ModelAdapter,
    ModelCapabilities, ModelInfo, Pricing, ProviderConfig, ProviderError, SseFrame,
    SseLineBuffer, TokenUsage, ValidationReport,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const MODEL_CACHE_TTL: Duration = Duration::from_secs(600);
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Adapter for openrouter.ai.
pub struct OpenRouter {
    api_key: String,
    base_url: String,
    referer: String,
    title: String,
    client: reqwest::Client,
    model_cache: Mutex<Option<(Vec<ModelInfo>, Instant)>>,
}

impl OpenRouter {
    /// Create an adapter with the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            referer: "https://github.com/loreweaver-rpg/loreweaver".into(),
            title: "loreweaver".into(),
            client: reqwest::Client::new(),
            model_cache: Mutex::new(None),
        }
    }

    /// Override the base URL (testing, proxies).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the attribution headers OpenRouter asks applications to send.
    #[must_use]
    pub fn attribution(mut self, referer: impl Into<String>, title: impl Into<String>) -> Self {
        self.referer = referer.into();
        self.title = title.into();
        self
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let data = body
            .get("data")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| ProviderError::InvalidResponse("missing data array".into()))?;
        Ok(data.iter().filter_map(parse_listed_model).collect())
    }

    async fn post_completions(
        &self,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn build_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut messages: Vec<serde_json::Value> = Vec::new();
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for msg in &request.messages {
            messages.push(serde_json::to_value(msg).unwrap_or_default());
        }
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        body
    }
}

/// Parse one entry of the `/models` listing; entries that don't carry
/// the fields we need are skipped.
fn parse_listed_model(entry: &serde_json::Value) -> Option<ModelInfo> {
    let id = entry["id"].as_str()?;
    let pricing = &entry["pricing"];
    // OpenRouter prices are USD per token; the shared tables are per 1e6.
    let per_million = |v: &serde_json::Value| {
        v.as_str()
            .and_then(|s| Decimal::from_str(s).ok())
            .map(|d| d * Decimal::from(1_000_000u64))
    };
    Some(ModelInfo {
        id: id.to_string(),
        name: entry["name"].as_str().unwrap_or(id).to_string(),
        max_tokens: entry["top_provider"]["max_completion_tokens"]
            .as_u64()
            .unwrap_or(u64::from(DEFAULT_MAX_TOKENS)) as u32,
        context_window: entry["context_length"].as_u64().unwrap_or(8192) as u32,
        capabilities: ModelCapabilities {
            images: entry["architecture"]["modality"]
                .as_str()
                .is_some_and(|m| m.contains("image")),
            prompt_cache: false,
            reasoning_budget: false,
            temperature: true,
        },
        pricing: Pricing {
            input: per_million(&pricing["prompt"]).unwrap_or_default(),
            output: per_million(&pricing["completion"]).unwrap_or_default(),
            cache_write: None,
            cache_read: None,
        },
        tiers: vec![],
        deprecated: false,
    })
}

fn fallback_models() -> Vec<ModelInfo> {
    vec![ModelInfo {
        id: "openrouter/auto".into(),
        name: "OpenRouter Auto".into(),
        max_tokens: DEFAULT_MAX_TOKENS,
        context_window: 128_000,
        capabilities: ModelCapabilities {
            images: false,
            prompt_cache: false,
            reasoning_budget: false,
            temperature: true,
        },
        pricing: Pricing {
            input: dec!(1),
            output: dec!(3),
            cache_write: None,
            cache_read: None,
        },
        tiers: vec![],
        deprecated: false,
    }]
}

#[async_trait]
impl ModelAdapter for OpenRouter {
    fn provider_name(&self) -> &str {
        "openrouter"
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let mut cache = self.model_cache.lock().await;
        if let Some((models, fetched)) = cache.as_ref() {
            if fetched.elapsed() < MODEL_CACHE_TTL {
                return Ok(models.clone());
            }
        }
        match self.fetch_models().await {
            Ok(models) if !models.is_empty() => {
                *cache = Some((models.clone(), Instant::now()));
                Ok(models)
            }
            Ok(_) | Err(_) => {
                tracing::warn!("openrouter model listing unavailable, using fallback table");
                Ok(fallback_models())
            }
        }
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        tracing::debug!(model = %request.model, "openrouter chat request");
        let response = self.post_completions(self.build_body(&request, false)).await?;
        let text = response.text().await.map_err(map_reqwest_error)?;
        serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("bad JSON: {e}")))
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, ProviderError> {
        tracing::debug!(model = %request.model, "openrouter streaming request");
        let response = self.post_completions(self.build_body(&request, true)).await?;
        let mut bytes = response.bytes_stream();
        Ok(Box::pin(stream! {
            let mut buf = SseLineBuffer::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(map_reqwest_error(e));
                        return;
                    }
                };
                let frames = match buf.push(&chunk) {
                    Ok(frames) => frames,
                    Err(overflow) => {
                        yield Err(ProviderError::InvalidResponse(overflow.to_string()));
                        return;
                    }
                };
                for frame in frames {
                    match frame {
                        SseFrame::Done => return,
                        SseFrame::Data(data) => {
                            if let Ok(parsed) = serde_json::from_str::<ChatChunk>(&data) {
                                let terminal = parsed.is_terminal();
                                yield Ok(parsed);
                                if terminal {
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        }))
    }

    fn validate_config(&self, config: &ProviderConfig) -> ValidationReport {
        if config.api_key.as_deref().unwrap_or("").is_empty() {
            ValidationReport::failed(vec!["openrouter requires an api_key".into()])
        } else {
            ValidationReport::ok()
        }
    }

    fn estimate_cost(&self, model: &str, usage: &TokenUsage) -> Decimal {
        // Use the cached table when present; cost estimation must not
        // block on a network fetch.
        if let Ok(cache) = self.model_cache.try_lock() {
            if let Some((models, _)) = cache.as_ref() {
                if let Some(m) = models.iter().find(|m| m.id == model) {
                    return estimate_cost(&m.pricing, usage);
                }
            }
        }
        fallback_models()
            .iter()
            .find(|m| m.id == model)
            .map(|m| estimate_cost(&m.pricing, usage))
            .unwrap_or_default()
    }

    fn max_output_tokens(&self, model: &str) -> u32 {
        if let Ok(cache) = self.model_cache.try_lock() {
            if let Some((models, _)) = cache.as_ref() {
                if let Some(m) = models.iter().find(|m| m.id == model) {
                    return m.max_tokens;
                }
            }
        }
        DEFAULT_MAX_TOKENS
    }
}
