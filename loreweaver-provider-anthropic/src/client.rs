//! Anthropic adapter struct and [`ModelAdapter`] implementation.

use crate::mapping::{from_api_response, to_api_request};
use crate::models::{model_table, DEFAULT_MAX_TOKENS};
use crate::streaming::stream_completion;
use async_trait::async_trait;
use loreweaver_provider::error::map_reqwest_error;
use loreweaver_provider::{
    estimate_cost, ChatRequest, ChatResponse, ChunkStream, ModelAdapter, ModelInfo,
    ProviderConfig, ProviderError, TokenUsage, ValidationReport,
};
use rust_decimal::Decimal;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Adapter for the Anthropic Messages API.
///
/// # Example
///
/// ```no_run
/// use loreweaver_provider_anthropic::Anthropic;
///
/// let adapter = Anthropic::new("sk-ant-...")
///     .base_url("https://api.anthropic.com");
/// ```
pub struct Anthropic {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl Anthropic {
    /// Create an adapter with the given API key and default base URL.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the base URL (testing, proxies).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    async fn post_messages(
        &self,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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
}

#[async_trait]
impl ModelAdapter for Anthropic {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(model_table())
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut body = to_api_request(&request, DEFAULT_MAX_TOKENS);
        body["stream"] = serde_json::Value::Bool(false);

        tracing::debug!(model = %request.model, "anthropic chat request");
        let response = self.post_messages(body).await?;
        let text = response.text().await.map_err(map_reqwest_error)?;
        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("bad JSON: {e}")))?;
        from_api_response(&json)
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, ProviderError> {
        let model = request.model.clone();
        let mut body = to_api_request(&request, DEFAULT_MAX_TOKENS);
        body["stream"] = serde_json::Value::Bool(true);

        tracing::debug!(model = %model, "anthropic streaming request");
        let response = self.post_messages(body).await?;
        Ok(stream_completion(response, model))
    }

    fn validate_config(&self, config: &ProviderConfig) -> ValidationReport {
        let mut errors = Vec::new();
        if config.api_key.as_deref().unwrap_or("").is_empty() {
            errors.push("anthropic requires an api_key".to_string());
        }
        if errors.is_empty() {
            ValidationReport::ok()
        } else {
            ValidationReport::failed(errors)
        }
    }

    fn estimate_cost(&self, model: &str, usage: &TokenUsage) -> Decimal {
        model_table()
            .iter()
            .find(|m| m.id == model)
            .map(|m| estimate_cost(&m.pricing, usage))
            .unwrap_or_default()
    }

    fn max_output_tokens(&self, model: &str) -> u32 {
        model_table()
            .iter()
            .find(|m| m.id == model)
            .map(|m| m.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }
}
