//! OpenAI-family adapter struct and [`ModelAdapter`] implementation.

use crate::models::{groq_models, openai_models, zhipu_models, DEFAULT_MAX_TOKENS};
use crate::streaming::stream_completion;
use async_trait::async_trait;
use loreweaver_provider::error::map_reqwest_error;
use loreweaver_provider::{
    estimate_cost, ChatRequest, ChatResponse, ChunkStream, ModelAdapter, ModelInfo,
    ProviderConfig, ProviderError, TokenUsage, ValidationReport,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const ZHIPU_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

/// Which OpenAI-shaped vendor this instance talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Flavor {
    OpenAi,
    Groq,
    Zhipu,
    /// A self-described compatible endpoint.
    Compatible(String),
}

/// Adapter for OpenAI Chat Completions and compatible endpoints.
pub struct OpenAi {
    flavor: Flavor,
    api_key: String,
    base_url: String,
    extra_headers: HashMap<String, String>,
    /// Model table for compatible endpoints that cannot be probed.
    compatible_models: Vec<ModelInfo>,
    client: reqwest::Client,
}

impl OpenAi {
    /// Adapter for api.openai.com.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            flavor: Flavor::OpenAi,
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.into(),
            extra_headers: HashMap::new(),
            compatible_models: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Adapter for any OpenAI-compatible endpoint.
    ///
    /// `provider_name` is what the scheduler and metrics will call
    /// this vendor. The caller supplies the models the endpoint
    /// serves, since compatible endpoints rarely expose a usable
    /// listing API.
    #[must_use]
    pub fn compatible(
        provider_name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        models: Vec<ModelInfo>,
    ) -> Self {
        Self {
            flavor: Flavor::Compatible(provider_name.into()),
            api_key: api_key.into(),
            base_url: base_url.into(),
            extra_headers: HashMap::new(),
            compatible_models: models,
            client: reqwest::Client::new(),
        }
    }

    /// Adapter pinned to Groq's OpenAI-compatible endpoint.
    #[must_use]
    pub fn groq(api_key: impl Into<String>) -> Self {
        let mut adapter = Self::new(api_key);
        adapter.flavor = Flavor::Groq;
        adapter.base_url = GROQ_BASE_URL.into();
        adapter
    }

    /// Adapter pinned to Zhipu's OpenAI-compatible endpoint.
    #[must_use]
    pub fn zhipu(api_key: impl Into<String>) -> Self {
        let mut adapter = Self::new(api_key);
        adapter.flavor = Flavor::Zhipu;
        adapter.base_url = ZHIPU_BASE_URL.into();
        adapter
    }

    /// Override the base URL (testing, proxies).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Add a header sent with every request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn models(&self) -> Vec<ModelInfo> {
        match &self.flavor {
            Flavor::OpenAi => openai_models(),
            Flavor::Groq => groq_models(),
            Flavor::Zhipu => zhipu_models(),
            Flavor::Compatible(_) => self.compatible_models.clone(),
        }
    }

    fn build_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut messages: Vec<serde_json::Value> = Vec::with_capacity(request.messages.len() + 1);
        // The separate system field folds back into the message list here.
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
        if let Some(tools) = &request.tools {
            body["tools"] = serde_json::Value::Array(
                tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            },
                        })
                    })
                    .collect(),
            );
        }
        if let Some(choice) = &request.tool_choice {
            body["tool_choice"] = choice.clone();
        }
        body
    }

    async fn post_completions(
        &self,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json");
        for (name, value) in &self.extra_headers {
            builder = builder.header(name, value);
        }

        let response = builder.json(&body).send().await.map_err(map_reqwest_error)?;
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
impl ModelAdapter for OpenAi {
    fn provider_name(&self) -> &str {
        match &self.flavor {
            Flavor::OpenAi => "openai",
            Flavor::Groq => "groq",
            Flavor::Zhipu => "zhipu",
            Flavor::Compatible(name) => name,
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(self.models())
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        tracing::debug!(provider = self.provider_name(), model = %request.model, "chat request");
        let response = self.post_completions(self.build_body(&request, false)).await?;
        let text = response.text().await.map_err(map_reqwest_error)?;
        serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("bad JSON: {e}")))
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, ProviderError> {
        tracing::debug!(provider = self.provider_name(), model = %request.model, "streaming request");
        let response = self.post_completions(self.build_body(&request, true)).await?;
        Ok(stream_completion(response))
    }

    fn validate_config(&self, config: &ProviderConfig) -> ValidationReport {
        let mut errors = Vec::new();
        if config.api_key.as_deref().unwrap_or("").is_empty() {
            errors.push(format!("{} requires an api_key", self.provider_name()));
        }
        if matches!(self.flavor, Flavor::Compatible(_))
            && config.base_url.as_deref().unwrap_or("").is_empty()
        {
            errors.push("compatible endpoints require a base_url".to_string());
        }
        if errors.is_empty() {
            ValidationReport::ok()
        } else {
            ValidationReport::failed(errors)
        }
    }

    fn estimate_cost(&self, model: &str, usage: &TokenUsage) -> Decimal {
        self.models()
            .iter()
            .find(|m| m.id == model)
            .map(|m| estimate_cost(&m.pricing, usage))
            .unwrap_or_default()
    }

    fn max_output_tokens(&self, model: &str) -> u32 {
        self.models()
            .iter()
            .find(|m| m.id == model)
            .map(|m| m.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use loreweaver_provider::ChatMessage;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user("Hello")], "gpt-4o-mini")
    }

    #[tokio::test]
    async fn chat_parses_openai_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Hi there."},
                    "finish_reason": "stop",
                }],
                "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = OpenAi::new("test-key").base_url(server.uri());
        let response = adapter.chat(request()).await.unwrap();
        assert_eq!(response.first_text().unwrap(), "Hi there.");
        assert_eq!(response.usage.unwrap().total_tokens, 8);
    }

    #[tokio::test]
    async fn system_field_folds_into_message_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "x", "object": "chat.completion", "created": 0, "model": "m",
                "choices": [],
            })))
            .mount(&server)
            .await;

        let adapter = OpenAi::new("k").base_url(server.uri());
        let mut req = request();
        req.system = Some("you are a DM".into());
        adapter.chat(req).await.unwrap();

        let received = &server.received_requests().await.unwrap()[0];
        let body: serde_json::Value = serde_json::from_slice(&received.body).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "you are a DM");
    }

    #[tokio::test]
    async fn streaming_parses_chunks_until_done() {
        let sse_body = "\
data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":0,\"model\":\"gpt-4o-mini\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"A \"},\"finish_reason\":null}]}\n\n\
data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":0,\"model\":\"gpt-4o-mini\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"goblin!\"},\"finish_reason\":null}]}\n\n\
data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":0,\"model\":\"gpt-4o-mini\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n\
data: [DONE]\n\n";

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body),
            )
            .mount(&server)
            .await;

        let adapter = OpenAi::new("k").base_url(server.uri());
        let mut stream = adapter.chat_stream(request()).await.unwrap();

        let mut text = String::new();
        let mut terminal_seen = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            if let Some(c) = chunk.first_content() {
                text.push_str(c);
            }
            terminal_seen |= chunk.is_terminal();
        }
        assert_eq!(text, "A goblin!");
        assert!(terminal_seen);
    }

    #[tokio::test]
    async fn extra_headers_reach_the_wire() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-custom", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "x", "object": "chat.completion", "created": 0, "model": "m",
                "choices": [],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = OpenAi::compatible("local", server.uri(), "k", vec![])
            .header("x-custom", "yes");
        adapter.chat(request()).await.unwrap();
    }

    #[test]
    fn flavors_report_their_names() {
        assert_eq!(OpenAi::new("k").provider_name(), "openai");
        assert_eq!(OpenAi::groq("k").provider_name(), "groq");
        assert_eq!(OpenAi::zhipu("k").provider_name(), "zhipu");
        assert_eq!(
            OpenAi::compatible("my-llm", "http://localhost", "k", vec![]).provider_name(),
            "my-llm"
        );
    }

    #[test]
    fn compatible_without_base_url_fails_validation() {
        let adapter = OpenAi::compatible("x", "", "k", vec![]);
        let cfg = ProviderConfig {
            api_key: Some("k".into()),
            ..ProviderConfig::default()
        };
        let report = adapter.validate_config(&cfg);
        assert!(!report.valid);
    }
}
