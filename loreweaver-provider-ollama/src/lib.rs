#![deny(missing_docs)]
//! Ollama adapter for locally served models.
//!
//! Ollama requires no API key and bills nothing; every cost estimate
//! is zero. Streaming is newline-delimited JSON rather than SSE: one
//! JSON object per line, terminated by an object with `"done": true`.

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use loreweaver_provider::error::map_reqwest_error;
use loreweaver_provider::{
    ChatChunk, ChatMessage, ChatRequest, ChatResponse, Choice, ChunkChoice, ChunkStream, Delta,
    MessageContent, ModelAdapter, ModelCapabilities, ModelInfo, Pricing, ProviderConfig,
    ProviderError, Role, TokenUsage, ValidationReport,
};
use rust_decimal::Decimal;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Adapter for a local Ollama daemon.
pub struct Ollama {
    base_url: String,
    client: reqwest::Client,
}

impl Ollama {
    /// Create an adapter against the default localhost daemon.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the daemon URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let mut messages: Vec<serde_json::Value> = Vec::new();
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for msg in &request.messages {
            let role = match msg.role {
                Role::System => "system",
                Role::User | Role::Tool => "user",
                Role::Assistant => "assistant",
            };
            messages.push(serde_json::json!({
                "role": role,
                "content": msg.content.as_text(),
            }));
        }
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": stream,
        });
        let mut options = serde_json::Map::new();
        if let Some(temperature) = request.temperature {
            options.insert("temperature".into(), serde_json::json!(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            options.insert("num_predict".into(), serde_json::json!(max_tokens));
        }
        if !options.is_empty() {
            body["options"] = serde_json::Value::Object(options);
        }
        body
    }

    async fn post_chat(
        &self,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
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

impl Default for Ollama {
    fn default() -> Self {
        Self::new()
    }
}

fn usage_from(body: &serde_json::Value) -> Option<TokenUsage> {
    let prompt = body["prompt_eval_count"].as_u64();
    let completion = body["eval_count"].as_u64();
    match (prompt, completion) {
        (None, None) => None,
        _ => {
            let prompt = prompt.unwrap_or(0);
            let completion = completion.unwrap_or(0);
            Some(TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
                cache_creation_tokens: None,
                cache_read_tokens: None,
            })
        }
    }
}

#[async_trait]
impl ModelAdapter for Ollama {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
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
        let models = body["models"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|m| m["name"].as_str())
                    .map(|name| ModelInfo {
                        id: name.to_string(),
                        name: name.to_string(),
                        max_tokens: DEFAULT_MAX_TOKENS,
                        context_window: 8192,
                        capabilities: ModelCapabilities {
                            images: false,
                            prompt_cache: false,
                            reasoning_budget: false,
                            temperature: true,
                        },
                        pricing: Pricing::default(),
                        tiers: vec![],
                        deprecated: false,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(models)
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        tracing::debug!(model = %request.model, "ollama chat request");
        let model = request.model.clone();
        let response = self.post_chat(self.build_body(&request, false)).await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let content = body["message"]["content"].as_str().unwrap_or("").to_string();
        Ok(ChatResponse {
            id: format!("ollama-{model}"),
            model,
            created: 0,
            choices: vec![Choice {
                index: 0,
                message: ChatMessage {
                    role: Role::Assistant,
                    content: MessageContent::Text(content),
                    tool_calls: None,
                    tool_call_id: None,
                },
                finish_reason: Some(
                    body["done_reason"].as_str().unwrap_or("stop").to_string(),
                ),
            }],
            usage: usage_from(&body),
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, ProviderError> {
        tracing::debug!(model = %request.model, "ollama streaming request");
        let model = request.model.clone();
        let response = self.post_chat(self.build_body(&request, true)).await?;
        let mut bytes = response.bytes_stream();

        Ok(Box::pin(stream! {
            let mut line_buf = String::new();
            let mut seq: u64 = 0;

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(map_reqwest_error(e));
                        return;
                    }
                };
                line_buf.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = line_buf.find('\n') {
                    let line: String = line_buf.drain(..=pos).collect();
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let Ok(body) = serde_json::from_str::<serde_json::Value>(line) else {
                        continue;
                    };
                    seq += 1;
                    let done = body["done"].as_bool().unwrap_or(false);
                    let content = body["message"]["content"].as_str().unwrap_or("");
                    yield Ok(ChatChunk {
                        id: format!("ollama-{seq}"),
                        model: model.clone(),
                        created: 0,
                        choices: vec![ChunkChoice {
                            index: 0,
                            delta: Delta {
                                role: None,
                                content: if content.is_empty() {
                                    None
                                } else {
                                    Some(content.to_string())
                                },
                            },
                            finish_reason: done.then(|| {
                                body["done_reason"].as_str().unwrap_or("stop").to_string()
                            }),
                        }],
                    });
                    if done {
                        return;
                    }
                }
            }
        }))
    }

    fn validate_config(&self, _config: &ProviderConfig) -> ValidationReport {
        // A local daemon needs neither key nor base_url overrides.
        ValidationReport::ok()
    }

    fn estimate_cost(&self, _model: &str, _usage: &TokenUsage) -> Decimal {
        Decimal::ZERO
    }

    fn max_output_tokens(&self, _model: &str) -> u32 {
        DEFAULT_MAX_TOKENS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn chat_maps_message_and_counts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3",
                "message": {"role": "assistant", "content": "The cave is dark."},
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 20,
                "eval_count": 7,
            })))
            .mount(&server)
            .await;

        let adapter = Ollama::new().base_url(server.uri());
        let response = adapter
            .chat(ChatRequest::new(vec![ChatMessage::user("hi")], "llama3"))
            .await
            .unwrap();
        assert_eq!(response.first_text().unwrap(), "The cave is dark.");
        assert_eq!(response.usage.unwrap().total_tokens, 27);
    }

    #[tokio::test]
    async fn streaming_parses_ndjson_until_done() {
        use futures::StreamExt;

        let body = concat!(
            "{\"model\":\"llama3\",\"message\":{\"role\":\"assistant\",\"content\":\"Roll \"},\"done\":false}\n",
            "{\"model\":\"llama3\",\"message\":{\"role\":\"assistant\",\"content\":\"for it.\"},\"done\":false}\n",
            "{\"model\":\"llama3\",\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"done_reason\":\"stop\"}\n",
        );

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let adapter = Ollama::new().base_url(server.uri());
        let mut stream = adapter
            .chat_stream(ChatRequest::new(vec![ChatMessage::user("hi")], "llama3"))
            .await
            .unwrap();

        let mut text = String::new();
        let mut finished = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            if let Some(c) = chunk.first_content() {
                text.push_str(c);
            }
            finished |= chunk.is_terminal();
        }
        assert_eq!(text, "Roll for it.");
        assert!(finished);
    }

    #[tokio::test]
    async fn list_models_reads_tags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "llama3:latest"}, {"name": "mistral:7b"}],
            })))
            .mount(&server)
            .await;

        let adapter = Ollama::new().base_url(server.uri());
        let models = adapter.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].pricing, Pricing::default());
    }

    #[test]
    fn everything_is_free() {
        let adapter = Ollama::new();
        assert_eq!(
            adapter.estimate_cost("llama3", &TokenUsage::default()),
            Decimal::ZERO
        );
        assert!(adapter.validate_config(&ProviderConfig::default()).valid);
    }
}
