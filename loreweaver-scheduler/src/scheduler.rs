//! The scheduler core: candidate enumeration, scoring, selection,
//! retry, and cross-provider fallback.

use crate::config::{Priority, RequestContext, ScheduleResult, SchedulerConfig};
use crate::error::SchedulerError;
use crate::metrics::ProviderMetrics;
use loreweaver_provider::{
    ChatChunk, ChatRequest, ChatResponse, ChunkChoice, ChunkStream, Delta, ModelAdapter,
    ModelInfo, ProviderError,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How long a provider's model listing stays cached.
const MODEL_CACHE_TTL: Duration = Duration::from_secs(600);

/// Latency assumed for providers with no measurement and no default.
const FALLBACK_LATENCY_MS: u64 = 3000;

/// Completion-token assumption when the request does not set max_tokens.
const DEFAULT_COMPLETION_TOKENS: u32 = 1000;

#[derive(Debug, Clone)]
struct Candidate {
    provider: String,
    model: String,
    estimated_cost: Decimal,
    estimated_latency: u64,
    score: f64,
}

/// Picks the best (adapter, model) pair per request and executes with
/// retry and fallback. See the crate docs for the selection rules.
pub struct ModelScheduler {
    config: SchedulerConfig,
    adapters: HashMap<String, Arc<dyn ModelAdapter>>,
    metrics: Mutex<HashMap<String, ProviderMetrics>>,
    model_cache: Mutex<HashMap<String, (Vec<ModelInfo>, Instant)>>,
}

impl ModelScheduler {
    /// Create a scheduler with no adapters registered.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            adapters: HashMap::new(),
            metrics: Mutex::new(HashMap::new()),
            model_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Register an adapter under its provider name. Re-registering a
    /// name replaces the previous adapter.
    pub fn register_adapter(&mut self, adapter: Arc<dyn ModelAdapter>) {
        self.adapters
            .insert(adapter.provider_name().to_string(), adapter);
    }

    /// Registered provider names.
    pub fn providers(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    /// A snapshot of per-provider metrics.
    pub async fn metrics(&self) -> HashMap<String, ProviderMetrics> {
        self.metrics.lock().await.clone()
    }

    /// Pick the best candidate for a request without executing it.
    pub async fn schedule(
        &self,
        context: &RequestContext,
    ) -> Result<ScheduleResult, SchedulerError> {
        let candidates = self.find_candidates(context).await;
        let best = self
            .select_best(&candidates, context)
            .ok_or(SchedulerError::NoCandidates)?;
        Ok(ScheduleResult {
            provider: best.provider.clone(),
            model: best.model.clone(),
            estimated_cost: best.estimated_cost,
            estimated_latency: best.estimated_latency,
        })
    }

    /// Execute a unary chat request with retry and fallback.
    pub async fn chat(&self, context: &RequestContext) -> Result<ChatResponse, SchedulerError> {
        let schedule = self.schedule(context).await?;
        let adapter = Arc::clone(&self.adapters[&schedule.provider]);
        let request = build_request(context, &schedule.model);

        let started = Instant::now();
        match self.chat_with_retry(adapter.as_ref(), &request).await {
            Ok(response) => {
                let cost = response
                    .usage
                    .as_ref()
                    .map(|u| adapter.estimate_cost(&response.model, u));
                self.record(&schedule.provider, started.elapsed(), cost, true)
                    .await;
                Ok(response)
            }
            Err(err) => {
                self.record(&schedule.provider, started.elapsed(), None, false)
                    .await;
                tracing::warn!(
                    provider = %schedule.provider,
                    model = %schedule.model,
                    error = %err,
                    "request failed after retries, trying fallbacks"
                );
                self.fallback_chat(context, &schedule.provider, err).await
            }
        }
    }

    /// Execute a streaming chat request with retry and fallback.
    ///
    /// When every retry against the chosen provider fails, the request
    /// falls back as a unary call whose answer is re-chunked into two
    /// synthetic chunks: the content, then the finish reason.
    pub async fn chat_stream(
        &self,
        context: &RequestContext,
    ) -> Result<ChunkStream, SchedulerError> {
        let schedule = self.schedule(context).await?;
        let adapter = Arc::clone(&self.adapters[&schedule.provider]);
        let mut request = build_request(context, &schedule.model);
        request.stream = true;

        let started = Instant::now();
        let mut last_err: Option<ProviderError> = None;
        for attempt in 0..=self.config.max_retries {
            match adapter.chat_stream(request.clone()).await {
                Ok(stream) => {
                    self.record(&schedule.provider, started.elapsed(), None, true)
                        .await;
                    return Ok(stream);
                }
                Err(err) => {
                    last_err = Some(err);
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(backoff(self.config.retry_delay, attempt)).await;
                    }
                }
            }
        }

        let err = last_err.unwrap_or_else(|| ProviderError::transport("no attempt made"));
        self.record(&schedule.provider, started.elapsed(), None, false)
            .await;
        tracing::warn!(
            provider = %schedule.provider,
            error = %err,
            "stream failed, falling back to a unary request"
        );
        let response = self.fallback_chat(context, &schedule.provider, err).await?;
        Ok(rechunk(response))
    }

    async fn chat_with_retry(
        &self,
        adapter: &dyn ModelAdapter,
        request: &ChatRequest,
    ) -> Result<ChatResponse, ProviderError> {
        let mut last_err: Option<ProviderError> = None;
        for attempt in 0..=self.config.max_retries {
            match adapter.chat(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    tracing::debug!(attempt, error = %err, "chat attempt failed");
                    last_err = Some(err);
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(backoff(self.config.retry_delay, attempt)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ProviderError::transport("no attempt made")))
    }

    /// Walk the fallback providers (excluding the one that failed),
    /// re-scheduling with the pinned model cleared. The last fallback
    /// error wins when everything fails.
    async fn fallback_chat(
        &self,
        context: &RequestContext,
        failed_provider: &str,
        original: ProviderError,
    ) -> Result<ChatResponse, SchedulerError> {
        let mut last = (failed_provider.to_string(), original);

        for fallback in &self.config.fallback_providers {
            if fallback == failed_provider {
                continue;
            }
            let Some(adapter) = self.adapters.get(fallback) else {
                continue;
            };

            // Re-schedule against this provider only, model cleared.
            let mut relaxed = context.clone();
            relaxed.model = None;
            let candidates = self.find_candidates(&relaxed).await;
            let Some(best) = candidates.iter().find(|c| &c.provider == fallback) else {
                continue;
            };

            tracing::info!(provider = %fallback, model = %best.model, "attempting fallback");
            let request = build_request(&relaxed, &best.model);
            let started = Instant::now();
            match adapter.chat(request).await {
                Ok(response) => {
                    let cost = response
                        .usage
                        .as_ref()
                        .map(|u| adapter.estimate_cost(&response.model, u));
                    self.record(fallback, started.elapsed(), cost, true).await;
                    return Ok(response);
                }
                Err(err) => {
                    self.record(fallback, started.elapsed(), None, false).await;
                    tracing::warn!(provider = %fallback, error = %err, "fallback failed");
                    last = (fallback.clone(), err);
                }
            }
        }

        Err(SchedulerError::Exhausted {
            provider: last.0,
            source: last.1,
        })
    }

    async fn find_candidates(&self, context: &RequestContext) -> Vec<Candidate> {
        let has_images = context
            .messages
            .iter()
            .any(|m| m.content.has_images());

        let mut candidates = Vec::new();
        for (provider, adapter) in &self.adapters {
            let models = match self.models_for(provider, adapter.as_ref()).await {
                Ok(models) => models,
                Err(err) => {
                    tracing::warn!(provider = %provider, error = %err, "model listing failed");
                    continue;
                }
            };

            let latency = self.estimate_latency(provider).await;
            for model in &models {
                if model.deprecated {
                    continue;
                }
                if has_images && !model.capabilities.images {
                    continue;
                }
                if let Some(pinned) = &context.model {
                    if &model.id != pinned {
                        continue;
                    }
                }

                let cost = self.estimate_cost(adapter.as_ref(), &model.id, context);
                candidates.push(Candidate {
                    provider: provider.clone(),
                    model: model.id.clone(),
                    estimated_cost: cost,
                    estimated_latency: latency,
                    score: self.score(cost, latency, context.priority),
                });
            }
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        candidates
    }

    fn select_best<'a>(
        &self,
        candidates: &'a [Candidate],
        context: &RequestContext,
    ) -> Option<&'a Candidate> {
        if candidates.is_empty() {
            return None;
        }
        // A pinned model takes the best-scored candidate serving it.
        if context.model.is_some() {
            return candidates.first();
        }
        // Prefer the default provider while it stays acceptable.
        if let Some(default) = candidates
            .iter()
            .find(|c| c.provider == self.config.default_provider)
        {
            if self.is_acceptable(default, context) {
                return Some(default);
            }
        }
        candidates.first()
    }

    fn is_acceptable(&self, candidate: &Candidate, context: &RequestContext) -> bool {
        if let Some(threshold) = self.config.cost_threshold {
            if candidate.estimated_cost > threshold {
                return false;
            }
        }
        if context.priority == Priority::High
            && candidate.estimated_latency > self.config.high_priority_latency_threshold
        {
            return false;
        }
        true
    }

    fn score(&self, cost: Decimal, latency_ms: u64, priority: Priority) -> f64 {
        let mut score = 100.0;
        let cost_f = cost.to_f64().unwrap_or(f64::MAX);
        match self.config.cost_threshold {
            Some(threshold) if cost > threshold => score -= 50.0,
            _ => score -= (cost_f * 1000.0).min(30.0),
        }
        score -= (latency_ms as f64 / 200.0).min(20.0);
        score += priority.bonus();
        score.max(0.0)
    }

    fn estimate_cost(
        &self,
        adapter: &dyn ModelAdapter,
        model: &str,
        context: &RequestContext,
    ) -> Decimal {
        // Rough token accounting: ~4 characters per prompt token, and
        // the full completion budget on the output side.
        let prompt_chars: usize = context
            .messages
            .iter()
            .map(|m| m.content.as_text().len())
            .sum();
        let prompt_tokens = (prompt_chars / 4) as u64;
        let completion_tokens =
            u64::from(context.max_tokens.unwrap_or(DEFAULT_COMPLETION_TOKENS));
        let usage = loreweaver_provider::TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cache_creation_tokens: None,
            cache_read_tokens: None,
        };
        adapter.estimate_cost(model, &usage)
    }

    async fn estimate_latency(&self, provider: &str) -> u64 {
        let metrics = self.metrics.lock().await;
        if let Some(m) = metrics.get(provider) {
            if m.average_latency_ms > 0.0 {
                return m.average_latency_ms as u64;
            }
        }
        drop(metrics);
        self.config
            .default_latencies
            .get(provider)
            .copied()
            .unwrap_or(FALLBACK_LATENCY_MS)
    }

    async fn models_for(
        &self,
        provider: &str,
        adapter: &dyn ModelAdapter,
    ) -> Result<Vec<ModelInfo>, ProviderError> {
        {
            let cache = self.model_cache.lock().await;
            if let Some((models, fetched)) = cache.get(provider) {
                if fetched.elapsed() < MODEL_CACHE_TTL {
                    return Ok(models.clone());
                }
            }
        }
        let models = adapter.list_models().await?;
        self.model_cache
            .lock()
            .await
            .insert(provider.to_string(), (models.clone(), Instant::now()));
        Ok(models)
    }

    async fn record(&self, provider: &str, elapsed: Duration, cost: Option<Decimal>, ok: bool) {
        let mut metrics = self.metrics.lock().await;
        metrics
            .entry(provider.to_string())
            .or_default()
            .record(elapsed.as_millis() as u64, cost, ok);
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt)
}

fn build_request(context: &RequestContext, model: &str) -> ChatRequest {
    ChatRequest {
        messages: context.messages.clone(),
        model: model.to_string(),
        max_tokens: context.max_tokens,
        temperature: context.temperature,
        stream: context.stream,
        tools: context.tools.clone(),
        tool_choice: context.tool_choice.clone(),
        system: context.system.clone(),
        reasoning_budget: context.reasoning_budget,
    }
}

/// Re-chunk a unary response into the two synthetic chunks the
/// streaming contract requires: content first, then finish_reason.
fn rechunk(response: ChatResponse) -> ChunkStream {
    let content = response.first_text().unwrap_or_default();
    let finish = response
        .choices
        .first()
        .and_then(|c| c.finish_reason.clone())
        .unwrap_or_else(|| "stop".to_string());

    let chunks = vec![
        Ok(ChatChunk {
            id: response.id.clone(),
            model: response.model.clone(),
            created: response.created,
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta {
                    role: None,
                    content: Some(content),
                },
                finish_reason: None,
            }],
        }),
        Ok(ChatChunk {
            id: response.id,
            model: response.model,
            created: response.created,
            choices: vec![ChunkChoice {
                index: 0,
                delta: Delta::default(),
                finish_reason: Some(finish),
            }],
        }),
    ];
    Box::pin(futures::stream::iter(chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn scheduler(config: SchedulerConfig) -> ModelScheduler {
        ModelScheduler::new(config)
    }

    #[test]
    fn score_penalises_cost_and_latency() {
        let s = scheduler(SchedulerConfig::default());
        // Free and instant: only the priority bonus moves the needle.
        assert!((s.score(dec!(0), 0, Priority::Low) - 100.0).abs() < 1e-9);
        assert!((s.score(dec!(0), 0, Priority::High) - 120.0).abs() < 1e-9);
        // Latency penalty caps at 20.
        assert!((s.score(dec!(0), 100_000, Priority::Low) - 80.0).abs() < 1e-9);
        // Cost penalty caps at 30 without a threshold.
        assert!((s.score(dec!(1), 0, Priority::Low) - 70.0).abs() < 1e-9);
    }

    #[test]
    fn score_above_threshold_takes_flat_penalty() {
        let mut config = SchedulerConfig::default();
        config.cost_threshold = Some(dec!(0.01));
        let s = scheduler(config);
        assert!((s.score(dec!(0.02), 0, Priority::Low) - 50.0).abs() < 1e-9);
        // Below the threshold the scaled penalty applies instead.
        assert!((s.score(dec!(0.005), 0, Priority::Low) - 95.0).abs() < 1e-9);
    }

    #[test]
    fn score_is_clamped_at_zero() {
        let mut config = SchedulerConfig::default();
        config.cost_threshold = Some(dec!(0.0001));
        let s = scheduler(config);
        assert!(s.score(dec!(100), 1_000_000, Priority::Low) >= 0.0);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff(base, 0), Duration::from_secs(1));
        assert_eq!(backoff(base, 1), Duration::from_secs(2));
        assert_eq!(backoff(base, 3), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn rechunk_emits_content_then_finish() {
        use futures::StreamExt;
        use loreweaver_provider::{ChatMessage, Choice, MessageContent, Role};

        let response = ChatResponse {
            id: "r1".into(),
            model: "m".into(),
            created: 0,
            choices: vec![Choice {
                index: 0,
                message: ChatMessage {
                    role: Role::Assistant,
                    content: MessageContent::Text("The tavern falls silent.".into()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                finish_reason: Some("stop".into()),
            }],
            usage: None,
        };

        let chunks: Vec<_> = rechunk(response).collect().await;
        assert_eq!(chunks.len(), 2);
        let first = chunks[0].as_ref().unwrap();
        assert_eq!(first.first_content(), Some("The tavern falls silent."));
        assert!(!first.is_terminal());
        let second = chunks[1].as_ref().unwrap();
        assert!(second.is_terminal());
    }
}
