//! The engine contract shared by every reasoning strategy.

use async_trait::async_trait;
use loreweaver_provider::ChatMessage;
use loreweaver_scheduler::{ModelScheduler, RequestContext};
use loreweaver_tool::ToolManager;
use loreweaver_types::{AgentId, TaskId};
use std::sync::Arc;
use std::time::Duration;

/// What an engine needs from the agent hosting it.
#[derive(Clone)]
pub struct EngineHost {
    /// The hosting agent.
    pub agent_id: AgentId,
    /// Scheduler used for every model call.
    pub scheduler: Arc<ModelScheduler>,
    /// The agent's system prompt.
    pub system_prompt: String,
    /// Completion budget per model call.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
}

impl EngineHost {
    /// One model call with the host's settings applied.
    pub(crate) async fn ask(&self, prompt: String) -> Result<String, String> {
        let mut context = RequestContext::new(vec![ChatMessage::user(prompt)]);
        context.system = Some(self.system_prompt.clone());
        context.max_tokens = self.max_tokens;
        context.temperature = self.temperature;
        let response = self.scheduler.chat(&context).await.map_err(|e| e.to_string())?;
        response
            .first_text()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "empty model response".to_string())
    }
}

/// The task an engine is asked to reason about.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Task id, carried through for tracing.
    pub task_id: TaskId,
    /// The task text.
    pub task: String,
    /// Opaque metadata from the caller.
    pub metadata: serde_json::Value,
}

impl TaskContext {
    /// A task context with a fresh id.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task_id: TaskId::fresh(),
            task: task.into(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// Tuning knobs shared across strategies; each engine reads the
/// fields that apply to it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Chain: maximum reasoning steps.
    pub max_steps: u32,
    /// Chain: wall-clock limit per step.
    pub step_timeout: Duration,
    /// Chain: a thought containing any of these ends the chain.
    pub final_keywords: Vec<String>,
    /// Tree: maximum expansion depth.
    pub max_depth: u32,
    /// Tree: branches generated per node.
    pub max_branches: u32,
    /// Tree: nodes below this confidence are pruned.
    pub confidence_threshold: f64,
    /// ReAct: maximum loop iterations.
    pub max_iterations: u32,
    /// ReAct: total wall-clock limit.
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            step_timeout: Duration::from_secs(30),
            final_keywords: vec![
                "final answer".into(),
                "conclusion".into(),
                "solved".into(),
            ],
            max_depth: 5,
            max_branches: 3,
            confidence_threshold: 0.3,
            max_iterations: 10,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Outcome of one reasoning run.
#[derive(Debug, Clone)]
pub struct ReasoningResult {
    /// Thoughts in generation order.
    pub thoughts: Vec<String>,
    /// The final answer ("" on failure).
    pub final_answer: String,
    /// The path of thoughts that produced the answer.
    pub reasoning_path: Vec<String>,
    /// Wall-clock time spent.
    pub execution_time: Duration,
    /// Whether reasoning completed.
    pub ok: bool,
    /// Failure description when `ok` is false.
    pub error: Option<String>,
}

impl ReasoningResult {
    pub(crate) fn failure(
        thoughts: Vec<String>,
        execution_time: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            thoughts,
            final_answer: String::new(),
            reasoning_path: Vec::new(),
            execution_time,
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// One reasoning strategy.
///
/// Engines are created per agent per turn by the
/// [`EngineFactory`](crate::EngineFactory); they hold configuration
/// but no conversation state.
#[async_trait]
pub trait ReasoningEngine: std::fmt::Debug + Send + Sync {
    /// Strategy name (the factory registration key).
    fn name(&self) -> &'static str;

    /// Apply configuration. Called once by the factory before use.
    fn set_config(&mut self, config: EngineConfig);

    /// Run the strategy on a task.
    async fn process(
        &self,
        host: &EngineHost,
        task: &TaskContext,
        tools: Arc<ToolManager>,
    ) -> ReasoningResult;
}
