//! The ReAct executor: Thought → Action → Observation over the tool
//! manager, with a deterministic transcript grammar.
//!
//! Parsing never executes code. Action input goes through a ladder:
//! strict JSON, then a forgiving literal pass (single-quoted strings,
//! bare scalars — data only), and finally a `raw_input` wrapper so a
//! malformed model response still reaches the tool as data.

use crate::engine::{
    EngineConfig, EngineHost, ReasoningEngine, ReasoningResult, TaskContext,
};
use async_trait::async_trait;
use loreweaver_provider::ChatMessage;
use loreweaver_scheduler::{ModelScheduler, RequestContext};
use loreweaver_tool::{ToolManager, ToolSchema};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

static THOUGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Thought:\s*(.+)$").expect("thought regex"));
static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Action:\s*([\w\-]+)\s*$").expect("action regex"));
static ACTION_INPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Action Input:\s*(.+)$").expect("action input regex"));
static FINAL_ANSWER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Final Answer:\s*(.+)\z").expect("final answer regex"));

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ReActConfig {
    /// Maximum loop iterations before giving up.
    pub max_iterations: u32,
    /// Total wall-clock budget.
    pub timeout: Duration,
    /// Completion budget per model call.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
}

impl Default for ReActConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            timeout: Duration::from_secs(120),
            max_tokens: Some(2000),
            temperature: Some(0.2),
        }
    }
}

/// Kind of one transcript step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReActStepKind {
    /// A reasoning line.
    Thought,
    /// A tool invocation.
    Action,
    /// A tool result fed back to the model.
    Observation,
    /// The terminating answer.
    FinalAnswer,
}

/// One recorded step of the loop.
#[derive(Debug, Clone)]
pub struct ReActStep {
    /// Step kind.
    pub kind: ReActStepKind,
    /// Step content (thought text, tool + input, observation, answer).
    pub content: String,
    /// Loop iteration the step belongs to (1-based).
    pub iteration: u32,
}

/// Outcome of one executor run.
#[derive(Debug, Clone)]
pub struct ReActResult {
    /// Whether a final answer was produced.
    pub ok: bool,
    /// The final answer when `ok`.
    pub final_answer: Option<String>,
    /// Ordered transcript steps.
    pub steps: Vec<ReActStep>,
    /// Iterations consumed.
    pub iterations: u32,
    /// Wall-clock time spent.
    pub elapsed: Duration,
    /// Failure description ("max iterations", "timeout", or a model error).
    pub error: Option<String>,
}

/// What one model response parsed into.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedResponse {
    /// The loop is done.
    Final {
        /// The answer text.
        answer: String,
        /// Thought preceding the answer, if present.
        thought: Option<String>,
    },
    /// The model wants a tool call.
    Act {
        /// Thought preceding the action, if present.
        thought: Option<String>,
        /// Tool name.
        tool: String,
        /// Parsed arguments.
        input: Map<String, Value>,
    },
    /// Neither an action nor an answer; treat the text as a thought.
    ThoughtOnly(String),
}

/// Parse one model response against the transcript grammar.
pub(crate) fn parse_response(text: &str) -> ParsedResponse {
    let thought = THOUGHT_RE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty());

    if let Some(caps) = FINAL_ANSWER_RE.captures(text) {
        return ParsedResponse::Final {
            answer: caps[1].trim().to_string(),
            thought,
        };
    }

    if let Some(action) = ACTION_RE.captures(text) {
        let input = ACTION_INPUT_RE
            .captures(text)
            .map(|c| parse_action_input(c[1].trim()))
            .unwrap_or_default();
        return ParsedResponse::Act {
            thought,
            tool: action[1].to_string(),
            input,
        };
    }

    ParsedResponse::ThoughtOnly(thought.unwrap_or_else(|| text.trim().to_string()))
}

/// The Action Input ladder: JSON → forgiving literal → raw wrapper.
pub(crate) fn parse_action_input(raw: &str) -> Map<String, Value> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) {
        return map;
    }
    if let Some(map) = parse_loose_literal(raw) {
        return map;
    }
    let mut fallback = Map::new();
    fallback.insert("raw_input".to_string(), Value::String(raw.to_string()));
    fallback
}

/// Accept the common near-JSON the model produces: single-quoted
/// strings and unquoted bare words as values. Data only — there is
/// nothing here that can evaluate.
fn parse_loose_literal(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
        return None;
    }
    // Normalise single quotes to double quotes, then retry JSON.
    // Escaped apostrophes inside values are rare in tool args; a
    // failed parse still lands in the raw_input fallback.
    let normalised = trimmed.replace('\'', "\"");
    match serde_json::from_str::<Value>(&normalised) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Render the tool catalogue section of the prompt.
fn render_catalogue(schemas: &[ToolSchema]) -> String {
    let mut out = String::new();
    for schema in schemas {
        out.push_str(&format!("- {}: {}\n", schema.name, schema.description));
        for param in &schema.parameters {
            let requirement = if param.required { "required" } else { "optional" };
            out.push_str(&format!(
                "    {} ({}, {requirement}): {}",
                param.name,
                param.kind.type_name(),
                param.description
            ));
            if let Some(values) = &param.enum_values {
                out.push_str(&format!(" one of {values:?}"));
            }
            if let Some(default) = &param.default {
                out.push_str(&format!(" default {default}"));
            }
            out.push('\n');
        }
    }
    out
}

/// Drives the Thought/Action/Observation loop.
pub struct ReActExecutor {
    scheduler: Arc<ModelScheduler>,
    tools: Arc<ToolManager>,
    config: ReActConfig,
}

impl ReActExecutor {
    /// An executor over the given scheduler and tools.
    pub fn new(scheduler: Arc<ModelScheduler>, tools: Arc<ToolManager>, config: ReActConfig) -> Self {
        Self {
            scheduler,
            tools,
            config,
        }
    }

    fn initial_prompt(&self, task: &str, history: &[String]) -> String {
        let schemas: Vec<ToolSchema> = self
            .tools
            .list_tools(None)
            .into_iter()
            .map(|info| info.schema)
            .collect();
        let history_text = if history.is_empty() {
            "(none)".to_string()
        } else {
            history.join("\n")
        };
        format!(
            "You can use tools to solve the task.\n\nAvailable tools:\n{catalogue}\n\
             Task: {task}\nHistory:\n{history_text}\n\n\
             Answer in this exact format:\n\
             Thought: your reasoning\n\
             Action: tool name\n\
             Action Input: JSON arguments\n\
             Observation: (filled in for you)\n\
             ... repeat Thought/Action/Action Input/Observation ...\n\
             Thought: I now know the final answer\n\
             Final Answer: the answer\n\n\
             Begin!\nThought:",
            catalogue = render_catalogue(&schemas),
        )
    }

    /// Run the loop for one task.
    pub async fn execute(&self, task: &str, history: &[String]) -> ReActResult {
        let started = Instant::now();
        let mut transcript = self.initial_prompt(task, history);
        let mut steps: Vec<ReActStep> = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            if started.elapsed() > self.config.timeout {
                return self.fail(steps, iteration - 1, started, "timeout");
            }

            let mut context = RequestContext::new(vec![ChatMessage::user(transcript.clone())]);
            context.max_tokens = self.config.max_tokens;
            context.temperature = self.config.temperature;

            let response = match self.scheduler.chat(&context).await {
                Ok(response) => response.first_text().unwrap_or_default(),
                Err(err) => return self.fail(steps, iteration, started, err.to_string()),
            };

            match parse_response(&response) {
                ParsedResponse::Final { answer, thought } => {
                    if let Some(thought) = thought {
                        steps.push(ReActStep {
                            kind: ReActStepKind::Thought,
                            content: thought,
                            iteration,
                        });
                    }
                    steps.push(ReActStep {
                        kind: ReActStepKind::FinalAnswer,
                        content: answer.clone(),
                        iteration,
                    });
                    return ReActResult {
                        ok: true,
                        final_answer: Some(answer),
                        steps,
                        iterations: iteration,
                        elapsed: started.elapsed(),
                        error: None,
                    };
                }
                ParsedResponse::Act {
                    thought,
                    tool,
                    input,
                } => {
                    if let Some(thought) = thought {
                        steps.push(ReActStep {
                            kind: ReActStepKind::Thought,
                            content: thought,
                            iteration,
                        });
                    }
                    steps.push(ReActStep {
                        kind: ReActStepKind::Action,
                        content: format!("{tool} {}", Value::Object(input.clone())),
                        iteration,
                    });

                    // The manager validates against the schema before
                    // the tool runs; a validation failure comes back as
                    // an observation the model can correct from.
                    let result = self.tools.call(&tool, input).await;
                    let observation = if result.ok {
                        result
                            .value
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "null".to_string())
                    } else {
                        format!(
                            "error: {}",
                            result.error.unwrap_or_else(|| "unknown".to_string())
                        )
                    };
                    steps.push(ReActStep {
                        kind: ReActStepKind::Observation,
                        content: observation.clone(),
                        iteration,
                    });

                    transcript.push_str(&format!("\n{response}\nObservation: {observation}\n"));
                }
                ParsedResponse::ThoughtOnly(thought) => {
                    steps.push(ReActStep {
                        kind: ReActStepKind::Thought,
                        content: thought.clone(),
                        iteration,
                    });
                    transcript.push_str(&format!("\nThought: {thought}\n"));
                }
            }
        }

        let iterations = self.config.max_iterations;
        self.fail(steps, iterations, started, "max iterations")
    }

    fn fail(
        &self,
        steps: Vec<ReActStep>,
        iterations: u32,
        started: Instant,
        error: impl Into<String>,
    ) -> ReActResult {
        let error = error.into();
        tracing::warn!(error = %error, iterations, "react loop failed");
        ReActResult {
            ok: false,
            final_answer: None,
            steps,
            iterations,
            elapsed: started.elapsed(),
            error: Some(error),
        }
    }
}

/// Factory adapter running the executor as a reasoning engine.
#[derive(Debug, Default)]
pub struct ReactEngine {
    config: EngineConfig,
}

#[async_trait]
impl ReasoningEngine for ReactEngine {
    fn name(&self) -> &'static str {
        "react"
    }

    fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    async fn process(
        &self,
        host: &EngineHost,
        task: &TaskContext,
        tools: Arc<ToolManager>,
    ) -> ReasoningResult {
        let executor = ReActExecutor::new(
            Arc::clone(&host.scheduler),
            tools,
            ReActConfig {
                max_iterations: self.config.max_iterations,
                timeout: self.config.timeout,
                max_tokens: host.max_tokens,
                temperature: host.temperature,
            },
        );
        let result = executor.execute(&task.task, &[]).await;

        let thoughts: Vec<String> = result
            .steps
            .iter()
            .filter(|s| s.kind == ReActStepKind::Thought)
            .map(|s| s.content.clone())
            .collect();
        let reasoning_path: Vec<String> = result
            .steps
            .iter()
            .map(|s| format!("{:?}: {}", s.kind, s.content))
            .collect();

        ReasoningResult {
            thoughts,
            final_answer: result.final_answer.unwrap_or_default(),
            reasoning_path,
            execution_time: result.elapsed,
            ok: result.ok,
            error: result.error,
        }
    }
}
