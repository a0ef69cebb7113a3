//! The agent core.

use loreweaver_bus::MessageBus;
use loreweaver_provider::ChatMessage;
use loreweaver_reasoning::{
    EngineConfig, EngineFactory, EngineHost, ReActConfig, ReActExecutor, ReasoningMode,
    TaskContext,
};
use loreweaver_scheduler::{ModelScheduler, RequestContext};
use loreweaver_tool::ToolManager;
use loreweaver_types::{AgentId, AgentMessage, MessageType};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

/// What an agent is allowed to do; drives strategy selection.
#[derive(Debug, Clone, Copy)]
pub struct AgentCapabilities {
    /// May invoke tools.
    pub can_use_tools: bool,
    /// May run a reasoning engine.
    pub can_reason: bool,
    /// May fall back to plain chat.
    pub can_chat: bool,
}

impl Default for AgentCapabilities {
    fn default() -> Self {
        Self {
            can_use_tools: true,
            can_reason: true,
            can_chat: true,
        }
    }
}

/// Agent lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// Waiting for work.
    Idle,
    /// Executing a task.
    Processing,
    /// Terminal: the agent will not accept further work.
    Shutdown,
}

/// Static configuration for one agent.
#[derive(Clone)]
pub struct AgentConfig {
    /// The agent's id.
    pub agent_id: AgentId,
    /// Base system prompt.
    pub system_prompt: String,
    /// Reasoning strategy, when the agent reasons.
    pub reasoning_mode: Option<ReasoningMode>,
    /// Engine tuning.
    pub engine_config: EngineConfig,
    /// ReAct tuning (used when reasoning is unavailable but tools are).
    pub react_config: ReActConfig,
    /// Completion budget per model call.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Capability switches.
    pub capabilities: AgentCapabilities,
}

impl AgentConfig {
    /// A chat-capable agent with defaults.
    pub fn new(agent_id: AgentId, system_prompt: impl Into<String>) -> Self {
        Self {
            agent_id,
            system_prompt: system_prompt.into(),
            reasoning_mode: None,
            engine_config: EngineConfig::default(),
            react_config: ReActConfig::default(),
            max_tokens: Some(2000),
            temperature: Some(0.7),
            capabilities: AgentCapabilities::default(),
        }
    }
}

/// One completed task, kept in the agent's history ring.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    /// The task text.
    pub task: String,
    /// Whether it succeeded.
    pub ok: bool,
    /// The result or error text.
    pub outcome: String,
    /// Time spent.
    pub elapsed: Duration,
}

/// Agent errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AgentError {
    /// The reasoning engine failed.
    #[error("reasoning failed: {0}")]
    Reasoning(String),

    /// The ReAct loop failed.
    #[error("react failed: {0}")]
    React(String),

    /// The scheduler failed.
    #[error("model call failed: {0}")]
    Scheduler(#[from] loreweaver_scheduler::SchedulerError),

    /// No capability/collaborator combination can execute the task.
    #[error("agent {0} has no execution strategy available")]
    NoStrategy(AgentId),

    /// The agent has been shut down.
    #[error("agent {0} is shut down")]
    ShutDown(AgentId),
}

const HISTORY_LIMIT: usize = 100;

/// An agent: id + capabilities + collaborators + status machine.
pub struct Agent {
    config: AgentConfig,
    scheduler: Arc<ModelScheduler>,
    tools: Option<Arc<ToolManager>>,
    factory: Option<Arc<EngineFactory>>,
    bus: Option<Arc<MessageBus>>,
    status: Mutex<AgentStatus>,
    history: Mutex<Vec<ExecutionRecord>>,
    running: AtomicBool,
    stop_signal: Notify,
}

impl Agent {
    /// Create an agent. Collaborators are optional; what is wired
    /// determines the strategies available.
    pub fn new(
        config: AgentConfig,
        scheduler: Arc<ModelScheduler>,
        tools: Option<Arc<ToolManager>>,
        factory: Option<Arc<EngineFactory>>,
        bus: Option<Arc<MessageBus>>,
    ) -> Self {
        Self {
            config,
            scheduler,
            tools,
            factory,
            bus,
            status: Mutex::new(AgentStatus::Idle),
            history: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            stop_signal: Notify::new(),
        }
    }

    /// The agent's id.
    pub fn id(&self) -> &AgentId {
        &self.config.agent_id
    }

    /// Current lifecycle status.
    pub fn status(&self) -> AgentStatus {
        *self.status.lock().expect("status poisoned")
    }

    /// The most recent execution records, oldest first.
    pub fn execution_history(&self, limit: usize) -> Vec<ExecutionRecord> {
        let history = self.history.lock().expect("history poisoned");
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }

    /// Execute one task, choosing the strategy from capabilities and
    /// wired collaborators: reasoning engine first, then ReAct, then
    /// plain chat.
    pub async fn execute_task(&self, task: &str) -> Result<String, AgentError> {
        if self.status() == AgentStatus::Shutdown {
            return Err(AgentError::ShutDown(self.config.agent_id.clone()));
        }
        self.set_status(AgentStatus::Processing);
        let started = std::time::Instant::now();

        let outcome = self.run_strategy(task).await;

        self.set_status(AgentStatus::Idle);
        let record = ExecutionRecord {
            task: task.to_string(),
            ok: outcome.is_ok(),
            outcome: match &outcome {
                Ok(answer) => answer.clone(),
                Err(err) => err.to_string(),
            },
            elapsed: started.elapsed(),
        };
        let mut history = self.history.lock().expect("history poisoned");
        history.push(record);
        let overflow = history.len().saturating_sub(HISTORY_LIMIT);
        if overflow > 0 {
            history.drain(..overflow);
        }
        drop(history);

        outcome
    }

    async fn run_strategy(&self, task: &str) -> Result<String, AgentError> {
        let caps = self.config.capabilities;

        if caps.can_reason {
            if let (Some(factory), Some(tools), Some(mode)) =
                (&self.factory, &self.tools, self.config.reasoning_mode)
            {
                let engine = factory
                    .create(mode, self.config.engine_config.clone())
                    .map_err(|e| AgentError::Reasoning(e.to_string()))?;
                let result = engine
                    .process(
                        &self.engine_host(),
                        &TaskContext::new(task),
                        Arc::clone(tools),
                    )
                    .await;
                return if result.ok {
                    Ok(result.final_answer)
                } else {
                    Err(AgentError::Reasoning(
                        result.error.unwrap_or_else(|| "unknown".into()),
                    ))
                };
            }
        }

        if caps.can_use_tools {
            if let Some(tools) = &self.tools {
                let executor = ReActExecutor::new(
                    Arc::clone(&self.scheduler),
                    Arc::clone(tools),
                    self.config.react_config.clone(),
                );
                let result = executor.execute(task, &[]).await;
                return if result.ok {
                    Ok(result.final_answer.unwrap_or_default())
                } else {
                    Err(AgentError::React(
                        result.error.unwrap_or_else(|| "unknown".into()),
                    ))
                };
            }
        }

        if caps.can_chat {
            let mut context = RequestContext::new(vec![ChatMessage::user(task)]);
            context.system = Some(self.config.system_prompt.clone());
            context.max_tokens = self.config.max_tokens;
            context.temperature = self.config.temperature;
            let response = self.scheduler.chat(&context).await?;
            return response
                .first_text()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| AgentError::Reasoning("empty model response".into()));
        }

        Err(AgentError::NoStrategy(self.config.agent_id.clone()))
    }

    fn engine_host(&self) -> EngineHost {
        EngineHost {
            agent_id: self.config.agent_id.clone(),
            scheduler: Arc::clone(&self.scheduler),
            system_prompt: self.config.system_prompt.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    fn set_status(&self, status: AgentStatus) {
        *self.status.lock().expect("status poisoned") = status;
    }

    /// Register on the bus and start the message loop. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let Some(bus) = &self.bus else {
            return;
        };
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        bus.register(&self.config.agent_id);

        let agent = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let Some(bus) = agent.bus.clone() else { break };
                tokio::select! {
                    received = bus.receive(&agent.config.agent_id, Duration::from_secs(1)) => {
                        match received {
                            Ok(Some(message)) => {
                                // Handle on a separate task so a slow
                                // request does not block receipt.
                                let handler = Arc::clone(&agent);
                                tokio::spawn(async move {
                                    handler.handle_message(message).await;
                                });
                            }
                            Ok(None) => {}
                            Err(err) => {
                                tracing::error!(agent = %agent.config.agent_id, error = %err, "receive failed, stopping loop");
                                break;
                            }
                        }
                    }
                    _ = agent.stop_signal.notified() => break,
                }
                if !agent.running.load(Ordering::SeqCst) {
                    break;
                }
            }
            tracing::debug!(agent = %agent.config.agent_id, "message loop stopped");
        });
    }

    async fn handle_message(self: Arc<Self>, message: AgentMessage) {
        let Some(bus) = &self.bus else { return };
        match message.message_type {
            MessageType::Request => {
                let task = match &message.content {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let reply = match self.execute_task(&task).await {
                    Ok(answer) => AgentMessage {
                        sender_id: self.config.agent_id.clone(),
                        receiver_id: message.sender_id.clone(),
                        message_type: MessageType::Response,
                        content: json!(answer),
                        timestamp: None,
                        correlation_id: message.correlation_id.clone(),
                        metadata: serde_json::Value::Null,
                    },
                    Err(err) => {
                        tracing::error!(agent = %self.config.agent_id, error = %err, "request handling failed");
                        AgentMessage {
                            sender_id: self.config.agent_id.clone(),
                            receiver_id: message.sender_id.clone(),
                            message_type: MessageType::Error,
                            content: json!({
                                "component": "agent",
                                "agent_id": self.config.agent_id.as_str(),
                                "message": err.to_string(),
                            }),
                            timestamp: None,
                            correlation_id: message.correlation_id.clone(),
                            metadata: serde_json::Value::Null,
                        }
                    }
                };
                if let Err(err) = bus.send(reply).await {
                    tracing::warn!(agent = %self.config.agent_id, error = %err, "reply undeliverable");
                }
            }
            MessageType::Notification => {
                tracing::info!(
                    agent = %self.config.agent_id,
                    content = %message.content,
                    "notification received"
                );
            }
            MessageType::Response | MessageType::Error => {
                tracing::debug!(
                    agent = %self.config.agent_id,
                    kind = ?message.message_type,
                    "unsolicited message ignored"
                );
            }
            _ => {
                tracing::debug!(
                    agent = %self.config.agent_id,
                    kind = ?message.message_type,
                    "unknown message type ignored"
                );
            }
        }
    }

    /// Stop the message loop, unregister from the bus, and move to
    /// the terminal Shutdown state. In-flight tasks run to completion.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.stop_signal.notify_waiters();
        }
        if let Some(bus) = &self.bus {
            bus.unregister(&self.config.agent_id);
        }
        self.set_status(AgentStatus::Shutdown);
        tracing::info!(agent = %self.config.agent_id, "agent shut down");
    }
}
