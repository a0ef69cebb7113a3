#![deny(missing_docs)]
//! # loreweaver-agent — the agent core and local orchestrator
//!
//! An [`Agent`] owns an id, capabilities, and a status machine
//! (`Idle → Processing → Idle`, `Idle → Shutdown` terminal). Given a
//! task it picks an execution strategy from its capabilities and
//! wired collaborators — reasoning engine, ReAct loop, or a plain
//! scheduler chat — never from the task's contents.
//!
//! The message loop polls the bus: each REQUEST is handled on its own
//! spawned task and answered with a RESPONSE on the original
//! correlation id; handler failures go back to the sender as ERROR
//! messages and never kill the loop.

mod agent;
mod orchestrator;

pub use agent::{Agent, AgentCapabilities, AgentConfig, AgentError, AgentStatus, ExecutionRecord};
pub use orchestrator::{Orchestrator, OrchestratorError, WorkflowStep};
