//! In-process orchestrator: agent registry, coordination, and simple
//! sequential workflows.

use crate::agent::{Agent, AgentError};
use loreweaver_types::AgentId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Orchestration errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The named agent is not registered.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// A workflow was submitted without steps.
    #[error("workflow has no steps")]
    EmptyWorkflow,

    /// An agent failed while executing.
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),
}

/// One step of a sequential workflow.
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    /// The agent to run the step.
    pub agent: AgentId,
    /// The task for the step.
    pub task: String,
}

/// Owns agents and routes work to them.
#[derive(Default)]
pub struct Orchestrator {
    agents: RwLock<HashMap<String, Arc<Agent>>>,
}

impl Orchestrator {
    /// An orchestrator with no agents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent and start its message loop.
    pub fn register_agent(&self, agent: Arc<Agent>) {
        agent.start();
        self.agents
            .write()
            .expect("agent table poisoned")
            .insert(agent.id().as_str().to_string(), agent);
    }

    /// Shut an agent down and remove it.
    pub fn unregister_agent(&self, agent_id: &AgentId) {
        if let Some(agent) = self
            .agents
            .write()
            .expect("agent table poisoned")
            .remove(agent_id.as_str())
        {
            agent.shutdown();
        }
    }

    /// Look up a registered agent.
    pub fn get_agent(&self, agent_id: &AgentId) -> Option<Arc<Agent>> {
        self.agents
            .read()
            .expect("agent table poisoned")
            .get(agent_id.as_str())
            .cloned()
    }

    /// Registered agent ids, sorted.
    pub fn list_agents(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self
            .agents
            .read()
            .expect("agent table poisoned")
            .values()
            .map(|a| a.id().clone())
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Coordinate a task across agents: the first id executes, the
    /// rest are listed as collaborators for tracing.
    pub async fn coordinate(
        &self,
        task: &str,
        agent_ids: &[AgentId],
    ) -> Result<String, OrchestratorError> {
        let primary = agent_ids
            .first()
            .ok_or(OrchestratorError::EmptyWorkflow)?;
        for id in agent_ids {
            if self.get_agent(id).is_none() {
                return Err(OrchestratorError::AgentNotFound(id.clone()));
            }
        }
        tracing::debug!(primary = %primary, collaborators = agent_ids.len() - 1, "coordinating task");
        let agent = self
            .get_agent(primary)
            .ok_or_else(|| OrchestratorError::AgentNotFound(primary.clone()))?;
        Ok(agent.execute_task(task).await?)
    }

    /// Run workflow steps in order, collecting each step's result.
    /// The workflow stops at the first failing step.
    pub async fn execute_workflow(
        &self,
        steps: &[WorkflowStep],
    ) -> Result<Vec<String>, OrchestratorError> {
        if steps.is_empty() {
            return Err(OrchestratorError::EmptyWorkflow);
        }
        let mut results = Vec::with_capacity(steps.len());
        for step in steps {
            let agent = self
                .get_agent(&step.agent)
                .ok_or_else(|| OrchestratorError::AgentNotFound(step.agent.clone()))?;
            results.push(agent.execute_task(&step.task).await?);
        }
        Ok(results)
    }

    /// Shut every agent down.
    pub fn shutdown_all(&self) {
        let agents: Vec<Arc<Agent>> = self
            .agents
            .write()
            .expect("agent table poisoned")
            .drain()
            .map(|(_, agent)| agent)
            .collect();
        for agent in agents {
            agent.shutdown();
        }
    }
}
