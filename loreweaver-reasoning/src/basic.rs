//! Base-contract engines for the graph and algorithm modes.
//!
//! Both modes currently satisfy the engine contract with a single
//! structured reasoning pass; richer graph/algorithmic exploration can
//! replace [`BasicStrategy::process`] without changing the result
//! shape callers depend on.

use crate::engine::{EngineConfig, EngineHost, ReasoningEngine, ReasoningResult, TaskContext};
use async_trait::async_trait;
use loreweaver_tool::ToolManager;
use std::sync::Arc;
use std::time::Instant;

struct BasicStrategy;

impl BasicStrategy {
    async fn process(
        host: &EngineHost,
        task: &TaskContext,
        framing: &str,
    ) -> ReasoningResult {
        let started = Instant::now();
        let response = match host
            .ask(format!(
                "Task: {}\n\n{framing}\n\nEnd with a line starting 'Answer:'.",
                task.task
            ))
            .await
        {
            Ok(text) => text,
            Err(err) => return ReasoningResult::failure(Vec::new(), started.elapsed(), err),
        };

        let final_answer = response
            .lines()
            .rev()
            .find_map(|l| l.trim().strip_prefix("Answer:"))
            .map(|l| l.trim().to_string())
            .unwrap_or_else(|| response.trim().to_string());
        let thoughts: Vec<String> = response
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();

        ReasoningResult {
            reasoning_path: thoughts.clone(),
            thoughts,
            final_answer,
            execution_time: started.elapsed(),
            ok: true,
            error: None,
        }
    }
}

/// Reasoning over interdependent sub-problems.
#[derive(Debug, Default)]
pub struct GraphOfThoughtEngine {
    #[allow(dead_code)]
    config: EngineConfig,
}

#[async_trait]
impl ReasoningEngine for GraphOfThoughtEngine {
    fn name(&self) -> &'static str {
        "graph_of_thought"
    }

    fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    async fn process(
        &self,
        host: &EngineHost,
        task: &TaskContext,
        _tools: Arc<ToolManager>,
    ) -> ReasoningResult {
        BasicStrategy::process(
            host,
            task,
            "Decompose the task into sub-problems, note which depend on \
             which, and resolve them in dependency order.",
        )
        .await
    }
}

/// Deterministic, procedure-first reasoning.
#[derive(Debug, Default)]
pub struct AlgorithmOfThoughtsEngine {
    #[allow(dead_code)]
    config: EngineConfig,
}

#[async_trait]
impl ReasoningEngine for AlgorithmOfThoughtsEngine {
    fn name(&self) -> &'static str {
        "algorithm_of_thoughts"
    }

    fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    async fn process(
        &self,
        host: &EngineHost,
        task: &TaskContext,
        _tools: Arc<ToolManager>,
    ) -> ReasoningResult {
        BasicStrategy::process(
            host,
            task,
            "State an explicit procedure for solving the task, then execute \
             it step by step, showing each step's result.",
        )
        .await
    }
}
