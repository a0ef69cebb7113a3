//! Skeleton-of-thought: outline first, fill, then synthesise.

use crate::engine::{EngineConfig, EngineHost, ReasoningEngine, ReasoningResult, TaskContext};
use async_trait::async_trait;
use loreweaver_tool::ToolManager;
use std::sync::Arc;
use std::time::Instant;

/// Outline → detail → synthesis reasoning.
#[derive(Debug, Default)]
pub struct SkeletonOfThoughtEngine {
    #[allow(dead_code)]
    config: EngineConfig,
}

#[async_trait]
impl ReasoningEngine for SkeletonOfThoughtEngine {
    fn name(&self) -> &'static str {
        "skeleton_of_thought"
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
        let started = Instant::now();
        let mut thoughts = Vec::new();

        let outline = match host
            .ask(format!(
                "Task: {}\n\nWrite a short numbered outline (3-5 points) of \
                 how to solve it. Outline only, no detail.",
                task.task
            ))
            .await
        {
            Ok(text) => text,
            Err(err) => return ReasoningResult::failure(thoughts, started.elapsed(), err),
        };
        thoughts.push(format!("outline: {outline}"));

        let details = match host
            .ask(format!(
                "Task: {}\n\nOutline:\n{outline}\n\nExpand each outline point \
                 with the key detail needed to act on it.",
                task.task
            ))
            .await
        {
            Ok(text) => text,
            Err(err) => return ReasoningResult::failure(thoughts, started.elapsed(), err),
        };
        thoughts.push(format!("details: {details}"));

        let final_answer = match host
            .ask(format!(
                "Task: {}\n\nOutline:\n{outline}\n\nDetails:\n{details}\n\n\
                 Synthesise a single final answer.",
                task.task
            ))
            .await
        {
            Ok(text) => text,
            Err(err) => return ReasoningResult::failure(thoughts, started.elapsed(), err),
        };

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
