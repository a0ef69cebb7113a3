//! Chain-of-thought: linear steps until a final keyword or the step
//! budget runs out.

use crate::engine::{EngineConfig, EngineHost, ReasoningEngine, ReasoningResult, TaskContext};
use async_trait::async_trait;
use loreweaver_tool::ToolManager;
use std::sync::Arc;
use std::time::Instant;

/// Linear step-by-step reasoning.
#[derive(Debug, Default)]
pub struct ChainOfThoughtEngine {
    config: EngineConfig,
}

impl ChainOfThoughtEngine {
    fn is_final(&self, thought: &str) -> bool {
        let lowered = thought.to_lowercase();
        self.config
            .final_keywords
            .iter()
            .any(|k| lowered.contains(&k.to_lowercase()))
    }

    fn step_prompt(&self, task: &str, thoughts: &[String]) -> String {
        let mut prompt = format!(
            "Task: {task}\n\nReason step by step. Produce exactly one next \
             thought. When the task is solved, start the thought with \
             'Final answer:'.\n"
        );
        if !thoughts.is_empty() {
            prompt.push_str("\nThoughts so far:\n");
            for (i, thought) in thoughts.iter().enumerate() {
                prompt.push_str(&format!("{}. {thought}\n", i + 1));
            }
        }
        prompt.push_str("\nNext thought:");
        prompt
    }
}

#[async_trait]
impl ReasoningEngine for ChainOfThoughtEngine {
    fn name(&self) -> &'static str {
        "chain_of_thought"
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
        let mut thoughts: Vec<String> = Vec::new();

        for step in 0..self.config.max_steps {
            let prompt = self.step_prompt(&task.task, &thoughts);
            let thought =
                match tokio::time::timeout(self.config.step_timeout, host.ask(prompt)).await {
                    Ok(Ok(thought)) => thought.trim().to_string(),
                    Ok(Err(err)) => {
                        return ReasoningResult::failure(thoughts, started.elapsed(), err);
                    }
                    Err(_) => {
                        tracing::warn!(step, "chain step timed out, stopping");
                        break;
                    }
                };
            let is_final = self.is_final(&thought);
            thoughts.push(thought);
            if is_final {
                break;
            }
        }

        let final_answer = thoughts
            .last()
            .cloned()
            .unwrap_or_else(|| "no conclusion reached".to_string());
        let reasoning_path: Vec<String> = thoughts
            .iter()
            .enumerate()
            .map(|(i, t)| format!("step {}: {t}", i + 1))
            .collect();

        ReasoningResult {
            thoughts,
            final_answer,
            reasoning_path,
            execution_time: started.elapsed(),
            ok: true,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_keyword_detection_is_case_insensitive() {
        let engine = ChainOfThoughtEngine::default();
        assert!(engine.is_final("FINAL ANSWER: the chest is trapped"));
        assert!(engine.is_final("In conclusion, flee."));
        assert!(!engine.is_final("I should look closer."));
    }

    #[test]
    fn step_prompt_numbers_prior_thoughts() {
        let engine = ChainOfThoughtEngine::default();
        let prompt = engine.step_prompt("open the door", &["check for traps".into()]);
        assert!(prompt.contains("1. check for traps"));
        assert!(prompt.ends_with("Next thought:"));
    }
}
