//! Tree-of-thought: breadth-first expansion with confidence pruning.

use crate::engine::{EngineConfig, EngineHost, ReasoningEngine, ReasoningResult, TaskContext};
use async_trait::async_trait;
use loreweaver_tool::ToolManager;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

/// Confidence at which exploration stops early.
const EARLY_STOP_CONFIDENCE: f64 = 0.9;

/// Matches an optional trailing "(confidence: 0.8)" annotation.
static CONFIDENCE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(confidence:\s*([0-9.]+)\)\s*$").expect("confidence regex")
});

/// One node of the thought tree. Children index into the arena.
#[derive(Debug, Clone)]
struct ThoughtNode {
    content: String,
    confidence: f64,
    children: Vec<usize>,
}

/// Arena-backed tree so pruning never invalidates parent links.
struct ThoughtTree {
    nodes: Vec<ThoughtNode>,
}

impl ThoughtTree {
    fn with_root(content: String, confidence: f64) -> Self {
        Self {
            nodes: vec![ThoughtNode {
                content,
                confidence,
                children: Vec::new(),
            }],
        }
    }

    fn add_child(&mut self, parent: usize, content: String, confidence: f64) -> usize {
        let index = self.nodes.len();
        self.nodes.push(ThoughtNode {
            content,
            confidence,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        index
    }

    /// Walk from the root picking the max-confidence child at each
    /// level; returns the contents along the way.
    fn best_path(&self) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = 0usize;
        loop {
            path.push(self.nodes[current].content.clone());
            let Some(&best) = self.nodes[current].children.iter().max_by(|a, b| {
                self.nodes[**a]
                    .confidence
                    .partial_cmp(&self.nodes[**b].confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }) else {
                return path;
            };
            current = best;
        }
    }
}

/// Parse one branch line: strip list numbering, pull the confidence
/// annotation when present.
fn parse_branch(line: &str, ordinal: usize) -> Option<(String, f64)> {
    let trimmed = line
        .trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')' || c == '-')
        .trim();
    if trimmed.is_empty() {
        return None;
    }
    match CONFIDENCE_SUFFIX.captures(trimmed) {
        Some(caps) => {
            let confidence = caps[1].parse::<f64>().unwrap_or(0.5).clamp(0.0, 1.0);
            let content = CONFIDENCE_SUFFIX.replace(trimmed, "").trim().to_string();
            Some((content, confidence))
        }
        // No annotation: earlier alternatives are assumed stronger.
        None => Some((trimmed.to_string(), (0.7 - ordinal as f64 * 0.1).max(0.1))),
    }
}

/// Breadth-first branching exploration.
#[derive(Debug, Default)]
pub struct TreeOfThoughtEngine {
    config: EngineConfig,
}

impl TreeOfThoughtEngine {
    fn branch_prompt(&self, task: &str, parent: &str) -> String {
        format!(
            "Task: {task}\n\nCurrent line of thought: {parent}\n\nPropose {n} \
             alternative next thoughts, one per line, each ending with \
             '(confidence: X)' where X is between 0 and 1.",
            n = self.config.max_branches
        )
    }
}

#[async_trait]
impl ReasoningEngine for TreeOfThoughtEngine {
    fn name(&self) -> &'static str {
        "tree_of_thought"
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
        let mut tree = ThoughtTree::with_root(format!("Analyse the task: {}", task.task), 0.8);
        let mut frontier: Vec<usize> = vec![0];
        let mut thoughts: Vec<String> = vec![tree.nodes[0].content.clone()];

        'expansion: for _depth in 0..self.config.max_depth {
            let mut next_frontier: Vec<usize> = Vec::new();

            for &node in &frontier {
                let parent_content = tree.nodes[node].content.clone();
                let response = match host.ask(self.branch_prompt(&task.task, &parent_content)).await
                {
                    Ok(text) => text,
                    Err(err) => {
                        return ReasoningResult::failure(thoughts, started.elapsed(), err);
                    }
                };

                for (ordinal, line) in response
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .take(self.config.max_branches as usize)
                    .enumerate()
                {
                    if let Some((content, confidence)) = parse_branch(line, ordinal) {
                        thoughts.push(content.clone());
                        let child = tree.add_child(node, content, confidence);
                        next_frontier.push(child);
                    }
                }
            }

            // Prune below the confidence threshold, strongest first.
            next_frontier.sort_by(|a, b| {
                tree.nodes[*b]
                    .confidence
                    .partial_cmp(&tree.nodes[*a].confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            next_frontier.retain(|&n| tree.nodes[n].confidence >= self.config.confidence_threshold);

            if next_frontier.is_empty() {
                break 'expansion;
            }
            if tree.nodes[next_frontier[0]].confidence >= EARLY_STOP_CONFIDENCE {
                frontier = next_frontier;
                break 'expansion;
            }
            frontier = next_frontier;
        }

        let reasoning_path = tree.best_path();
        let final_answer = reasoning_path
            .last()
            .cloned()
            .unwrap_or_else(|| "no conclusion reached".to_string());

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
