//! The engine factory: a closed name → constructor registry.

use crate::basic::{AlgorithmOfThoughtsEngine, GraphOfThoughtEngine};
use crate::chain::ChainOfThoughtEngine;
use crate::engine::{EngineConfig, ReasoningEngine};
use crate::react::ReactEngine;
use crate::skeleton::SkeletonOfThoughtEngine;
use crate::tree::TreeOfThoughtEngine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The closed set of reasoning strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningMode {
    /// Linear chain of thought.
    ChainOfThought,
    /// Breadth-first tree of thought.
    TreeOfThought,
    /// Dependency-graph decomposition.
    GraphOfThought,
    /// Procedure-first reasoning.
    AlgorithmOfThoughts,
    /// Outline-fill-synthesise.
    SkeletonOfThought,
    /// Thought/Action/Observation over tools.
    React,
}

impl ReasoningMode {
    /// The registry key for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningMode::ChainOfThought => "chain_of_thought",
            ReasoningMode::TreeOfThought => "tree_of_thought",
            ReasoningMode::GraphOfThought => "graph_of_thought",
            ReasoningMode::AlgorithmOfThoughts => "algorithm_of_thoughts",
            ReasoningMode::SkeletonOfThought => "skeleton_of_thought",
            ReasoningMode::React => "react",
        }
    }
}

/// Factory errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FactoryError {
    /// No constructor is registered under the requested name.
    #[error("unknown reasoning mode: {0}")]
    UnknownMode(String),
}

type Constructor = Box<dyn Fn() -> Box<dyn ReasoningEngine> + Send + Sync>;

/// Maps strategy names to engine constructors.
///
/// Construction is by explicit registration only — there is no
/// import-by-name. [`EngineFactory::new`] seeds the six standard
/// modes; deployments may register additional strategies under new
/// names.
pub struct EngineFactory {
    constructors: HashMap<&'static str, Constructor>,
}

impl EngineFactory {
    /// A factory with the six standard modes registered.
    pub fn new() -> Self {
        let mut factory = Self {
            constructors: HashMap::new(),
        };
        factory.register("chain_of_thought", || {
            Box::new(ChainOfThoughtEngine::default())
        });
        factory.register("tree_of_thought", || Box::new(TreeOfThoughtEngine::default()));
        factory.register("graph_of_thought", || {
            Box::new(GraphOfThoughtEngine::default())
        });
        factory.register("algorithm_of_thoughts", || {
            Box::new(AlgorithmOfThoughtsEngine::default())
        });
        factory.register("skeleton_of_thought", || {
            Box::new(SkeletonOfThoughtEngine::default())
        });
        factory.register("react", || Box::new(ReactEngine::default()));
        factory
    }

    /// Register a constructor under a static name.
    pub fn register<F>(&mut self, name: &'static str, constructor: F)
    where
        F: Fn() -> Box<dyn ReasoningEngine> + Send + Sync + 'static,
    {
        self.constructors.insert(name, Box::new(constructor));
    }

    /// Instantiate and configure an engine for a mode.
    pub fn create(
        &self,
        mode: ReasoningMode,
        config: EngineConfig,
    ) -> Result<Box<dyn ReasoningEngine>, FactoryError> {
        self.create_named(mode.as_str(), config)
    }

    /// Instantiate by registry name (for custom registrations).
    pub fn create_named(
        &self,
        name: &str,
        config: EngineConfig,
    ) -> Result<Box<dyn ReasoningEngine>, FactoryError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| FactoryError::UnknownMode(name.to_string()))?;
        let mut engine = constructor();
        engine.set_config(config);
        tracing::debug!(engine = name, "reasoning engine created");
        Ok(engine)
    }

    /// Registered strategy names, sorted.
    pub fn available(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.constructors.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for EngineFactory {
    fn default() -> Self {
        Self::new()
    }
}
