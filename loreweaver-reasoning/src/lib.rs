#![deny(missing_docs)]
//! # loreweaver-reasoning — reasoning engines and the ReAct executor
//!
//! A [`ReasoningEngine`] turns a task into a
//! [`ReasoningResult`](engine::ReasoningResult): the ordered thoughts,
//! the path taken, and a final answer. Strategies are registered in
//! the [`EngineFactory`] under a closed name set — chain-, tree-,
//! graph-, algorithm-, and skeleton-of-thought, plus ReAct — and
//! instantiated per agent per turn.
//!
//! The ReAct executor drives the Thought → Action → Observation loop
//! over a [`loreweaver_tool::ToolManager`], with a deterministic
//! transcript grammar: parsing never executes code, and malformed
//! action input degrades to a `raw_input` wrapper rather than a
//! failure.

mod basic;
mod chain;
mod engine;
mod factory;
pub mod react;
mod skeleton;
mod tree;

pub use engine::{EngineConfig, EngineHost, ReasoningEngine, ReasoningResult, TaskContext};
pub use factory::{EngineFactory, FactoryError, ReasoningMode};
pub use react::{ReActConfig, ReActExecutor, ReActResult, ReActStep, ReActStepKind};
