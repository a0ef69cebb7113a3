#![deny(missing_docs)]
//! # loreweaver-tool — tools, manager, registry
//!
//! A [`Tool`] declares a typed [`ToolSchema`] and executes JSON
//! arguments. The [`ToolManager`] dispatches calls with validation —
//! a call with missing required parameters or an out-of-enum value is
//! rejected *before* the tool runs — and records per-tool statistics.
//! The [`ToolRegistry`] maps a closed set of tool names to
//! constructors (explicit registration, no import-by-name), and the
//! integration layer adds concurrent batch calls and output-to-input
//! chaining.

pub mod builtin;
mod error;
mod integration;
mod manager;
mod registry;
mod schema;

pub use error::ToolError;
pub use integration::{batch_call, chain_tools, ToolCall, PREVIOUS_RESULT_KEY};
pub use manager::{ToolInfo, ToolManager, ToolResult, ToolStats};
pub use registry::ToolRegistry;
pub use schema::{ParamKind, Tool, ToolParameter, ToolSchema};
