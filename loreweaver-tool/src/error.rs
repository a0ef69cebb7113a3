//! Tool error type.

use thiserror::Error;

/// Errors from tool lookup, validation, or execution.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool is not registered.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The supplied arguments violate the tool's schema. The tool was
    /// NOT executed.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The tool ran and failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}
