//! Scheduler error type.

use loreweaver_provider::ProviderError;
use thiserror::Error;

/// Errors from scheduling or executing a request.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No adapter/model pair can serve the request (all deprecated,
    /// image-incapable, or the pinned model is unknown).
    #[error("no suitable adapter or model found for the request")]
    NoCandidates,

    /// The chosen provider failed every retry and no fallback succeeded.
    #[error("provider {provider} failed: {source}")]
    Exhausted {
        /// The last provider tried.
        provider: String,
        /// The final underlying error.
        source: ProviderError,
    },
}
