//! Errors raised when constructing model types.

use thiserror::Error;

/// A model invariant was violated during construction.
///
/// These are programmer/payload errors, never retried: the caller
/// supplied data that cannot form a well-formed value (for example a
/// task that requires an NPC response without naming the NPC).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum InvariantError {
    /// A task requiring an NPC response must carry a target NPC id.
    #[error("task requires an NPC response but has no target NPC")]
    MissingTargetNpc,

    /// A resolved entity mention must carry the matched entity id.
    #[error("resolved mention for '{0}' is missing its entity id")]
    MissingEntityId(String),

    /// A field failed a domain constraint.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
