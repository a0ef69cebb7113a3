//! Typed ID wrappers for sessions, agents, NPCs, players, and tasks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers prevent mixing up session IDs, NPC IDs, etc.
/// These are strings underneath — no format requirement. Generated
/// IDs use UUID v4 via [`fresh`](SessionId::fresh), but callers may
/// supply any stable string.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a typed ID from anything that converts to String.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random (UUID v4) ID.
            pub fn fresh() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(SessionId, "Unique identifier for a game session.");
typed_id!(AgentId, "Unique identifier for an agent.");
typed_id!(NpcId, "Unique identifier for a non-player character.");
typed_id!(PlayerId, "Unique identifier for a player.");
typed_id!(TaskId, "Unique identifier for a dispatched task.");
typed_id!(SnapshotId, "Unique identifier for a session snapshot.");
typed_id!(RuleId, "Unique identifier for an event rule.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = SessionId::new("s-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"s-42\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn fresh_ids_are_distinct() {
        assert_ne!(TaskId::fresh(), TaskId::fresh());
    }
}
