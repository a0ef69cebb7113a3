//! Bus configuration and errors.

use std::time::Duration;
use thiserror::Error;

/// What to do when an agent's queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait until the queue has room.
    Block,
    /// Evict the oldest queued message to make room.
    #[default]
    DropOldest,
    /// Discard the incoming message.
    DropNew,
}

/// Bus tuning knobs.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Per-agent queue capacity.
    pub max_queue_size: usize,
    /// Messages older than this are swept by the cleanup loop.
    pub message_timeout: Duration,
    /// Whether sent/broadcast messages are kept in history.
    pub enable_history: bool,
    /// Whether history entries are redacted before storage.
    pub sanitize_history: bool,
    /// History ring-buffer capacity.
    pub history_capacity: usize,
    /// Default overflow policy for newly registered agents.
    pub default_overflow: OverflowPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            message_timeout: Duration::from_secs(300),
            enable_history: true,
            sanitize_history: true,
            history_capacity: 10_000,
            default_overflow: OverflowPolicy::DropOldest,
        }
    }
}

/// Bus errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BusError {
    /// The receiver is not registered.
    #[error("unknown receiver: {0}")]
    UnknownReceiver(String),

    /// The polling agent is not registered.
    #[error("agent not registered: {0}")]
    NotRegistered(String),
}
