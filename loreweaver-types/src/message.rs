//! Inter-agent messages carried by the message bus.

use crate::id::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Receiver id that addresses every registered agent except the sender.
pub const BROADCAST_RECEIVER: &str = "*";

/// Kind of an inter-agent message.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// A task for the receiver; the receiver replies with a Response.
    Request,
    /// Reply to a Request, carrying the same correlation id.
    Response,
    /// Fire-and-forget information.
    Notification,
    /// An error produced while handling an earlier message.
    Error,
}

/// A message between two agents (or a broadcast).
///
/// `timestamp` and `correlation_id` may be left empty by the sender;
/// the bus fills them on send. `content` is opaque JSON — the bus
/// routes, it does not interpret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// The sending agent.
    pub sender_id: AgentId,
    /// The receiving agent, or [`BROADCAST_RECEIVER`].
    pub receiver_id: AgentId,
    /// Message kind.
    pub message_type: MessageType,
    /// Opaque payload.
    pub content: serde_json::Value,
    /// Send time; filled by the bus when absent.
    pub timestamp: Option<DateTime<Utc>>,
    /// Correlates a Response to its Request; filled by the bus when absent.
    pub correlation_id: Option<String>,
    /// Opaque routing/tracing metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AgentMessage {
    /// Create a message with the required fields; bus-managed fields
    /// are left empty.
    pub fn new(
        sender_id: AgentId,
        receiver_id: AgentId,
        message_type: MessageType,
        content: serde_json::Value,
    ) -> Self {
        Self {
            sender_id,
            receiver_id,
            message_type,
            content,
            timestamp: None,
            correlation_id: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a broadcast message addressed to every other agent.
    pub fn broadcast(
        sender_id: AgentId,
        message_type: MessageType,
        content: serde_json::Value,
    ) -> Self {
        Self::new(
            sender_id,
            AgentId::new(BROADCAST_RECEIVER),
            message_type,
            content,
        )
    }

    /// Whether this message is addressed to every agent.
    pub fn is_broadcast(&self) -> bool {
        self.receiver_id.as_str() == BROADCAST_RECEIVER
    }
}
