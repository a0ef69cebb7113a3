//! Game-record storage: the append-only trail of what happened.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loreweaver_types::SessionId;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// What kind of event a record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameRecordKind {
    /// A raw player input.
    PlayerInput,
    /// A dispatched task.
    Task,
    /// An NPC's observable response.
    NpcResponse,
    /// A triggered game event.
    Event,
    /// A clock advancement.
    TimeAdvance,
}

/// One row of the game trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// The session the record belongs to.
    pub session_id: SessionId,
    /// Record kind.
    pub kind: GameRecordKind,
    /// When the record was written.
    pub recorded_at: DateTime<Utc>,
    /// The recorded payload.
    pub payload: serde_json::Value,
}

impl GameRecord {
    /// A record stamped now.
    pub fn new(session_id: SessionId, kind: GameRecordKind, payload: serde_json::Value) -> Self {
        Self {
            session_id,
            kind,
            recorded_at: Utc::now(),
            payload,
        }
    }
}

/// Append-only game-record storage.
#[async_trait]
pub trait GameRecordRepository: Send + Sync {
    /// Append one record.
    async fn append(&self, record: GameRecord) -> Result<(), StoreError>;

    /// Records for one session, oldest first, optionally by kind.
    async fn list(
        &self,
        session_id: &SessionId,
        kind: Option<GameRecordKind>,
        limit: usize,
    ) -> Result<Vec<GameRecord>, StoreError>;
}

/// In-memory record store.
#[derive(Default)]
pub struct MemoryGameRecordStore {
    records: RwLock<Vec<GameRecord>>,
}

impl MemoryGameRecordStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameRecordRepository for MemoryGameRecordStore {
    async fn append(&self, record: GameRecord) -> Result<(), StoreError> {
        self.records.write().expect("records poisoned").push(record);
        Ok(())
    }

    async fn list(
        &self,
        session_id: &SessionId,
        kind: Option<GameRecordKind>,
        limit: usize,
    ) -> Result<Vec<GameRecord>, StoreError> {
        let records = self.records.read().expect("records poisoned");
        Ok(records
            .iter()
            .filter(|r| r.session_id == *session_id)
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .take(limit)
            .cloned()
            .collect())
    }
}
