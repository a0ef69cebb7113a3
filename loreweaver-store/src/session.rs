//! Session-persistence contracts: sessions, snapshots, rollback logs.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loreweaver_types::{
    NpcId, RollbackLog, SessionId, SessionSnapshot, SessionState, SnapshotId, StyleConfig,
};

/// One field-level change to a stored session.
///
/// An enumerated patch type instead of a free-form map: the set of
/// mutable fields is closed, so a typo cannot silently create a new
/// field and every arm is visible to the compiler.
#[derive(Debug, Clone)]
pub enum SessionPatch {
    /// Rename the session.
    Name(String),
    /// Replace the description.
    Description(String),
    /// Move the party to a scene (or clear it).
    CurrentScene(Option<String>),
    /// Replace the style configuration.
    Style(StyleConfig),
    /// Set the in-game clock (both `current_time` and the embedded
    /// `time_manager_state.current_time`).
    CurrentTime(DateTime<Utc>),
    /// Replace the active NPC set.
    ActiveNpcs(Vec<NpcId>),
    /// Replace the player character list.
    PlayerCharacters(Vec<String>),
}

impl SessionPatch {
    /// Apply this patch to a state, refreshing `updated_at`.
    pub fn apply(self, state: &mut SessionState) {
        match self {
            SessionPatch::Name(name) => state.name = name,
            SessionPatch::Description(description) => state.description = description,
            SessionPatch::CurrentScene(scene) => state.current_scene_id = scene,
            SessionPatch::Style(style) => state.style = style,
            SessionPatch::CurrentTime(time) => {
                state.current_time = time;
                state.time_manager_state.current_time = time;
            }
            SessionPatch::ActiveNpcs(npcs) => state.active_npcs = npcs,
            SessionPatch::PlayerCharacters(characters) => state.player_characters = characters,
        }
        state.updated_at = Utc::now();
    }
}

/// Listing filter for sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    /// Restrict to one DM.
    pub dm_id: Option<String>,
    /// Restrict to one campaign.
    pub campaign_id: Option<String>,
}

/// Persistent session storage.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert or replace a session.
    async fn save(&self, state: &SessionState) -> Result<(), StoreError>;

    /// Fetch a session.
    async fn get(&self, id: &SessionId) -> Result<Option<SessionState>, StoreError>;

    /// Apply patches to a stored session.
    async fn update(&self, id: &SessionId, patches: Vec<SessionPatch>) -> Result<(), StoreError>;

    /// Delete a session. Returns whether it existed.
    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError>;

    /// List sessions matching a filter, newest first.
    async fn list(
        &self,
        filter: &SessionFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SessionState>, StoreError>;

    /// Whether a session exists.
    async fn exists(&self, id: &SessionId) -> Result<bool, StoreError>;
}

/// Persistent snapshot storage.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Insert or replace a snapshot.
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;

    /// Fetch a snapshot.
    async fn get(&self, id: &SnapshotId) -> Result<Option<SessionSnapshot>, StoreError>;

    /// Snapshots of one session, newest first.
    async fn list_by_session(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<SessionSnapshot>, StoreError>;

    /// Delete a snapshot. Returns whether it existed.
    async fn delete(&self, id: &SnapshotId) -> Result<bool, StoreError>;

    /// Whether a snapshot exists.
    async fn exists(&self, id: &SnapshotId) -> Result<bool, StoreError>;
}

/// Append-only rollback audit log.
#[async_trait]
pub trait RollbackRepository: Send + Sync {
    /// Append a log row.
    async fn save_log(&self, log: &RollbackLog) -> Result<(), StoreError>;

    /// Log rows for one session, newest first.
    async fn list_logs(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<RollbackLog>, StoreError>;

    /// The snapshot id of the most recent rollback point, if any.
    async fn latest_point(&self, session_id: &SessionId) -> Result<Option<SnapshotId>, StoreError>;
}
