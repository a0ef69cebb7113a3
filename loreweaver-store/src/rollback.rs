//! Rollback points and rollback execution.

use crate::error::StoreError;
use crate::session::{RollbackRepository, SessionRepository, SnapshotRepository};
use chrono::Utc;
use loreweaver_types::{
    RollbackAction, RollbackLog, SessionId, SessionSnapshot, SessionState, SnapshotId,
    SnapshotTrigger,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Creates rollback points and performs rollbacks.
///
/// A rollback point is a snapshot (trigger = BeforeRollback) plus a
/// log row; the pair is written under a per-session lock so two
/// concurrent operations on one session cannot interleave their
/// snapshot and log writes. Different sessions proceed in parallel.
pub struct RollbackManager {
    sessions: Arc<dyn SessionRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
    logs: Arc<dyn RollbackRepository>,
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RollbackManager {
    /// A manager over the three repositories.
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        snapshots: Arc<dyn SnapshotRepository>,
        logs: Arc<dyn RollbackRepository>,
    ) -> Self {
        Self {
            sessions,
            snapshots,
            logs,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, session_id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        Arc::clone(
            locks
                .entry(session_id.as_str().to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Create a rollback point for a session: snapshot + log row.
    /// Returns the new snapshot id.
    pub async fn create_point(
        &self,
        session_id: &SessionId,
        operator: &str,
        name: impl Into<String>,
    ) -> Result<SnapshotId, StoreError> {
        let lock = self.lock_for(session_id).await;
        let _guard = lock.lock().await;

        let mut state = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| StoreError::not_found("session", session_id.as_str()))?;
        state.seal();

        let snapshot = SessionSnapshot {
            snapshot_id: SnapshotId::fresh(),
            session_id: session_id.clone(),
            name: name.into(),
            description: None,
            created_at: Utc::now(),
            created_by: operator.to_string(),
            session_state: state.clone(),
            tags: Vec::new(),
            is_auto: true,
            trigger: SnapshotTrigger::BeforeRollback,
        };
        self.snapshots.save(&snapshot).await?;

        let log = RollbackLog {
            log_id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            snapshot_id: Some(snapshot.snapshot_id.clone()),
            timestamp: Utc::now(),
            action: RollbackAction::CreatePoint,
            operator: operator.to_string(),
            before_state: state_summary(&state),
            after_state: state_summary(&state),
            conflicts: Vec::new(),
            resolution: None,
        };
        self.logs.save_log(&log).await?;

        tracing::info!(session = %session_id, snapshot = %snapshot.snapshot_id, "rollback point created");
        Ok(snapshot.snapshot_id)
    }

    /// Restore a session to a snapshot, recording the before/after
    /// diff and any conflicts verbatim in the log.
    pub async fn rollback(
        &self,
        session_id: &SessionId,
        snapshot_id: &SnapshotId,
        operator: &str,
    ) -> Result<(), StoreError> {
        let lock = self.lock_for(session_id).await;
        let _guard = lock.lock().await;

        let snapshot = self
            .snapshots
            .get(snapshot_id)
            .await?
            .ok_or_else(|| StoreError::not_found("snapshot", snapshot_id.as_str()))?;
        if snapshot.session_id != *session_id {
            return Err(StoreError::Conflict(format!(
                "snapshot {snapshot_id} belongs to session {}, not {session_id}",
                snapshot.session_id
            )));
        }

        let before = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| StoreError::not_found("session", session_id.as_str()))?;

        let mut conflicts = Vec::new();
        if !snapshot.session_state.checksum_ok() {
            conflicts.push(json!({
                "field": "checksum",
                "detail": "snapshot state does not match its stored checksum",
            }));
        }

        let restored = snapshot.session_state.clone();
        self.sessions.save(&restored).await?;

        let log = RollbackLog {
            log_id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            snapshot_id: Some(snapshot_id.clone()),
            timestamp: Utc::now(),
            action: RollbackAction::Rollback,
            operator: operator.to_string(),
            before_state: state_summary(&before),
            after_state: state_summary(&restored),
            conflicts,
            resolution: None,
        };
        self.logs.save_log(&log).await?;

        tracing::info!(session = %session_id, snapshot = %snapshot_id, "session rolled back");
        Ok(())
    }

    /// The most recent rollback point for a session.
    pub async fn latest_point(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SnapshotId>, StoreError> {
        self.logs.latest_point(session_id).await
    }
}

/// The compact per-row state summary stored in the log.
fn state_summary(state: &SessionState) -> serde_json::Value {
    json!({
        "session_id": state.session_id.as_str(),
        "name": state.name,
        "current_time": state.current_time,
        "current_scene_id": state.current_scene_id,
        "active_npcs": state.active_npcs.len(),
        "updated_at": state.updated_at,
    })
}
