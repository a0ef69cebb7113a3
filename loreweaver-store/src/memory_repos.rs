//! In-memory repository implementations for development and tests.

use crate::error::StoreError;
use crate::session::{
    RollbackRepository, SessionFilter, SessionPatch, SessionRepository, SnapshotRepository,
};
use async_trait::async_trait;
use loreweaver_types::{RollbackAction, RollbackLog, SessionId, SessionSnapshot, SessionState, SnapshotId};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory [`SessionRepository`].
#[derive(Default)]
pub struct MemorySessionRepository {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl MemorySessionRepository {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn save(&self, state: &SessionState) -> Result<(), StoreError> {
        self.sessions
            .write()
            .expect("sessions poisoned")
            .insert(state.session_id.as_str().to_string(), state.clone());
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> Result<Option<SessionState>, StoreError> {
        Ok(self
            .sessions
            .read()
            .expect("sessions poisoned")
            .get(id.as_str())
            .cloned())
    }

    async fn update(&self, id: &SessionId, patches: Vec<SessionPatch>) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().expect("sessions poisoned");
        let state = sessions
            .get_mut(id.as_str())
            .ok_or_else(|| StoreError::not_found("session", id.as_str()))?;
        for patch in patches {
            patch.apply(state);
        }
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        Ok(self
            .sessions
            .write()
            .expect("sessions poisoned")
            .remove(id.as_str())
            .is_some())
    }

    async fn list(
        &self,
        filter: &SessionFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SessionState>, StoreError> {
        let sessions = self.sessions.read().expect("sessions poisoned");
        let mut matches: Vec<SessionState> = sessions
            .values()
            .filter(|s| filter.dm_id.as_ref().is_none_or(|dm| &s.dm_id == dm))
            .filter(|s| {
                filter
                    .campaign_id
                    .as_ref()
                    .is_none_or(|c| s.campaign_id.as_ref() == Some(c))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }

    async fn exists(&self, id: &SessionId) -> Result<bool, StoreError> {
        Ok(self
            .sessions
            .read()
            .expect("sessions poisoned")
            .contains_key(id.as_str()))
    }
}

/// In-memory [`SnapshotRepository`].
#[derive(Default)]
pub struct MemorySnapshotRepository {
    snapshots: RwLock<HashMap<String, SessionSnapshot>>,
}

impl MemorySnapshotRepository {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotRepository for MemorySnapshotRepository {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        self.snapshots
            .write()
            .expect("snapshots poisoned")
            .insert(snapshot.snapshot_id.as_str().to_string(), snapshot.clone());
        Ok(())
    }

    async fn get(&self, id: &SnapshotId) -> Result<Option<SessionSnapshot>, StoreError> {
        Ok(self
            .snapshots
            .read()
            .expect("snapshots poisoned")
            .get(id.as_str())
            .cloned())
    }

    async fn list_by_session(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<SessionSnapshot>, StoreError> {
        let snapshots = self.snapshots.read().expect("snapshots poisoned");
        let mut matches: Vec<SessionSnapshot> = snapshots
            .values()
            .filter(|s| s.session_id == *session_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn delete(&self, id: &SnapshotId) -> Result<bool, StoreError> {
        Ok(self
            .snapshots
            .write()
            .expect("snapshots poisoned")
            .remove(id.as_str())
            .is_some())
    }

    async fn exists(&self, id: &SnapshotId) -> Result<bool, StoreError> {
        Ok(self
            .snapshots
            .read()
            .expect("snapshots poisoned")
            .contains_key(id.as_str()))
    }
}

/// In-memory [`RollbackRepository`].
#[derive(Default)]
pub struct MemoryRollbackRepository {
    logs: RwLock<Vec<RollbackLog>>,
}

impl MemoryRollbackRepository {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RollbackRepository for MemoryRollbackRepository {
    async fn save_log(&self, log: &RollbackLog) -> Result<(), StoreError> {
        self.logs.write().expect("logs poisoned").push(log.clone());
        Ok(())
    }

    async fn list_logs(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<RollbackLog>, StoreError> {
        let logs = self.logs.read().expect("logs poisoned");
        let mut matches: Vec<RollbackLog> = logs
            .iter()
            .filter(|l| l.session_id == *session_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn latest_point(&self, session_id: &SessionId) -> Result<Option<SnapshotId>, StoreError> {
        let logs = self.logs.read().expect("logs poisoned");
        Ok(logs
            .iter()
            .filter(|l| l.session_id == *session_id && l.action == RollbackAction::CreatePoint)
            .max_by_key(|l| l.timestamp)
            .and_then(|l| l.snapshot_id.clone()))
    }
}
