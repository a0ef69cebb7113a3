//! Filesystem-backed repository implementations.
//!
//! Layout under the configured root:
//!
//! ```text
//! root/
//!   sessions/<session-id>.json
//!   snapshots/<snapshot-id>.json
//!   rollback/<session-id>.json      (array of log rows)
//! ```

use crate::error::StoreError;
use crate::file::FileStore;
use crate::session::{
    RollbackRepository, SessionFilter, SessionPatch, SessionRepository, SnapshotRepository,
};
use async_trait::async_trait;
use loreweaver_types::{
    RollbackAction, RollbackLog, SessionId, SessionSnapshot, SessionState, SnapshotId,
};
use std::path::PathBuf;

fn session_path(id: &SessionId) -> String {
    format!("sessions/{}.json", id.as_str())
}

fn snapshot_path(id: &SnapshotId) -> String {
    format!("snapshots/{}.json", id.as_str())
}

fn rollback_path(id: &SessionId) -> String {
    format!("rollback/{}.json", id.as_str())
}

/// Filesystem [`SessionRepository`].
pub struct FsSessionRepository {
    store: FileStore,
}

impl FsSessionRepository {
    /// A repository rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            store: FileStore::new(root.into()),
        }
    }
}

#[async_trait]
impl SessionRepository for FsSessionRepository {
    async fn save(&self, state: &SessionState) -> Result<(), StoreError> {
        let value = serde_json::to_value(state)?;
        self.store.write_json(&session_path(&state.session_id), &value).await
    }

    async fn get(&self, id: &SessionId) -> Result<Option<SessionState>, StoreError> {
        match self.store.read_json(&session_path(id)).await {
            Ok(value) => Ok(Some(serde_json::from_value(value)?)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn update(&self, id: &SessionId, patches: Vec<SessionPatch>) -> Result<(), StoreError> {
        let mut state = self
            .get(id)
            .await?
            .ok_or_else(|| StoreError::not_found("session", id.as_str()))?;
        for patch in patches {
            patch.apply(&mut state);
        }
        self.save(&state).await
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        if !self.store.exists(&session_path(id)).await? {
            return Ok(false);
        }
        self.store.delete(&session_path(id), false).await?;
        Ok(true)
    }

    async fn list(
        &self,
        filter: &SessionFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SessionState>, StoreError> {
        let mut sessions = Vec::new();
        for name in self.store.list("sessions", "*.json").await? {
            let value = self.store.read_json(&format!("sessions/{name}")).await?;
            let state: SessionState = serde_json::from_value(value)?;
            let dm_ok = filter.dm_id.as_ref().is_none_or(|dm| &state.dm_id == dm);
            let campaign_ok = filter
                .campaign_id
                .as_ref()
                .is_none_or(|c| state.campaign_id.as_ref() == Some(c));
            if dm_ok && campaign_ok {
                sessions.push(state);
            }
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions.into_iter().skip(offset).take(limit).collect())
    }

    async fn exists(&self, id: &SessionId) -> Result<bool, StoreError> {
        self.store.exists(&session_path(id)).await
    }
}

/// Filesystem [`SnapshotRepository`].
pub struct FsSnapshotRepository {
    store: FileStore,
}

impl FsSnapshotRepository {
    /// A repository rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            store: FileStore::new(root.into()),
        }
    }
}

#[async_trait]
impl SnapshotRepository for FsSnapshotRepository {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let value = serde_json::to_value(snapshot)?;
        self.store
            .write_json(&snapshot_path(&snapshot.snapshot_id), &value)
            .await
    }

    async fn get(&self, id: &SnapshotId) -> Result<Option<SessionSnapshot>, StoreError> {
        match self.store.read_json(&snapshot_path(id)).await {
            Ok(value) => Ok(Some(serde_json::from_value(value)?)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn list_by_session(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<SessionSnapshot>, StoreError> {
        let mut snapshots = Vec::new();
        for name in self.store.list("snapshots", "*.json").await? {
            let value = self.store.read_json(&format!("snapshots/{name}")).await?;
            let snapshot: SessionSnapshot = serde_json::from_value(value)?;
            if snapshot.session_id == *session_id {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots.truncate(limit);
        Ok(snapshots)
    }

    async fn delete(&self, id: &SnapshotId) -> Result<bool, StoreError> {
        if !self.store.exists(&snapshot_path(id)).await? {
            return Ok(false);
        }
        self.store.delete(&snapshot_path(id), false).await?;
        Ok(true)
    }

    async fn exists(&self, id: &SnapshotId) -> Result<bool, StoreError> {
        self.store.exists(&snapshot_path(id)).await
    }
}

/// Filesystem [`RollbackRepository`]: one JSON array per session.
pub struct FsRollbackRepository {
    store: FileStore,
}

impl FsRollbackRepository {
    /// A repository rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            store: FileStore::new(root.into()),
        }
    }

    async fn load(&self, session_id: &SessionId) -> Result<Vec<RollbackLog>, StoreError> {
        match self.store.read_json(&rollback_path(session_id)).await {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(StoreError::NotFound { .. }) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl RollbackRepository for FsRollbackRepository {
    async fn save_log(&self, log: &RollbackLog) -> Result<(), StoreError> {
        let mut logs = self.load(&log.session_id).await?;
        logs.push(log.clone());
        let value = serde_json::to_value(&logs)?;
        self.store.write_json(&rollback_path(&log.session_id), &value).await
    }

    async fn list_logs(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<RollbackLog>, StoreError> {
        let mut logs = self.load(session_id).await?;
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs.truncate(limit);
        Ok(logs)
    }

    async fn latest_point(&self, session_id: &SessionId) -> Result<Option<SnapshotId>, StoreError> {
        let logs = self.load(session_id).await?;
        Ok(logs
            .iter()
            .filter(|l| l.action == RollbackAction::CreatePoint)
            .max_by_key(|l| l.timestamp)
            .and_then(|l| l.snapshot_id.clone()))
    }
}
