//! Session persistence: repositories, patches, and rollback flow.

use chrono::Utc;
use loreweaver_store::{
    FsRollbackRepository, FsSessionRepository, FsSnapshotRepository, RollbackManager,
    SessionFilter, SessionPatch, SessionRepository, SnapshotRepository,
};
use loreweaver_types::{
    NpcId, SessionId, SessionState, StyleConfig, TimeManagerState,
};
use std::collections::HashMap;
use std::sync::Arc;

fn state(session_id: &str, dm: &str) -> SessionState {
    let now = Utc::now();
    SessionState {
        session_id: SessionId::new(session_id),
        dm_id: dm.into(),
        campaign_id: None,
        name: "The Sunken Keep".into(),
        description: "A rescue gone wrong".into(),
        current_time: now,
        current_scene_id: Some("scene-1".into()),
        player_characters: vec!["Kira".into()],
        active_npcs: vec![NpcId::new("elara")],
        style: StyleConfig::default(),
        created_at: now,
        updated_at: now,
        npc_states: HashMap::new(),
        time_manager_state: TimeManagerState {
            current_time: now,
            session_start: now,
            registered_events: vec![],
        },
        event_rules: vec![],
        custom_dm_styles: HashMap::new(),
        version: "1.0.0".into(),
        checksum: None,
    }
}

#[tokio::test]
async fn fs_session_repository_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FsSessionRepository::new(dir.path());

    let original = state("s1", "dm-1");
    repo.save(&original).await.unwrap();
    assert!(repo.exists(&SessionId::new("s1")).await.unwrap());

    let loaded = repo.get(&SessionId::new("s1")).await.unwrap().unwrap();
    assert_eq!(loaded, original);

    assert!(repo.delete(&SessionId::new("s1")).await.unwrap());
    assert!(!repo.delete(&SessionId::new("s1")).await.unwrap());
    assert!(repo.get(&SessionId::new("s1")).await.unwrap().is_none());
}

#[tokio::test]
async fn patches_apply_and_refresh_updated_at() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FsSessionRepository::new(dir.path());
    let original = state("s1", "dm-1");
    repo.save(&original).await.unwrap();

    let advanced = original.current_time + chrono::TimeDelta::seconds(3600);
    repo.update(
        &SessionId::new("s1"),
        vec![
            SessionPatch::Name("The Drowned Keep".into()),
            SessionPatch::CurrentScene(Some("scene-2".into())),
            SessionPatch::CurrentTime(advanced),
        ],
    )
    .await
    .unwrap();

    let loaded = repo.get(&SessionId::new("s1")).await.unwrap().unwrap();
    assert_eq!(loaded.name, "The Drowned Keep");
    assert_eq!(loaded.current_scene_id.as_deref(), Some("scene-2"));
    assert!(loaded.updated_at >= original.updated_at);

    // The clock patch keeps the embedded time-manager state in step.
    assert_eq!(loaded.current_time, advanced);
    assert_eq!(loaded.time_manager_state.current_time, advanced);
}

#[tokio::test]
async fn listing_filters_by_dm() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FsSessionRepository::new(dir.path());
    repo.save(&state("s1", "dm-1")).await.unwrap();
    repo.save(&state("s2", "dm-1")).await.unwrap();
    repo.save(&state("s3", "dm-2")).await.unwrap();

    let filter = SessionFilter {
        dm_id: Some("dm-1".into()),
        campaign_id: None,
    };
    let sessions = repo.list(&filter, 10, 0).await.unwrap();
    assert_eq!(sessions.len(), 2);
}

#[tokio::test]
async fn rollback_restores_the_pointed_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = Arc::new(FsSessionRepository::new(dir.path()));
    let snapshots = Arc::new(FsSnapshotRepository::new(dir.path()));
    let logs = Arc::new(FsRollbackRepository::new(dir.path()));
    let manager = RollbackManager::new(
        Arc::clone(&sessions) as _,
        Arc::clone(&snapshots) as _,
        Arc::clone(&logs) as _,
    );

    let session_id = SessionId::new("s1");
    sessions.save(&state("s1", "dm-1")).await.unwrap();

    // Take a point, then mutate the session.
    let point = manager
        .create_point(&session_id, "dm-1", "before the fight")
        .await
        .unwrap();
    sessions
        .update(
            &session_id,
            vec![SessionPatch::Name("everything went wrong".into())],
        )
        .await
        .unwrap();

    // The point is discoverable and the pair snapshot+log exists.
    assert_eq!(manager.latest_point(&session_id).await.unwrap(), Some(point.clone()));
    assert!(snapshots.exists(&point).await.unwrap());

    // Roll back and verify restoration.
    manager.rollback(&session_id, &point, "dm-1").await.unwrap();
    let restored = sessions.get(&session_id).await.unwrap().unwrap();
    assert_eq!(restored.name, "The Sunken Keep");

    // The audit trail has both rows, rollback first (newest).
    let trail = logs_trail(&logs, &session_id).await;
    assert_eq!(trail, vec!["rollback", "create_point"]);
}

async fn logs_trail(logs: &FsRollbackRepository, session_id: &SessionId) -> Vec<String> {
    use loreweaver_store::RollbackRepository;
    use loreweaver_types::RollbackAction;
    logs.list_logs(session_id, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|l| match l.action {
            RollbackAction::CreatePoint => "create_point".to_string(),
            RollbackAction::Rollback => "rollback".to_string(),
        })
        .collect()
}

#[tokio::test]
async fn rollback_rejects_foreign_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = Arc::new(FsSessionRepository::new(dir.path()));
    let snapshots = Arc::new(FsSnapshotRepository::new(dir.path()));
    let logs = Arc::new(FsRollbackRepository::new(dir.path()));
    let manager = RollbackManager::new(
        Arc::clone(&sessions) as _,
        Arc::clone(&snapshots) as _,
        Arc::clone(&logs) as _,
    );

    sessions.save(&state("s1", "dm-1")).await.unwrap();
    sessions.save(&state("s2", "dm-1")).await.unwrap();
    let point = manager
        .create_point(&SessionId::new("s1"), "dm-1", "p")
        .await
        .unwrap();

    let err = manager
        .rollback(&SessionId::new("s2"), &point, "dm-1")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("belongs to session"));
}

#[tokio::test]
async fn snapshots_list_newest_first_per_session() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = Arc::new(FsSessionRepository::new(dir.path()));
    let snapshots = Arc::new(FsSnapshotRepository::new(dir.path()));
    let logs = Arc::new(FsRollbackRepository::new(dir.path()));
    let manager = RollbackManager::new(
        Arc::clone(&sessions) as _,
        Arc::clone(&snapshots) as _,
        Arc::clone(&logs) as _,
    );

    sessions.save(&state("s1", "dm-1")).await.unwrap();
    manager
        .create_point(&SessionId::new("s1"), "dm-1", "first")
        .await
        .unwrap();
    manager
        .create_point(&SessionId::new("s1"), "dm-1", "second")
        .await
        .unwrap();

    let listed = snapshots
        .list_by_session(&SessionId::new("s1"), 10)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].created_at >= listed[1].created_at);
}
