//! The DM agent: session lifecycle and the eight-phase turn pipeline.

use crate::classifier::InputClassifier;
use crate::dispatcher::TaskDispatcher;
use crate::extractor::EntityExtractor;
use crate::npc_pool::{NpcAgentPool, NpcPoolConfig, NpcPoolStatus};
use crate::response::{CustomDmStyle, ResponseGenerator};
use crate::time::{PeriodicRule, TimeManager, TimeManagerStatus};
use chrono::{DateTime, Utc};
use loreweaver_scheduler::ModelScheduler;
use loreweaver_store::{
    EntityStore, GameRecord, GameRecordKind, GameRecordRepository, SessionPatch,
    SessionRepository, StoreError,
};
use loreweaver_types::{
    DispatchedTask, DmResponse, DurationSecs, GameEvent, NpcId, NpcResponse, PerceptibleInfo,
    PlayerInput, RuleId, SessionId, SessionState, StyleConfig, TimeManagerState,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// DM agent errors. Most stage failures degrade inside the pipeline;
/// these surface only when a turn cannot be assembled at all.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DmError {
    /// The session is unknown.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The persistence layer failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Static configuration for a DM agent.
#[derive(Clone)]
pub struct DmAgentConfig {
    /// This DM's id.
    pub dm_id: String,
    /// Starting style.
    pub style: StyleConfig,
    /// NPC pool tuning.
    pub npc_pool: NpcPoolConfig,
}

impl Default for DmAgentConfig {
    fn default() -> Self {
        Self {
            dm_id: "dm".into(),
            style: StyleConfig::default(),
            npc_pool: NpcPoolConfig::default(),
        }
    }
}

/// Session status report.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// The session reported on.
    pub session_id: SessionId,
    /// Current in-game time.
    pub current_time: DateTime<Utc>,
    /// NPCs with live agents.
    pub active_npcs: Vec<NpcId>,
    /// NPC pool occupancy.
    pub npc_pool: NpcPoolStatus,
    /// Clock/rule engine status.
    pub time_manager: TimeManagerStatus,
    /// Active style.
    pub style: StyleConfig,
}

/// The dungeon master. Owns the per-turn pipeline and the session
/// lifecycle around it.
pub struct DmAgent {
    config: DmAgentConfig,
    classifier: InputClassifier,
    extractor: EntityExtractor,
    dispatcher: TaskDispatcher,
    npc_pool: NpcAgentPool,
    time_manager: TimeManager,
    response_generator: ResponseGenerator,
    sessions: Arc<dyn SessionRepository>,
    records: Arc<dyn GameRecordRepository>,
}

impl DmAgent {
    /// Wire a DM agent from its collaborators and register the
    /// default event rules.
    pub fn new(
        config: DmAgentConfig,
        scheduler: Arc<ModelScheduler>,
        entities: Arc<dyn EntityStore>,
        sessions: Arc<dyn SessionRepository>,
        records: Arc<dyn GameRecordRepository>,
    ) -> Self {
        let classifier = InputClassifier::new(Arc::clone(&scheduler));
        let extractor = EntityExtractor::new(Arc::clone(&scheduler), Arc::clone(&entities));
        let npc_pool = NpcAgentPool::new(
            Arc::clone(&scheduler),
            Arc::clone(&entities),
            config.npc_pool.clone(),
        );
        let time_manager = TimeManager::new(Arc::clone(&records));
        time_manager.register_rule(Arc::new(PeriodicRule::spell_recovery(RuleId::new(
            "spell_recovery_default",
        ))));
        let response_generator =
            ResponseGenerator::new(Arc::clone(&scheduler), config.style.clone());

        Self {
            config,
            classifier,
            extractor,
            dispatcher: TaskDispatcher::new(),
            npc_pool,
            time_manager,
            response_generator,
            sessions,
            records,
        }
    }

    /// Create and persist a fresh session.
    pub async fn initialize_session(
        &self,
        session_id: SessionId,
        name: impl Into<String>,
        description: impl Into<String>,
        campaign_id: Option<String>,
        npc_ids: Vec<NpcId>,
    ) -> Result<SessionState, DmError> {
        let now = Utc::now();
        let state = SessionState {
            session_id: session_id.clone(),
            dm_id: self.config.dm_id.clone(),
            campaign_id,
            name: name.into(),
            description: description.into(),
            current_time: now,
            current_scene_id: None,
            player_characters: Vec::new(),
            active_npcs: npc_ids,
            style: self.config.style.clone(),
            created_at: now,
            updated_at: now,
            npc_states: HashMap::new(),
            time_manager_state: TimeManagerState {
                current_time: now,
                session_start: now,
                registered_events: Vec::new(),
            },
            event_rules: Vec::new(),
            custom_dm_styles: HashMap::new(),
            version: "1.0.0".into(),
            checksum: None,
        };
        self.sessions.save(&state).await?;
        self.time_manager.set_time(&session_id, now);
        tracing::info!(session = %session_id, "session initialised");
        Ok(state)
    }

    /// Load a persisted session and resume its game clock from the
    /// stored `current_time` (a fresh process otherwise has no clock
    /// for it).
    pub async fn load_session(&self, session_id: &SessionId) -> Result<SessionState, DmError> {
        let state = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| DmError::SessionNotFound(session_id.clone()))?;
        self.time_manager.set_time(session_id, state.current_time);
        tracing::info!(session = %session_id, "session loaded, clock resumed");
        Ok(state)
    }

    /// Process one player turn through the eight phases. Errors that
    /// cannot be degraded produce the apology response rather than
    /// escaping.
    pub async fn process_player_turn(
        &self,
        session_id: &SessionId,
        inputs: Vec<PlayerInput>,
    ) -> DmResponse {
        let started = std::time::Instant::now();
        tracing::info!(session = %session_id, inputs = inputs.len(), "processing player turn");

        match self.run_turn(session_id, inputs).await {
            Ok(response) => {
                tracing::info!(
                    session = %session_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "turn complete"
                );
                response
            }
            Err(err) => {
                tracing::error!(session = %session_id, error = %err, "turn failed, sending fallback");
                ResponseGenerator::fallback(
                    session_id.clone(),
                    self.time_manager.current_time(session_id),
                )
            }
        }
    }

    async fn run_turn(
        &self,
        session_id: &SessionId,
        inputs: Vec<PlayerInput>,
    ) -> Result<DmResponse, DmError> {
        // Resume the persisted clock when this process has not seen
        // the session yet; a turn must never start from wall time.
        if !self.time_manager.has_clock(session_id) {
            self.load_session(session_id).await?;
        }

        // Phase 1: classify, in parallel. Failures inside degrade to OOC.
        let classified = self.classifier.classify_batch(inputs.clone()).await;

        // Phase 2: extract entities, in parallel. Failures degrade to empty.
        let extracted = self.extractor.extract_batch(classified.clone()).await;

        // Phase 3: dispatch per (classification, entities) pair.
        let pairs: Vec<_> = classified.into_iter().zip(extracted).collect();
        let tasks = self.dispatcher.dispatch_batch(pairs).await;

        // Phase 4: NPC fan-out and time advance run concurrently and
        // both complete before events fire.
        let total_cost = tasks
            .iter()
            .map(|t| t.time_cost)
            .fold(DurationSecs::ZERO, |acc, c| acc + c);
        let (npc_responses, new_time) = tokio::join!(
            self.npc_pool.process_interactions(session_id, &tasks),
            self.time_manager.advance(session_id, total_cost),
        );

        // Phase 5: event rules, priority order.
        let events = self.time_manager.check_events(session_id, total_cost).await;

        // Phase 6: memories and records, before the response goes out.
        // The advanced clock is persisted here too, so snapshots and
        // restarts see the session's real game time.
        self.npc_pool
            .update_memories(session_id, &npc_responses)
            .await;
        if let Err(err) = self
            .sessions
            .update(session_id, vec![SessionPatch::CurrentTime(new_time)])
            .await
        {
            tracing::warn!(session = %session_id, error = %err, "failed to persist advanced game time");
        }
        self.write_records(session_id, &inputs, &tasks, &npc_responses, &events)
            .await;

        // Phase 7: the perceptible slice of the turn.
        let perceptible = self
            .collect_perceptible(session_id, &inputs, &tasks, &npc_responses, &events)
            .await;

        // Phase 8: narrate.
        let game_time = self.time_manager.current_time(session_id);
        Ok(self
            .response_generator
            .generate(&perceptible, session_id.clone(), game_time)
            .await)
    }

    async fn write_records(
        &self,
        session_id: &SessionId,
        inputs: &[PlayerInput],
        tasks: &[DispatchedTask],
        npc_responses: &HashMap<NpcId, NpcResponse>,
        events: &[GameEvent],
    ) {
        let mut records = Vec::new();
        for input in inputs {
            records.push(GameRecord::new(
                session_id.clone(),
                GameRecordKind::PlayerInput,
                json!({"player": input.player_id.as_str(), "content": input.content}),
            ));
        }
        for task in tasks {
            records.push(GameRecord::new(
                session_id.clone(),
                GameRecordKind::Task,
                json!({
                    "task_id": task.task_id.as_str(),
                    "input_type": task.input_type,
                    "time_cost_secs": task.time_cost.as_secs(),
                    "requires_npc_response": task.requires_npc_response,
                }),
            ));
        }
        for response in npc_responses.values() {
            // Records are observable history: only the observed
            // projection is written, never interior deltas.
            records.push(GameRecord::new(
                session_id.clone(),
                GameRecordKind::NpcResponse,
                serde_json::to_value(response.observed()).unwrap_or_default(),
            ));
        }
        for event in events {
            records.push(GameRecord::new(
                session_id.clone(),
                GameRecordKind::Event,
                serde_json::to_value(event).unwrap_or_default(),
            ));
        }

        for record in records {
            if let Err(err) = self.records.append(record).await {
                tracing::warn!(error = %err, "failed to write game record");
            }
        }
    }

    async fn collect_perceptible(
        &self,
        session_id: &SessionId,
        inputs: &[PlayerInput],
        tasks: &[DispatchedTask],
        npc_responses: &HashMap<NpcId, NpcResponse>,
        events: &[GameEvent],
    ) -> PerceptibleInfo {
        let player_actions = inputs.iter().map(|i| i.content.clone()).collect();

        // Only the observable projection crosses this boundary.
        let mut observed: Vec<_> = npc_responses.values().map(NpcResponse::observed).collect();
        observed.sort_by(|a, b| a.npc_id.as_str().cmp(b.npc_id.as_str()));

        let changed_entities = tasks
            .iter()
            .flat_map(|t| t.entities.mentions.iter().cloned())
            .collect();

        let scene_description = match self.sessions.get(session_id).await {
            Ok(Some(state)) => match state.current_scene_id {
                Some(scene) => format!("scene {scene}"),
                None => state.description,
            },
            _ => "the current scene".to_string(),
        };

        PerceptibleInfo {
            player_actions,
            npc_responses: observed,
            events: events.to_vec(),
            scene_description,
            changed_entities,
        }
    }

    /// Update the style presets and/or activate a custom style, and
    /// persist the change on the session.
    pub async fn update_style(
        &self,
        session_id: &SessionId,
        style: StyleConfig,
    ) -> Result<(), DmError> {
        self.response_generator.update_style(style.clone());
        self.sessions
            .update(session_id, vec![SessionPatch::Style(style)])
            .await?;
        Ok(())
    }

    /// Register a named custom style for later activation.
    pub fn register_custom_style(&self, style: CustomDmStyle) {
        self.response_generator.register_custom_style(style);
    }

    /// Remove a named custom style. Returns whether it existed.
    pub fn remove_custom_style(&self, name: &str) -> bool {
        self.response_generator.remove_custom_style(name)
    }

    /// Registered custom style names.
    pub fn custom_styles(&self) -> Vec<String> {
        self.response_generator.custom_styles()
    }

    /// The time manager, for rule registration.
    pub fn time_manager(&self) -> &TimeManager {
        &self.time_manager
    }

    /// Status report for one session.
    pub async fn session_status(&self, session_id: &SessionId) -> SessionStatus {
        SessionStatus {
            session_id: session_id.clone(),
            current_time: self.time_manager.current_time(session_id),
            active_npcs: self.npc_pool.session_npcs(session_id).await,
            npc_pool: self.npc_pool.status().await,
            time_manager: self.time_manager.status(),
            style: self.response_generator.style(),
        }
    }

    /// Release everything a session holds: NPC agents, clock, and
    /// per-session rule state.
    pub async fn cleanup_session(&self, session_id: &SessionId) {
        self.npc_pool.cleanup_session(session_id).await;
        self.time_manager.cleanup_session(session_id);
        tracing::info!(session = %session_id, "session cleaned up");
    }
}
