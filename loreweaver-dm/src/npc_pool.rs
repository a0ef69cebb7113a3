//! The NPC agent pool: lazy per-(session, npc) agents, concurrent
//! turn responses, serialised per-NPC memory updates.

use crate::classifier::extract_json;
use loreweaver_provider::ChatMessage;
use loreweaver_scheduler::{ModelScheduler, RequestContext};
use loreweaver_store::EntityStore;
use loreweaver_types::{DispatchedTask, NpcId, NpcResponse, NpcState, SessionId, TaskPayload};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;
use tokio::sync::Mutex;

/// Pool tuning.
#[derive(Debug, Clone)]
pub struct NpcPoolConfig {
    /// Upper bound on live NPC agent instances across sessions.
    pub max_agents: usize,
    /// Completion budget per NPC model call.
    pub max_tokens: u32,
    /// Sampling temperature for NPC responses.
    pub temperature: f64,
}

impl Default for NpcPoolConfig {
    fn default() -> Self {
        Self {
            max_agents: 32,
            max_tokens: 600,
            temperature: 0.8,
        }
    }
}

/// Pool status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcPoolStatus {
    /// Live agent instances.
    pub live_agents: usize,
    /// Configured bound.
    pub max_agents: usize,
}

#[derive(Deserialize)]
struct RawNpcReply {
    #[serde(default)]
    dialogue: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    emotion_delta: HashMap<String, f64>,
    #[serde(default)]
    memory_delta: Vec<String>,
}

/// One live NPC agent: its persisted state plus a memory lock.
struct NpcAgent {
    npc_id: NpcId,
    /// Interior state; writes are serialised by `memory_lock`.
    state: StdMutex<NpcState>,
    /// Serialises memory updates for this NPC only.
    memory_lock: Mutex<()>,
    /// True while the agent is answering a turn; the LRU eviction
    /// never removes a running agent.
    running: AtomicBool,
    last_used: StdMutex<Instant>,
}

impl NpcAgent {
    fn new(npc_id: NpcId, state: NpcState) -> Self {
        Self {
            npc_id,
            state: StdMutex::new(state),
            memory_lock: Mutex::new(()),
            running: AtomicBool::new(false),
            last_used: StdMutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_used.lock().expect("last_used poisoned") = Instant::now();
    }

    fn describe_tasks(tasks: &[&DispatchedTask]) -> String {
        tasks
            .iter()
            .map(|task| match &task.payload {
                TaskPayload::Dialogue {
                    speaker, content, ..
                } => format!("{speaker} says to you: \"{content}\""),
                TaskPayload::Action {
                    action_type,
                    target,
                    ..
                } => format!(
                    "{} performs '{action_type}' on {}",
                    task.input.input.character_name,
                    target.as_ref().map(|t| t.name.as_str()).unwrap_or("you"),
                ),
                other => format!("{other:?}"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn respond(
        &self,
        scheduler: &ModelScheduler,
        config: &NpcPoolConfig,
        tasks: &[&DispatchedTask],
    ) -> Result<NpcResponse, String> {
        let state_summary = {
            let state = self.state.lock().expect("npc state poisoned");
            serde_json::json!({
                "personality": state.personality,
                "emotions": state.emotions,
                "recent_memories": state.memory_summary.iter().rev().take(5).collect::<Vec<_>>(),
                "relationships": state.relationships,
            })
        };

        let system = format!(
            "You are the NPC '{}'. Your interior state:\n{state_summary}\n\
             Respond in character. Reply with strict JSON only:\n\
             {{\"dialogue\": \"...\" or null, \"action\": \"...\" or null,\n \
             \"emotion_delta\": {{\"trust\": 0.1}}, \"memory_delta\": [\"...\"]}}",
            self.npc_id
        );
        let mut context = RequestContext::new(vec![ChatMessage::user(format!(
            "This turn:\n{}",
            Self::describe_tasks(tasks)
        ))]);
        context.system = Some(system);
        context.max_tokens = Some(config.max_tokens);
        context.temperature = Some(config.temperature);

        let response = scheduler
            .chat(&context)
            .await
            .map_err(|e| e.to_string())?
            .first_text()
            .unwrap_or_default();
        let raw: RawNpcReply = extract_json(&response)
            .and_then(|json| serde_json::from_str(&json).ok())
            .ok_or_else(|| format!("unparseable NPC reply: {response}"))?;

        Ok(NpcResponse {
            npc_id: self.npc_id.clone(),
            dialogue: raw.dialogue,
            action: raw.action,
            emotion_delta: raw.emotion_delta,
            memory_delta: raw.memory_delta,
        })
    }

    /// Apply one response's interior deltas under the memory lock.
    async fn apply_memory(&self, response: &NpcResponse) {
        let _guard = self.memory_lock.lock().await;
        let mut state = self.state.lock().expect("npc state poisoned");
        for (emotion, delta) in &response.emotion_delta {
            let value = state.emotions.entry(emotion.clone()).or_insert(0.0);
            *value = (*value + delta).clamp(0.0, 1.0);
        }
        for memory in &response.memory_delta {
            state
                .memory_summary
                .push(serde_json::json!({ "note": memory }));
        }
    }
}

/// Lazy pool of NPC agents with an LRU bound.
pub struct NpcAgentPool {
    scheduler: Arc<ModelScheduler>,
    entities: Arc<dyn EntityStore>,
    config: NpcPoolConfig,
    agents: Mutex<HashMap<(String, String), Arc<NpcAgent>>>,
}

impl NpcAgentPool {
    /// A pool over the given scheduler and entity store.
    pub fn new(
        scheduler: Arc<ModelScheduler>,
        entities: Arc<dyn EntityStore>,
        config: NpcPoolConfig,
    ) -> Self {
        Self {
            scheduler,
            entities,
            config,
            agents: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch or lazily build the agent for (session, npc). Evicts the
    /// least-recently-used non-running agent when the pool is full.
    async fn agent_for(&self, session_id: &SessionId, npc_id: &NpcId) -> Arc<NpcAgent> {
        let key = (
            session_id.as_str().to_string(),
            npc_id.as_str().to_string(),
        );
        {
            let agents = self.agents.lock().await;
            if let Some(agent) = agents.get(&key) {
                agent.touch();
                return Arc::clone(agent);
            }
        }

        let state = self.load_state(npc_id).await;
        let agent = Arc::new(NpcAgent::new(npc_id.clone(), state));

        let mut agents = self.agents.lock().await;
        if agents.len() >= self.config.max_agents {
            // Evict the stalest agent that is not mid-turn.
            let victim = agents
                .iter()
                .filter(|(_, a)| !a.running.load(Ordering::SeqCst))
                .min_by_key(|(_, a)| *a.last_used.lock().expect("last_used poisoned"))
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                tracing::debug!(npc = %victim.1, "evicting idle NPC agent");
                agents.remove(&victim);
            }
        }
        agents.insert(key, Arc::clone(&agent));
        agent
    }

    /// Seed state from the entity store's NPC record, or blank.
    async fn load_state(&self, npc_id: &NpcId) -> NpcState {
        let mut state = NpcState::blank(npc_id.clone());
        if let Ok(Some(record)) = self.entities.get_entity(npc_id.as_str()).await {
            for (field, target) in [
                ("personality", &mut state.personality),
                ("emotions", &mut state.emotions),
                ("relationships", &mut state.relationships),
            ] {
                if let Some(value) = record.properties.get(field) {
                    if let Ok(parsed) = serde_json::from_value(value.clone()) {
                        *target = parsed;
                    }
                }
            }
        }
        state
    }

    /// Answer a turn: group tasks by target NPC, ask each group's
    /// agent concurrently, and key the responses by NPC id. A failing
    /// NPC is logged and skipped — the turn is never lost to one NPC.
    pub async fn process_interactions(
        &self,
        session_id: &SessionId,
        tasks: &[DispatchedTask],
    ) -> HashMap<NpcId, NpcResponse> {
        let mut groups: HashMap<NpcId, Vec<&DispatchedTask>> = HashMap::new();
        for task in tasks.iter().filter(|t| t.requires_npc_response) {
            if let Some(npc_id) = &task.target_npc_id {
                groups.entry(npc_id.clone()).or_default().push(task);
            }
        }

        let futures = groups.into_iter().map(|(npc_id, group)| async move {
            let agent = self.agent_for(session_id, &npc_id).await;
            agent.running.store(true, Ordering::SeqCst);
            agent.touch();
            let outcome = agent.respond(&self.scheduler, &self.config, &group).await;
            agent.running.store(false, Ordering::SeqCst);
            (npc_id, outcome)
        });

        let mut responses = HashMap::new();
        for (npc_id, outcome) in futures::future::join_all(futures).await {
            match outcome {
                Ok(response) => {
                    responses.insert(npc_id, response);
                }
                Err(err) => {
                    tracing::error!(npc = %npc_id, error = %err, "NPC failed to respond, continuing turn");
                }
            }
        }
        responses
    }

    /// Push each response's memory delta into its NPC's state.
    /// Serialised per NPC, parallel across NPCs.
    pub async fn update_memories(
        &self,
        session_id: &SessionId,
        responses: &HashMap<NpcId, NpcResponse>,
    ) {
        let futures = responses.iter().map(|(npc_id, response)| async move {
            let agent = self.agent_for(session_id, npc_id).await;
            agent.apply_memory(response).await;
        });
        futures::future::join_all(futures).await;
    }

    /// Snapshot an NPC's interior state, if the agent is live.
    pub async fn npc_state(&self, session_id: &SessionId, npc_id: &NpcId) -> Option<NpcState> {
        let key = (
            session_id.as_str().to_string(),
            npc_id.as_str().to_string(),
        );
        let agents = self.agents.lock().await;
        agents
            .get(&key)
            .map(|agent| agent.state.lock().expect("npc state poisoned").clone())
    }

    /// NPC ids with live agents in a session.
    pub async fn session_npcs(&self, session_id: &SessionId) -> Vec<NpcId> {
        let agents = self.agents.lock().await;
        let mut ids: Vec<NpcId> = agents
            .keys()
            .filter(|(session, _)| session == session_id.as_str())
            .map(|(_, npc)| NpcId::new(npc.clone()))
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Drop every agent belonging to a session.
    pub async fn cleanup_session(&self, session_id: &SessionId) {
        let mut agents = self.agents.lock().await;
        agents.retain(|(session, _), _| session != session_id.as_str());
    }

    /// Pool occupancy report.
    pub async fn status(&self) -> NpcPoolStatus {
        NpcPoolStatus {
            live_agents: self.agents.lock().await.len(),
            max_agents: self.config.max_agents,
        }
    }
}
