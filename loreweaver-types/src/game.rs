//! The per-turn game model: player inputs, classifications, dispatched
//! tasks, NPC responses, and the perceptible slice of a turn.

use crate::duration::DurationSecs;
use crate::error::InvariantError;
use crate::id::{NpcId, PlayerId, SessionId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One utterance a player submitted this turn. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    /// The submitting player.
    pub player_id: PlayerId,
    /// The in-fiction character speaking/acting.
    pub character_name: String,
    /// Raw utterance text.
    pub content: String,
    /// When the input was received.
    pub timestamp: DateTime<Utc>,
}

/// The closed set of utterance categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    /// An in-fiction physical action ("I search the chest").
    Action,
    /// In-character speech, possibly addressed to an NPC.
    Dialogue,
    /// Interior monologue; never observable by NPCs.
    Thought,
    /// Out-of-character table talk.
    Ooc,
    /// A slash command ("/roll 2d6+3").
    Command,
}

/// Kinds of game entity a mention can resolve to.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    /// A player character.
    Character,
    /// A non-player character.
    Npc,
    /// An item or object.
    Item,
    /// A spell.
    Spell,
    /// A skill or proficiency.
    Skill,
    /// A location.
    Place,
    /// Anything else.
    Other,
}

/// The target of an action or dialogue, as classified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRef {
    /// What kind of entity the target is.
    pub kind: EntityKind,
    /// Stored entity id, when the target resolved against storage.
    pub id: Option<String>,
    /// The name as the player said it.
    pub name: String,
}

impl TargetRef {
    /// Whether this target is an NPC with a known id.
    pub fn npc_id(&self) -> Option<NpcId> {
        match (self.kind, &self.id) {
            (EntityKind::Npc, Some(id)) => Some(NpcId::new(id.clone())),
            _ => None,
        }
    }
}

/// A player input plus its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedInput {
    /// The original input, untouched.
    pub input: PlayerInput,
    /// Exactly one category.
    pub input_type: InputType,
    /// Finer action kind for Action/Command inputs ("cast_spell", "/roll").
    pub action_type: Option<String>,
    /// Who or what the input is directed at.
    pub target: Option<TargetRef>,
}

impl ClassifiedInput {
    /// The safe-default classification used when the classifier fails:
    /// out-of-character, no target, so the turn still progresses.
    pub fn fallback_ooc(input: PlayerInput) -> Self {
        Self {
            input,
            input_type: InputType::Ooc,
            action_type: None,
            target: None,
        }
    }
}

/// One entity mention proposed by the extractor.
///
/// Invariant: `is_new` is true exactly when `matched_entity_id` is
/// absent. Use [`EntityMention::resolved`] / [`EntityMention::unresolved`]
/// to stay on the right side of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    /// The name as it appeared in the input.
    pub surface_name: String,
    /// What kind of entity this looks like.
    pub kind: EntityKind,
    /// Stored entity id when resolution succeeded.
    pub matched_entity_id: Option<String>,
    /// Whether this mention did not resolve against storage.
    pub is_new: bool,
}

impl EntityMention {
    /// A mention that resolved to a stored entity.
    pub fn resolved(
        surface_name: impl Into<String>,
        kind: EntityKind,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            surface_name: surface_name.into(),
            kind,
            matched_entity_id: Some(entity_id.into()),
            is_new: false,
        }
    }

    /// A mention with no stored counterpart. It is NOT auto-created.
    pub fn unresolved(surface_name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            surface_name: surface_name.into(),
            kind,
            matched_entity_id: None,
            is_new: true,
        }
    }
}

/// All entity mentions bound to one classified input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    /// The input the mentions were extracted from.
    pub input: ClassifiedInput,
    /// Mentions, in order of appearance.
    pub mentions: Vec<EntityMention>,
}

impl ExtractedEntities {
    /// An empty extraction for the given input (extractor failure path).
    pub fn empty(input: ClassifiedInput) -> Self {
        Self {
            input,
            mentions: Vec::new(),
        }
    }

    /// Mentions of one entity kind, in input order.
    pub fn mentions_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &EntityMention> {
        self.mentions.iter().filter(move |m| m.kind == kind)
    }
}

/// Structured payload produced by the per-type processors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskPayload {
    /// A physical action.
    Action {
        /// Finer action kind ("cast_spell", "search", ...).
        action_type: String,
        /// Target of the action, if any.
        target: Option<TargetRef>,
        /// Processor-specific structured outcome.
        outcome: serde_json::Value,
    },
    /// In-character speech.
    Dialogue {
        /// The speaking character.
        speaker: String,
        /// What was said.
        content: String,
        /// The listener, if addressed.
        target: Option<TargetRef>,
    },
    /// Interior monologue.
    Thought {
        /// The thinking character.
        character: String,
        /// The thought content.
        content: String,
    },
    /// Out-of-character table talk.
    Ooc {
        /// The player speaking.
        player: String,
        /// What was said.
        content: String,
    },
    /// A parsed slash command.
    Command {
        /// Command verb ("/roll").
        command: String,
        /// Whitespace-split arguments.
        arguments: Vec<String>,
        /// The raw command text.
        raw_input: String,
        /// Command-specific parsed fields.
        parsed: serde_json::Value,
    },
}

/// A unit of work produced by the dispatcher for one classified input.
///
/// Invariants: `time_cost ≥ 0` (guaranteed by [`DurationSecs`]) and
/// `requires_npc_response ⇒ target_npc_id.is_some()` (enforced by
/// [`DispatchedTask::new`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchedTask {
    /// Unique task id.
    pub task_id: TaskId,
    /// Category of the originating input.
    pub input_type: InputType,
    /// The classified input.
    pub input: ClassifiedInput,
    /// Entities extracted from the input.
    pub entities: ExtractedEntities,
    /// Structured payload for downstream processors.
    pub payload: TaskPayload,
    /// Whether an NPC must answer this task.
    pub requires_npc_response: bool,
    /// The NPC that must answer, when one is required.
    pub target_npc_id: Option<NpcId>,
    /// In-game time this task consumes.
    pub time_cost: DurationSecs,
}

impl DispatchedTask {
    /// Construct a task, checking the NPC-response invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input_type: InputType,
        input: ClassifiedInput,
        entities: ExtractedEntities,
        payload: TaskPayload,
        requires_npc_response: bool,
        target_npc_id: Option<NpcId>,
        time_cost: DurationSecs,
    ) -> Result<Self, InvariantError> {
        if requires_npc_response && target_npc_id.is_none() {
            return Err(InvariantError::MissingTargetNpc);
        }
        Ok(Self {
            task_id: TaskId::fresh(),
            input_type,
            input,
            entities,
            payload,
            requires_npc_response,
            target_npc_id,
            time_cost,
        })
    }
}

/// What one NPC did in response to its tasks this turn.
///
/// `emotion_delta` and `memory_delta` are interior state: they feed
/// the NPC's persisted state and MUST NOT reach players. Only
/// `dialogue` and `action` are observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcResponse {
    /// The responding NPC.
    pub npc_id: NpcId,
    /// Spoken reply, if any.
    pub dialogue: Option<String>,
    /// Visible action, if any.
    pub action: Option<String>,
    /// Emotion adjustments (interior).
    #[serde(default)]
    pub emotion_delta: HashMap<String, f64>,
    /// New memories to record (interior).
    #[serde(default)]
    pub memory_delta: Vec<String>,
}

impl NpcResponse {
    /// Project onto the fields player characters can perceive.
    pub fn observed(&self) -> ObservedNpcResponse {
        ObservedNpcResponse {
            npc_id: self.npc_id.clone(),
            dialogue: self.dialogue.clone(),
            action: self.action.clone(),
        }
    }
}

/// The observable projection of an [`NpcResponse`].
///
/// By construction this type cannot carry emotion or memory deltas,
/// so anything built from it is safe to reveal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedNpcResponse {
    /// The responding NPC.
    pub npc_id: NpcId,
    /// Spoken reply, if any.
    pub dialogue: Option<String>,
    /// Visible action, if any.
    pub action: Option<String>,
}

/// A world event triggered during the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Unique event id.
    pub event_id: String,
    /// Event category ("spell_slot_recovery", "holiday", ...).
    pub event_type: String,
    /// Player-facing description.
    pub description: String,
    /// Structured effects on the world.
    #[serde(default)]
    pub effects: HashMap<String, serde_json::Value>,
}

/// Everything the player characters can perceive from this turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptibleInfo {
    /// What the players did, verbatim.
    pub player_actions: Vec<String>,
    /// Observable NPC behaviour (no interior state, by type).
    pub npc_responses: Vec<ObservedNpcResponse>,
    /// Events that fired.
    pub events: Vec<GameEvent>,
    /// Current scene description.
    pub scene_description: String,
    /// Entities that changed this turn.
    pub changed_entities: Vec<EntityMention>,
}

/// The DM's narrative reply to one player turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmResponse {
    /// The narrative text shown to the players.
    pub narrative: String,
    /// Events surfaced this turn.
    pub events: Vec<GameEvent>,
    /// The session this turn belongs to.
    pub session_id: SessionId,
    /// In-game clock after the turn.
    pub game_time: DateTime<Utc>,
}
