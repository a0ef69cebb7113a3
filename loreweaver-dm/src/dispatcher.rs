//! Per-input-type processors and the task dispatcher.

use async_trait::async_trait;
use loreweaver_types::{
    ClassifiedInput, DispatchedTask, DurationSecs, EntityKind, ExtractedEntities, InputType,
    NpcId, TaskPayload,
};
use regex::Regex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::LazyLock;

/// `NdM±K` dice expressions; count and modifier optional.
static DICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d*)d(\d+)([+-]\d+)?$").expect("dice regex"));

/// One processor per input type.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    /// Build the structured payload for a classified input.
    async fn process(&self, input: &ClassifiedInput, entities: &ExtractedEntities) -> TaskPayload;

    /// Whether this input demands an NPC answer.
    fn requires_npc_response(&self, input: &ClassifiedInput) -> bool;

    /// The NPC that must answer, when one is required.
    fn target_npc(&self, input: &ClassifiedInput) -> Option<NpcId>;

    /// In-game time the payload consumes.
    fn time_cost(&self, payload: &TaskPayload) -> DurationSecs;
}

fn npc_target(input: &ClassifiedInput) -> Option<NpcId> {
    input.target.as_ref().and_then(|t| t.npc_id())
}

// ─── Action ──────────────────────────────────────────────────────────────────

struct ActionProcessor;

/// Seconds per action type.
fn action_seconds(action_type: &str) -> i64 {
    match action_type {
        "cast_spell" => 60,
        "check" => 10,
        "attack" => 5,
        "move" => 30,
        "interact" => 15,
        "search" => 60,
        "rest" => 3600,
        _ => 30,
    }
}

#[async_trait]
impl TaskProcessor for ActionProcessor {
    async fn process(&self, input: &ClassifiedInput, entities: &ExtractedEntities) -> TaskPayload {
        let action_type = input
            .action_type
            .clone()
            .unwrap_or_else(|| "generic".to_string());

        let outcome = match action_type.as_str() {
            "cast_spell" => entities
                .mentions_of_kind(EntityKind::Spell)
                .next()
                .map(|spell| {
                    json!({
                        "spell": spell.surface_name,
                        "spell_id": spell.matched_entity_id,
                        "is_new": spell.is_new,
                    })
                })
                .unwrap_or_else(|| json!({})),
            "check" => entities
                .mentions_of_kind(EntityKind::Skill)
                .next()
                .map(|skill| {
                    json!({
                        "skill": skill.surface_name,
                        "skill_id": skill.matched_entity_id,
                        "is_new": skill.is_new,
                    })
                })
                .unwrap_or_else(|| json!({})),
            "attack" => input
                .target
                .as_ref()
                .map(|t| json!({"target_kind": t.kind, "target_name": t.name}))
                .unwrap_or_else(|| json!({})),
            _ => json!({"entities_involved": entities.mentions.len()}),
        };

        TaskPayload::Action {
            action_type,
            target: input.target.clone(),
            outcome,
        }
    }

    fn requires_npc_response(&self, input: &ClassifiedInput) -> bool {
        npc_target(input).is_some()
    }

    fn target_npc(&self, input: &ClassifiedInput) -> Option<NpcId> {
        npc_target(input)
    }

    fn time_cost(&self, payload: &TaskPayload) -> DurationSecs {
        match payload {
            TaskPayload::Action { action_type, .. } => {
                DurationSecs::from_secs(action_seconds(action_type))
            }
            _ => DurationSecs::from_mins(1),
        }
    }
}

// ─── Dialogue ────────────────────────────────────────────────────────────────

struct DialogueProcessor;

#[async_trait]
impl TaskProcessor for DialogueProcessor {
    async fn process(&self, input: &ClassifiedInput, _entities: &ExtractedEntities) -> TaskPayload {
        TaskPayload::Dialogue {
            speaker: input.input.character_name.clone(),
            content: input.input.content.clone(),
            target: input.target.clone(),
        }
    }

    fn requires_npc_response(&self, input: &ClassifiedInput) -> bool {
        npc_target(input).is_some()
    }

    fn target_npc(&self, input: &ClassifiedInput) -> Option<NpcId> {
        npc_target(input)
    }

    fn time_cost(&self, _payload: &TaskPayload) -> DurationSecs {
        DurationSecs::from_secs(15)
    }
}

// ─── Thought ─────────────────────────────────────────────────────────────────

struct ThoughtProcessor;

#[async_trait]
impl TaskProcessor for ThoughtProcessor {
    async fn process(&self, input: &ClassifiedInput, _entities: &ExtractedEntities) -> TaskPayload {
        TaskPayload::Thought {
            character: input.input.character_name.clone(),
            content: input.input.content.clone(),
        }
    }

    // Thoughts are interior: no NPC ever observes one, even when the
    // extracted entities mention NPCs.
    fn requires_npc_response(&self, _input: &ClassifiedInput) -> bool {
        false
    }

    fn target_npc(&self, _input: &ClassifiedInput) -> Option<NpcId> {
        None
    }

    fn time_cost(&self, _payload: &TaskPayload) -> DurationSecs {
        DurationSecs::ZERO
    }
}

// ─── OOC ─────────────────────────────────────────────────────────────────────

struct OocProcessor;

#[async_trait]
impl TaskProcessor for OocProcessor {
    async fn process(&self, input: &ClassifiedInput, _entities: &ExtractedEntities) -> TaskPayload {
        TaskPayload::Ooc {
            player: input.input.player_id.as_str().to_string(),
            content: input.input.content.clone(),
        }
    }

    fn requires_npc_response(&self, _input: &ClassifiedInput) -> bool {
        false
    }

    fn target_npc(&self, _input: &ClassifiedInput) -> Option<NpcId> {
        None
    }

    fn time_cost(&self, _payload: &TaskPayload) -> DurationSecs {
        DurationSecs::ZERO
    }
}

// ─── Command ─────────────────────────────────────────────────────────────────

struct CommandProcessor;

fn command_seconds(command: &str) -> i64 {
    match command {
        "/end_turn" => 5,
        "/cast" => 60,
        "/roll" => 5,
        "/check_character" | "/check_item" => 0,
        "/save" => 5,
        _ => 5,
    }
}

impl CommandProcessor {
    fn parse(command: &str, arguments: &[String], entities: &ExtractedEntities) -> serde_json::Value {
        match command {
            "/cast" => {
                // Prefer a resolved spell mention; fall back to the
                // first argument as the spell name.
                match entities.mentions_of_kind(EntityKind::Spell).next() {
                    Some(spell) => json!({
                        "command_type": "cast_spell",
                        "spell": spell.surface_name,
                        "spell_id": spell.matched_entity_id,
                        "is_new": spell.is_new,
                        "found_entity": true,
                    }),
                    None => {
                        let spell = arguments.first().cloned();
                        json!({
                            "command_type": "cast_spell",
                            "spell": spell,
                            "spell_id": null,
                            "is_new": spell.is_some(),
                            "found_entity": false,
                        })
                    }
                }
            }
            "/roll" => {
                if let Some(caps) = arguments.first().and_then(|a| DICE_RE.captures(a)) {
                    let count = caps
                        .get(1)
                        .map(|m| m.as_str())
                        .filter(|s| !s.is_empty())
                        .and_then(|s| s.parse::<u32>().ok())
                        .unwrap_or(1);
                    let size = caps[2].parse::<u32>().unwrap_or(20);
                    let modifier = caps
                        .get(3)
                        .and_then(|m| m.as_str().parse::<i32>().ok())
                        .unwrap_or(0);
                    json!({
                        "command_type": "roll_dice",
                        "dice_count": count,
                        "dice_size": size,
                        "modifier": modifier,
                        "raw_input": arguments[0],
                    })
                } else {
                    // No parseable expression: a plain d20.
                    json!({
                        "command_type": "roll_dice",
                        "dice_count": 1,
                        "dice_size": 20,
                        "modifier": 0,
                        "raw_input": arguments.first(),
                    })
                }
            }
            "/check_character" => {
                let character = arguments.first().cloned();
                json!({
                    "command_type": "check_character",
                    "character_name": character,
                    "has_target": character.is_some(),
                })
            }
            _ => json!({
                "command_type": command,
                "arguments": arguments,
                "has_parameters": !arguments.is_empty(),
            }),
        }
    }
}

#[async_trait]
impl TaskProcessor for CommandProcessor {
    async fn process(&self, input: &ClassifiedInput, entities: &ExtractedEntities) -> TaskPayload {
        let raw_input = input.input.content.trim().to_string();
        let mut words = raw_input.split_whitespace();
        let command = words.next().unwrap_or("/").to_string();
        let arguments: Vec<String> = words.map(String::from).collect();
        let parsed = Self::parse(&command, &arguments, entities);

        TaskPayload::Command {
            command,
            arguments,
            raw_input,
            parsed,
        }
    }

    fn requires_npc_response(&self, _input: &ClassifiedInput) -> bool {
        false
    }

    fn target_npc(&self, _input: &ClassifiedInput) -> Option<NpcId> {
        None
    }

    fn time_cost(&self, payload: &TaskPayload) -> DurationSecs {
        match payload {
            TaskPayload::Command { command, .. } => {
                DurationSecs::from_secs(command_seconds(command))
            }
            _ => DurationSecs::from_secs(5),
        }
    }
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

/// Routes each classified input to its type's processor.
pub struct TaskDispatcher {
    processors: HashMap<InputType, Box<dyn TaskProcessor>>,
}

impl TaskDispatcher {
    /// A dispatcher with the five built-in processors.
    pub fn new() -> Self {
        let mut processors: HashMap<InputType, Box<dyn TaskProcessor>> = HashMap::new();
        processors.insert(InputType::Action, Box::new(ActionProcessor));
        processors.insert(InputType::Dialogue, Box::new(DialogueProcessor));
        processors.insert(InputType::Thought, Box::new(ThoughtProcessor));
        processors.insert(InputType::Ooc, Box::new(OocProcessor));
        processors.insert(InputType::Command, Box::new(CommandProcessor));
        Self { processors }
    }

    /// Dispatch one (input, entities) pair into a task.
    pub async fn dispatch(
        &self,
        input: ClassifiedInput,
        entities: ExtractedEntities,
    ) -> DispatchedTask {
        let Some(processor) = self.processors.get(&input.input_type) else {
            return Self::fallback_task(input, entities);
        };

        let payload = processor.process(&input, &entities).await;
        let requires = processor.requires_npc_response(&input);
        let target = processor.target_npc(&input);
        let time_cost = processor.time_cost(&payload);

        match DispatchedTask::new(
            input.input_type,
            input.clone(),
            entities.clone(),
            payload,
            requires,
            target,
            time_cost,
        ) {
            Ok(task) => task,
            Err(err) => {
                tracing::warn!(error = %err, "processor produced an invalid task, using fallback");
                Self::fallback_task(input, entities)
            }
        }
    }

    /// Dispatch pairs concurrently, preserving order.
    pub async fn dispatch_batch(
        &self,
        pairs: Vec<(ClassifiedInput, ExtractedEntities)>,
    ) -> Vec<DispatchedTask> {
        futures::future::join_all(
            pairs
                .into_iter()
                .map(|(input, entities)| self.dispatch(input, entities)),
        )
        .await
    }

    /// The degraded task used when a processor fails: no NPC
    /// involvement, one minute of game time, an OOC payload echoing
    /// the raw content.
    fn fallback_task(input: ClassifiedInput, entities: ExtractedEntities) -> DispatchedTask {
        let payload = TaskPayload::Ooc {
            player: input.input.player_id.as_str().to_string(),
            content: input.input.content.clone(),
        };
        DispatchedTask::new(
            input.input_type,
            input,
            entities,
            payload,
            false,
            None,
            DurationSecs::from_secs(60),
        )
        .expect("fallback task has no NPC requirement")
    }
}

impl Default for TaskDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use loreweaver_types::{PlayerId, PlayerInput, TargetRef};

    fn classified(
        content: &str,
        input_type: InputType,
        action_type: Option<&str>,
        target: Option<TargetRef>,
    ) -> ClassifiedInput {
        ClassifiedInput {
            input: PlayerInput {
                player_id: PlayerId::new("p1"),
                character_name: "Kira".into(),
                content: content.into(),
                timestamp: Utc::now(),
            },
            input_type,
            action_type: action_type.map(String::from),
            target,
        }
    }

    fn npc_target() -> TargetRef {
        TargetRef {
            kind: EntityKind::Npc,
            id: Some("elara".into()),
            name: "Elara".into(),
        }
    }

    async fn dispatch(input: ClassifiedInput) -> DispatchedTask {
        let entities = ExtractedEntities::empty(input.clone());
        TaskDispatcher::new().dispatch(input, entities).await
    }

    #[tokio::test]
    async fn search_action_costs_sixty_seconds_and_no_npc() {
        let task = dispatch(classified(
            "I search the chest",
            InputType::Action,
            Some("search"),
            None,
        ))
        .await;
        assert_eq!(task.time_cost, DurationSecs::from_secs(60));
        assert!(!task.requires_npc_response);
        assert!(task.target_npc_id.is_none());
    }

    #[tokio::test]
    async fn action_time_table_is_honoured() {
        for (action, secs) in [
            ("cast_spell", 60),
            ("check", 10),
            ("attack", 5),
            ("move", 30),
            ("interact", 15),
            ("rest", 3600),
            ("shrug", 30),
        ] {
            let task = dispatch(classified("x", InputType::Action, Some(action), None)).await;
            assert_eq!(task.time_cost, DurationSecs::from_secs(secs), "{action}");
        }
    }

    #[tokio::test]
    async fn dialogue_to_an_npc_requires_its_response() {
        let task = dispatch(classified(
            "Hi, Elara",
            InputType::Dialogue,
            None,
            Some(npc_target()),
        ))
        .await;
        assert_eq!(task.time_cost, DurationSecs::from_secs(15));
        assert!(task.requires_npc_response);
        assert_eq!(task.target_npc_id, Some(NpcId::new("elara")));
    }

    #[tokio::test]
    async fn dialogue_without_npc_target_needs_no_response() {
        let task = dispatch(classified(
            "Anyone hear that?",
            InputType::Dialogue,
            None,
            None,
        ))
        .await;
        assert!(!task.requires_npc_response);
    }

    #[tokio::test]
    async fn thoughts_never_reach_npcs_even_with_an_npc_target() {
        let task = dispatch(classified(
            "I don't trust Elara",
            InputType::Thought,
            None,
            Some(npc_target()),
        ))
        .await;
        assert!(!task.requires_npc_response);
        assert!(task.target_npc_id.is_none());
        assert_eq!(task.time_cost, DurationSecs::ZERO);
    }

    #[tokio::test]
    async fn cast_command_parses_the_spell() {
        let task = dispatch(classified(
            "/cast Fireball",
            InputType::Command,
            Some("/cast"),
            None,
        ))
        .await;
        assert_eq!(task.time_cost, DurationSecs::from_secs(60));
        match &task.payload {
            TaskPayload::Command { parsed, .. } => {
                assert_eq!(parsed["command_type"], "cast_spell");
                assert_eq!(parsed["spell"], "Fireball");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn roll_command_parses_dice_expressions() {
        let task = dispatch(classified(
            "/roll 2d6+3",
            InputType::Command,
            Some("/roll"),
            None,
        ))
        .await;
        match &task.payload {
            TaskPayload::Command { parsed, .. } => {
                assert_eq!(parsed["dice_count"], 2);
                assert_eq!(parsed["dice_size"], 6);
                assert_eq!(parsed["modifier"], 3);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn bare_roll_defaults_to_a_d20() {
        let task = dispatch(classified("/roll", InputType::Command, Some("/roll"), None)).await;
        match &task.payload {
            TaskPayload::Command { parsed, .. } => {
                assert_eq!(parsed["dice_count"], 1);
                assert_eq!(parsed["dice_size"], 20);
                assert_eq!(parsed["modifier"], 0);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn negative_modifiers_parse() {
        let task = dispatch(classified(
            "/roll d8-2",
            InputType::Command,
            Some("/roll"),
            None,
        ))
        .await;
        match &task.payload {
            TaskPayload::Command { parsed, .. } => {
                assert_eq!(parsed["dice_count"], 1);
                assert_eq!(parsed["dice_size"], 8);
                assert_eq!(parsed["modifier"], -2);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn check_character_command_carries_the_name() {
        let task = dispatch(classified(
            "/check_character Kira",
            InputType::Command,
            Some("/check_character"),
            None,
        ))
        .await;
        assert_eq!(task.time_cost, DurationSecs::ZERO);
        match &task.payload {
            TaskPayload::Command { parsed, .. } => {
                assert_eq!(parsed["character_name"], "Kira");
                assert_eq!(parsed["has_target"], true);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ooc_costs_no_time() {
        let task = dispatch(classified(
            "brb, pizza's here",
            InputType::Ooc,
            None,
            None,
        ))
        .await;
        assert_eq!(task.time_cost, DurationSecs::ZERO);
        assert!(!task.requires_npc_response);
    }
}
