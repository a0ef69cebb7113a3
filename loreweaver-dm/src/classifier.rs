//! Input classification via the LLM.

use loreweaver_provider::ChatMessage;
use loreweaver_scheduler::{ModelScheduler, RequestContext};
use loreweaver_types::{ClassifiedInput, EntityKind, InputType, PlayerInput, TargetRef};
use serde::Deserialize;
use std::sync::Arc;

const CLASSIFY_SYSTEM: &str = "\
You classify tabletop-RPG player utterances. Categories:\n\
- action: the character physically does something\n\
- dialogue: the character speaks in-fiction\n\
- thought: interior monologue, not observable\n\
- ooc: out-of-character table talk\n\
- command: a slash command like /roll or /cast\n\
Reply with strict JSON only:\n\
{\"input_type\": \"action|dialogue|thought|ooc|command\",\n \
\"action_type\": \"cast_spell|check|attack|move|interact|search|rest|generic\" or null,\n \
\"target\": {\"kind\": \"NPC|CHARACTER|ITEM|PLACE\", \"id\": \"...\" or null, \"name\": \"...\"} or null}";

#[derive(Deserialize)]
struct RawClassification {
    input_type: String,
    #[serde(default)]
    action_type: Option<String>,
    #[serde(default)]
    target: Option<RawTarget>,
}

#[derive(Deserialize)]
struct RawTarget {
    kind: String,
    #[serde(default)]
    id: Option<String>,
    name: String,
}

/// Classifies utterances into the closed input-type set.
pub struct InputClassifier {
    scheduler: Arc<ModelScheduler>,
    temperature: f64,
}

impl InputClassifier {
    /// A classifier over the given scheduler.
    pub fn new(scheduler: Arc<ModelScheduler>) -> Self {
        Self {
            scheduler,
            temperature: 0.3,
        }
    }

    /// Classify one input. Any failure — model error, bad JSON, an
    /// unknown category — produces the OOC fallback so the turn still
    /// progresses.
    pub async fn classify(&self, input: PlayerInput) -> ClassifiedInput {
        // Slash commands are structural; no model call needed.
        if input.content.trim_start().starts_with('/') {
            let command = input
                .content
                .trim_start()
                .split_whitespace()
                .next()
                .unwrap_or("/")
                .to_string();
            return ClassifiedInput {
                input,
                input_type: InputType::Command,
                action_type: Some(command),
                target: None,
            };
        }

        let mut context = RequestContext::new(vec![ChatMessage::user(format!(
            "Character: {}\nUtterance: {}",
            input.character_name, input.content
        ))]);
        context.system = Some(CLASSIFY_SYSTEM.to_string());
        context.temperature = Some(self.temperature);
        context.max_tokens = Some(300);

        let response = match self.scheduler.chat(&context).await {
            Ok(response) => response.first_text().unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "classification failed, defaulting to ooc");
                return ClassifiedInput::fallback_ooc(input);
            }
        };

        match parse_classification(&response) {
            Some((input_type, action_type, target)) => ClassifiedInput {
                input,
                input_type,
                action_type,
                target,
            },
            None => {
                tracing::warn!(response = %response, "unparseable classification, defaulting to ooc");
                ClassifiedInput::fallback_ooc(input)
            }
        }
    }

    /// Classify a batch concurrently, preserving input order.
    pub async fn classify_batch(&self, inputs: Vec<PlayerInput>) -> Vec<ClassifiedInput> {
        futures::future::join_all(inputs.into_iter().map(|input| self.classify(input))).await
    }
}

fn parse_classification(
    response: &str,
) -> Option<(InputType, Option<String>, Option<TargetRef>)> {
    let json = extract_json(response)?;
    let raw: RawClassification = serde_json::from_str(&json).ok()?;

    let input_type = match raw.input_type.to_lowercase().as_str() {
        "action" => InputType::Action,
        "dialogue" => InputType::Dialogue,
        "thought" => InputType::Thought,
        "ooc" => InputType::Ooc,
        "command" => InputType::Command,
        _ => return None,
    };
    let target = raw.target.map(|t| TargetRef {
        kind: parse_kind(&t.kind),
        id: t.id,
        name: t.name,
    });
    Some((input_type, raw.action_type, target))
}

fn parse_kind(raw: &str) -> EntityKind {
    match raw.to_uppercase().as_str() {
        "NPC" => EntityKind::Npc,
        "CHARACTER" => EntityKind::Character,
        "ITEM" => EntityKind::Item,
        "SPELL" => EntityKind::Spell,
        "SKILL" => EntityKind::Skill,
        "PLACE" => EntityKind::Place,
        _ => EntityKind::Other,
    }
}

/// Tolerant JSON extraction: strip code fences, then take the span
/// from the first `{` to the last `}`.
pub(crate) fn extract_json(text: &str) -> Option<String> {
    let stripped = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end < start {
        return None;
    }
    Some(stripped[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_strips_fences_and_prose() {
        let text = "Sure!\n```json\n{\"input_type\": \"action\"}\n```";
        assert_eq!(extract_json(text).unwrap(), "{\"input_type\": \"action\"}");

        let bare = "{\"a\": 1}";
        assert_eq!(extract_json(bare).unwrap(), bare);

        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn classification_parses_type_action_and_target() {
        let (input_type, action_type, target) = parse_classification(
            r#"{"input_type": "action", "action_type": "search", "target": {"kind": "ITEM", "id": null, "name": "chest"}}"#,
        )
        .unwrap();
        assert_eq!(input_type, InputType::Action);
        assert_eq!(action_type.as_deref(), Some("search"));
        let target = target.unwrap();
        assert_eq!(target.kind, EntityKind::Item);
        assert_eq!(target.name, "chest");
    }

    #[test]
    fn unknown_categories_are_rejected() {
        assert!(parse_classification(r#"{"input_type": "interpretive_dance"}"#).is_none());
    }
}
