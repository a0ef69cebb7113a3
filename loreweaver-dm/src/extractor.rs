//! Entity extraction and resolution against the entity store.

use crate::classifier::extract_json;
use loreweaver_provider::ChatMessage;
use loreweaver_scheduler::{ModelScheduler, RequestContext};
use loreweaver_store::{EntityFilter, EntityStore};
use loreweaver_types::{ClassifiedInput, EntityKind, EntityMention, ExtractedEntities};
use serde::Deserialize;
use std::sync::Arc;

const EXTRACT_SYSTEM: &str = "\
You extract game-entity mentions from tabletop-RPG utterances.\n\
Kinds: CHARACTER, NPC, ITEM, SPELL, SKILL, PLACE.\n\
Reply with strict JSON only:\n\
{\"mentions\": [{\"name\": \"...\", \"kind\": \"NPC\"}]}";

#[derive(Deserialize)]
struct RawMentions {
    #[serde(default)]
    mentions: Vec<RawMention>,
}

#[derive(Deserialize)]
struct RawMention {
    name: String,
    kind: String,
}

/// Proposes mentions via the LLM and resolves them against storage.
pub struct EntityExtractor {
    scheduler: Arc<ModelScheduler>,
    entities: Arc<dyn EntityStore>,
}

impl EntityExtractor {
    /// An extractor over the given scheduler and entity store.
    pub fn new(scheduler: Arc<ModelScheduler>, entities: Arc<dyn EntityStore>) -> Self {
        Self { scheduler, entities }
    }

    /// Extract and resolve mentions for one classified input. Any
    /// failure yields an empty mention list; unresolved mentions are
    /// kept with `is_new = true` and are never auto-created.
    pub async fn extract(&self, input: ClassifiedInput) -> ExtractedEntities {
        let mut context = RequestContext::new(vec![ChatMessage::user(format!(
            "Utterance: {}",
            input.input.content
        ))]);
        context.system = Some(EXTRACT_SYSTEM.to_string());
        context.temperature = Some(0.2);
        context.max_tokens = Some(400);

        let response = match self.scheduler.chat(&context).await {
            Ok(response) => response.first_text().unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "entity extraction failed, continuing without mentions");
                return ExtractedEntities::empty(input);
            }
        };

        let Some(raw) = extract_json(&response)
            .and_then(|json| serde_json::from_str::<RawMentions>(&json).ok())
        else {
            tracing::warn!("unparseable extraction response, continuing without mentions");
            return ExtractedEntities::empty(input);
        };

        let mut mentions = Vec::with_capacity(raw.mentions.len());
        for raw_mention in raw.mentions {
            let kind = parse_kind(&raw_mention.kind);
            mentions.push(self.resolve(&raw_mention.name, kind).await);
        }

        ExtractedEntities { input, mentions }
    }

    /// Extract for a batch concurrently, preserving order.
    pub async fn extract_batch(&self, inputs: Vec<ClassifiedInput>) -> Vec<ExtractedEntities> {
        futures::future::join_all(inputs.into_iter().map(|input| self.extract(input))).await
    }

    async fn resolve(&self, surface_name: &str, kind: EntityKind) -> EntityMention {
        let filter = EntityFilter {
            kind: Some(kind),
            name: Some(surface_name.to_string()),
            properties: Default::default(),
        };
        match self.entities.find_entities(&filter, 1, 0).await {
            Ok(found) if !found.is_empty() => {
                EntityMention::resolved(surface_name, kind, found[0].id.clone())
            }
            Ok(_) => EntityMention::unresolved(surface_name, kind),
            Err(err) => {
                tracing::warn!(error = %err, name = surface_name, "entity lookup failed");
                EntityMention::unresolved(surface_name, kind)
            }
        }
    }
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
