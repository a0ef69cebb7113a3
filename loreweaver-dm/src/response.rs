//! Narrative response generation.

use chrono::{DateTime, Utc};
use loreweaver_provider::ChatMessage;
use loreweaver_scheduler::{ModelScheduler, Priority, RequestContext};
use loreweaver_types::{DmResponse, PerceptibleInfo, SessionId, StyleConfig};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A named custom DM style: a full system-prompt override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomDmStyle {
    /// Style name.
    pub name: String,
    /// The full system prompt to narrate with.
    pub system_prompt: String,
}

/// Turns [`PerceptibleInfo`] into the DM's narrative reply.
///
/// The generator only ever sees the perceptible projection of the
/// turn — `PerceptibleInfo` cannot carry NPC interior state by
/// construction, so nothing non-perceptible can leak into a prompt.
pub struct ResponseGenerator {
    scheduler: Arc<ModelScheduler>,
    style: RwLock<StyleConfig>,
    custom_styles: RwLock<HashMap<String, CustomDmStyle>>,
}

const APOLOGY: &str =
    "The DM pauses, gathering the threads of the story. Give me a moment and try again.";

impl ResponseGenerator {
    /// A generator with the given starting style.
    pub fn new(scheduler: Arc<ModelScheduler>, style: StyleConfig) -> Self {
        Self {
            scheduler,
            style: RwLock::new(style),
            custom_styles: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the active style configuration.
    pub fn update_style(&self, style: StyleConfig) {
        *self.style.write().expect("style poisoned") = style;
    }

    /// The active style configuration.
    pub fn style(&self) -> StyleConfig {
        self.style.read().expect("style poisoned").clone()
    }

    /// Register (or replace) a named custom style.
    pub fn register_custom_style(&self, style: CustomDmStyle) {
        self.custom_styles
            .write()
            .expect("custom styles poisoned")
            .insert(style.name.clone(), style);
    }

    /// Remove a custom style. Returns whether it existed.
    pub fn remove_custom_style(&self, name: &str) -> bool {
        self.custom_styles
            .write()
            .expect("custom styles poisoned")
            .remove(name)
            .is_some()
    }

    /// Registered custom style names, sorted.
    pub fn custom_styles(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .custom_styles
            .read()
            .expect("custom styles poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn system_prompt(&self) -> String {
        let style = self.style.read().expect("style poisoned");

        // A named custom style overrides the presets wholesale.
        if let Some(name) = &style.custom_style_name {
            if let Some(custom) = self
                .custom_styles
                .read()
                .expect("custom styles poisoned")
                .get(name)
            {
                return custom.system_prompt.clone();
            }
            if let Some(prompt) = &style.custom_system_prompt {
                return prompt.clone();
            }
            tracing::warn!(style = name, "unknown custom style, using presets");
        }

        format!(
            "You are the dungeon master narrating a tabletop RPG session.\n\
             Voice: {:?}. Tone: {:?}. Combat detail: {:?}.\n\
             Narrate only what the player characters can perceive. Never \
             reveal NPC inner thoughts, feelings, or memories.",
            style.dm_style, style.narrative_tone, style.combat_detail
        )
    }

    fn render_turn(info: &PerceptibleInfo) -> String {
        let mut prompt = String::from("This turn:\n\nPlayer actions:\n");
        for action in &info.player_actions {
            prompt.push_str(&format!("- {action}\n"));
        }
        if !info.npc_responses.is_empty() {
            prompt.push_str("\nNPC behaviour (observable only):\n");
            for npc in &info.npc_responses {
                if let Some(dialogue) = &npc.dialogue {
                    prompt.push_str(&format!("- {} says: \"{dialogue}\"\n", npc.npc_id));
                }
                if let Some(action) = &npc.action {
                    prompt.push_str(&format!("- {} {action}\n", npc.npc_id));
                }
            }
        }
        if !info.events.is_empty() {
            prompt.push_str("\nWorld events:\n");
            for event in &info.events {
                prompt.push_str(&format!("- {}\n", event.description));
            }
        }
        prompt.push_str(&format!("\nScene: {}\n", info.scene_description));
        prompt.push_str("\nWrite the DM narration for this turn.");
        prompt
    }

    /// Generate the narrative for a turn. On model failure, a short
    /// apology keeps the table moving.
    pub async fn generate(
        &self,
        info: &PerceptibleInfo,
        session_id: SessionId,
        game_time: DateTime<Utc>,
    ) -> DmResponse {
        let mut context = RequestContext::new(vec![ChatMessage::user(Self::render_turn(info))]);
        context.system = Some(self.system_prompt());
        context.max_tokens = Some(1000);
        context.temperature = Some(0.8);
        context.priority = Priority::High;

        let narrative = match self.scheduler.chat(&context).await {
            Ok(response) => response
                .first_text()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| APOLOGY.to_string()),
            Err(err) => {
                tracing::error!(error = %err, "narration failed, sending apology");
                APOLOGY.to_string()
            }
        };

        DmResponse {
            narrative,
            events: info.events.clone(),
            session_id,
            game_time,
        }
    }

    /// The apology response used when the pipeline itself fails.
    pub fn fallback(session_id: SessionId, game_time: DateTime<Utc>) -> DmResponse {
        DmResponse {
            narrative: APOLOGY.to_string(),
            events: Vec::new(),
            session_id,
            game_time,
        }
    }
}
