//! The persisted session model: styles, NPC state, the full session
//! state, snapshots, and rollback logs.
//!
//! Everything here round-trips losslessly through JSON — snapshots
//! are only useful if restoring one reproduces the session exactly.

use crate::id::{NpcId, SessionId, SnapshotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Narrative voice presets for the DM.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DmStyle {
    /// Even-handed, rules-forward narration.
    #[default]
    Classic,
    /// Light, joke-friendly narration.
    Humorous,
    /// Dark, consequence-heavy narration.
    Grim,
    /// Sweeping, camera-direction narration.
    Cinematic,
}

/// Overall tone of the narration.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeTone {
    /// Neutral register.
    #[default]
    Balanced,
    /// Elevated, dramatic register.
    Dramatic,
    /// Plain, matter-of-fact register.
    Plain,
}

/// How much combat detail the narration includes.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CombatDetail {
    /// Summarised exchanges.
    #[default]
    Standard,
    /// Blow-by-blow narration.
    Detailed,
    /// One-line summaries.
    Minimal,
}

/// The DM's active style configuration.
///
/// When `custom_style_name` is set, `custom_system_prompt` overrides
/// the preset-derived prompt entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StyleConfig {
    /// Narrative voice preset.
    pub dm_style: DmStyle,
    /// Tone preset.
    pub narrative_tone: NarrativeTone,
    /// Combat detail preset.
    pub combat_detail: CombatDetail,
    /// Name of an active custom style, if any.
    pub custom_style_name: Option<String>,
    /// Full system-prompt override for the custom style.
    pub custom_system_prompt: Option<String>,
}

/// Persisted interior state of one NPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcState {
    /// The NPC this state belongs to.
    pub npc_id: NpcId,
    /// Personality axes, each in [0, 1].
    #[serde(default)]
    pub personality: HashMap<String, f64>,
    /// Current emotional state, each in [0, 1].
    #[serde(default)]
    pub emotions: HashMap<String, f64>,
    /// Summarised memories, newest last.
    #[serde(default)]
    pub memory_summary: Vec<serde_json::Value>,
    /// Relationship scores keyed by character name.
    #[serde(default)]
    pub relationships: HashMap<String, f64>,
}

impl NpcState {
    /// A blank state for a freshly met NPC.
    pub fn blank(npc_id: NpcId) -> Self {
        Self {
            npc_id,
            personality: HashMap::new(),
            emotions: HashMap::new(),
            memory_summary: Vec::new(),
            relationships: HashMap::new(),
        }
    }
}

/// Persisted state of the per-session clock and its rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeManagerState {
    /// Current in-game time.
    pub current_time: DateTime<Utc>,
    /// In-game time when the session started.
    pub session_start: DateTime<Utc>,
    /// Serialised descriptors of registered event rules.
    #[serde(default)]
    pub registered_events: Vec<serde_json::Value>,
}

/// The full serialised state of one game session.
///
/// Invariants: `updated_at ≥ created_at`; when `checksum` is present
/// it matches [`SessionState::compute_checksum`] over the rest of the
/// state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Unique session id.
    pub session_id: SessionId,
    /// The DM agent owning this session.
    pub dm_id: String,
    /// Campaign this session belongs to, if any.
    pub campaign_id: Option<String>,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Current in-game time.
    pub current_time: DateTime<Utc>,
    /// Scene the party currently occupies, if any.
    pub current_scene_id: Option<String>,
    /// Player character names.
    pub player_characters: Vec<String>,
    /// NPCs active in this session.
    pub active_npcs: Vec<NpcId>,
    /// Active style configuration.
    pub style: StyleConfig,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
    /// Wall-clock last-update time.
    pub updated_at: DateTime<Utc>,
    /// Interior state per NPC.
    #[serde(default)]
    pub npc_states: HashMap<String, NpcState>,
    /// Clock and rule state.
    pub time_manager_state: TimeManagerState,
    /// Serialised event-rule descriptors.
    #[serde(default)]
    pub event_rules: Vec<serde_json::Value>,
    /// Registered custom DM styles by name.
    #[serde(default)]
    pub custom_dm_styles: HashMap<String, serde_json::Value>,
    /// Schema version of this serialisation.
    pub version: String,
    /// Integrity checksum over the canonical serialisation.
    pub checksum: Option<String>,
}

impl SessionState {
    /// Compute the checksum of this state: hex FNV-1a-64 over the
    /// canonical JSON (object keys sorted, checksum field cleared).
    ///
    /// Canonicalisation matters: the state holds `HashMap`s whose
    /// iteration order differs per map instance, so hashing a plain
    /// serialisation would give a different checksum for the same
    /// state after a disk round-trip.
    pub fn compute_checksum(&self) -> String {
        let mut cleared = self.clone();
        cleared.checksum = None;
        let value = serde_json::to_value(&cleared).unwrap_or(serde_json::Value::Null);
        let mut canonical = String::new();
        write_canonical_json(&value, &mut canonical);
        format!("{:016x}", fnv1a64(canonical.as_bytes()))
    }

    /// Set `checksum` from the current contents.
    pub fn seal(&mut self) {
        self.checksum = Some(self.compute_checksum());
    }

    /// Whether the stored checksum (if any) matches the contents.
    pub fn checksum_ok(&self) -> bool {
        match &self.checksum {
            Some(stored) => *stored == self.compute_checksum(),
            None => true,
        }
    }
}

/// Render a JSON value with object keys in sorted order, so the
/// output depends only on the contents.
fn write_canonical_json(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical_json(&map[key.as_str()], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_json(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// What caused a snapshot to be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotTrigger {
    /// The DM asked for one.
    Manual,
    /// The runtime's periodic auto-save.
    AutoSave,
    /// Taken automatically before a rollback, so the rollback itself
    /// can be undone.
    BeforeRollback,
    /// A game event requested one.
    EventTriggered,
}

/// A point-in-time copy of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Unique snapshot id.
    pub snapshot_id: SnapshotId,
    /// The session snapshotted.
    pub session_id: SessionId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
    /// Who took it.
    pub created_by: String,
    /// The full session state at snapshot time.
    pub session_state: SessionState,
    /// Search tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether this snapshot was taken automatically.
    pub is_auto: bool,
    /// What caused the snapshot.
    pub trigger: SnapshotTrigger,
}

/// The two operations the rollback log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackAction {
    /// A rollback point was created.
    CreatePoint,
    /// The session was rolled back to a snapshot.
    Rollback,
}

/// One row of the rollback audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackLog {
    /// Unique log id.
    pub log_id: String,
    /// The session acted on.
    pub session_id: SessionId,
    /// The snapshot involved, if any.
    pub snapshot_id: Option<SnapshotId>,
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// Which action was taken.
    pub action: RollbackAction,
    /// Who performed the action.
    pub operator: String,
    /// Summary of the state before the action.
    pub before_state: serde_json::Value,
    /// Summary of the state after the action.
    pub after_state: serde_json::Value,
    /// Conflicts detected during the action, verbatim.
    #[serde(default)]
    pub conflicts: Vec<serde_json::Value>,
    /// How conflicts were resolved, if they were.
    pub resolution: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn npc(id: &str) -> NpcState {
        NpcState {
            npc_id: NpcId::new(id),
            personality: [
                ("kindness".to_string(), 0.8),
                ("patience".to_string(), 0.4),
                ("greed".to_string(), 0.1),
            ]
            .into_iter()
            .collect(),
            emotions: [
                ("trust".to_string(), 0.5),
                ("fear".to_string(), 0.2),
                ("curiosity".to_string(), 0.7),
            ]
            .into_iter()
            .collect(),
            memory_summary: vec![json!({"note": "met the party"})],
            relationships: [("Kira".to_string(), 0.3), ("Tomas".to_string(), 0.1)]
                .into_iter()
                .collect(),
        }
    }

    fn sample_state() -> SessionState {
        let now = Utc::now();
        // Several multi-key maps on purpose: the checksum must not
        // depend on map iteration order.
        let mut npc_states = HashMap::new();
        npc_states.insert("elara".to_string(), npc("elara"));
        npc_states.insert("brennan".to_string(), npc("brennan"));
        npc_states.insert("mirel".to_string(), npc("mirel"));
        let mut custom_dm_styles = HashMap::new();
        custom_dm_styles.insert("noir".to_string(), json!({"system_prompt": "rain"}));
        custom_dm_styles.insert("saga".to_string(), json!({"system_prompt": "verse"}));
        SessionState {
            session_id: SessionId::new("s1"),
            dm_id: "dm-1".into(),
            campaign_id: Some("c1".into()),
            name: "The Sunken Keep".into(),
            description: "A rescue gone wrong".into(),
            current_time: now,
            current_scene_id: Some("scene-3".into()),
            player_characters: vec!["Kira".into(), "Tomas".into()],
            active_npcs: vec![NpcId::new("elara"), NpcId::new("brennan"), NpcId::new("mirel")],
            style: StyleConfig::default(),
            created_at: now,
            updated_at: now,
            npc_states,
            time_manager_state: TimeManagerState {
                current_time: now,
                session_start: now,
                registered_events: vec![json!({"rule": "spell_recovery"})],
            },
            event_rules: vec![json!({"rule_id": "spell_recovery_default"})],
            custom_dm_styles,
            version: "1.0.0".into(),
            checksum: None,
        }
    }

    #[test]
    fn session_state_roundtrip_is_lossless() {
        let state = sample_state();
        let json = serde_json::to_value(&state).unwrap();
        let back: SessionState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn snapshot_roundtrip_is_lossless() {
        let snap = SessionSnapshot {
            snapshot_id: SnapshotId::new("snap-1"),
            session_id: SessionId::new("s1"),
            name: "before the fight".into(),
            description: None,
            created_at: Utc::now(),
            created_by: "dm-1".into(),
            session_state: sample_state(),
            tags: vec!["combat".into()],
            is_auto: false,
            trigger: SnapshotTrigger::Manual,
        };
        let json = serde_json::to_value(&snap).unwrap();
        let back: SessionSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn rollback_log_roundtrip_is_lossless() {
        let log = RollbackLog {
            log_id: "log-1".into(),
            session_id: SessionId::new("s1"),
            snapshot_id: Some(SnapshotId::new("snap-1")),
            timestamp: Utc::now(),
            action: RollbackAction::Rollback,
            operator: "dm-1".into(),
            before_state: json!({"current_scene_id": "scene-3"}),
            after_state: json!({"current_scene_id": "scene-1"}),
            conflicts: vec![json!({"field": "npc_states.elara"})],
            resolution: Some("kept snapshot value".into()),
        };
        let json = serde_json::to_value(&log).unwrap();
        let back: RollbackLog = serde_json::from_value(json).unwrap();
        assert_eq!(back, log);
    }

    #[test]
    fn checksum_detects_tampering() {
        let mut state = sample_state();
        state.seal();
        assert!(state.checksum_ok());

        state.name = "edited".into();
        assert!(!state.checksum_ok());
    }

    #[test]
    fn checksum_is_stable_across_reseal() {
        let mut state = sample_state();
        state.seal();
        let first = state.checksum.clone();
        state.seal();
        assert_eq!(first, state.checksum);
    }

    #[test]
    fn checksum_survives_a_serde_round_trip() {
        // The rollback flow: seal, persist, load, verify. The loaded
        // state rebuilds every HashMap with fresh (randomised)
        // iteration order, so this only holds with a canonical
        // serialisation under the hash.
        let mut state = sample_state();
        state.seal();

        let json = serde_json::to_string(&state).unwrap();
        let restored: SessionState = serde_json::from_str(&json).unwrap();
        assert!(restored.checksum_ok());
        assert_eq!(restored.compute_checksum(), state.compute_checksum());
    }

    #[test]
    fn checksum_ignores_map_insertion_order() {
        let state = sample_state();
        let mut reordered = state.clone();
        // Rebuild the NPC map in a different insertion order.
        let mut npc_states = HashMap::new();
        for key in ["mirel", "brennan", "elara"] {
            npc_states.insert(key.to_string(), reordered.npc_states[key].clone());
        }
        reordered.npc_states = npc_states;

        assert_eq!(state.compute_checksum(), reordered.compute_checksum());
    }

    #[test]
    fn canonical_json_sorts_keys_and_escapes() {
        let value = json!({"b": 1, "a": {"z": [1, 2], "y\"q": null}});
        let mut out = String::new();
        write_canonical_json(&value, &mut out);
        assert_eq!(out, r#"{"a":{"y\"q":null,"z":[1,2]},"b":1}"#);
    }

    #[test]
    fn trigger_serde_names() {
        assert_eq!(
            serde_json::to_string(&SnapshotTrigger::BeforeRollback).unwrap(),
            "\"before_rollback\""
        );
    }
}
