#![deny(missing_docs)]
//! # loreweaver-dm — the per-turn pipeline
//!
//! [`DmAgent::process_player_turn`] drives the eight phases of a turn:
//! classify the inputs (parallel), extract entities (parallel),
//! dispatch typed tasks, then concurrently fan out to NPC agents and
//! advance the session clock, fire event rules, write memories and
//! records, assemble the perceptible slice, and narrate it.
//!
//! Failure policy throughout: a stage failure degrades, it does not
//! abort the turn. A classifier failure becomes an OOC input, a
//! failed extraction an empty mention list, a failed processor a
//! default task, a failed NPC an error entry, and a failed narration
//! a short apology.

mod classifier;
mod dispatcher;
mod dm_agent;
mod extractor;
mod npc_pool;
mod response;
mod time;

pub use classifier::InputClassifier;
pub use dispatcher::{TaskDispatcher, TaskProcessor};
pub use dm_agent::{DmAgent, DmAgentConfig, DmError, SessionStatus};
pub use extractor::EntityExtractor;
pub use npc_pool::{NpcAgentPool, NpcPoolConfig, NpcPoolStatus};
pub use response::{CustomDmStyle, ResponseGenerator};
pub use time::{CalendarRule, CustomRule, EventRule, PeriodicRule, TimeManager, TimeManagerStatus};
