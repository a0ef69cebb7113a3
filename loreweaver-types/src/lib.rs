#![deny(missing_docs)]
//! # loreweaver-types — shared models for the loreweaver runtime
//!
//! This crate defines the vocabulary every other loreweaver crate
//! speaks: typed identifiers, inter-agent messages, the per-turn game
//! model (player inputs, classified inputs, dispatched tasks, NPC
//! responses, perceptible information), and the persisted session
//! model (session state, snapshots, rollback logs).
//!
//! ## Design principle
//!
//! Types here are data, not behaviour. Anything that talks to an LLM,
//! a store, or another agent lives in the crate that owns that
//! concern; this crate only guarantees that the data those crates
//! exchange is well-formed and serialises losslessly.

pub mod duration;
pub mod error;
pub mod game;
pub mod id;
pub mod message;
pub mod session;

pub use duration::DurationSecs;
pub use error::InvariantError;
pub use game::{
    ClassifiedInput, DispatchedTask, DmResponse, EntityKind, EntityMention, ExtractedEntities,
    GameEvent, InputType, NpcResponse, ObservedNpcResponse, PerceptibleInfo, PlayerInput,
    TargetRef, TaskPayload,
};
pub use id::{AgentId, NpcId, PlayerId, RuleId, SessionId, SnapshotId, TaskId};
pub use message::{AgentMessage, MessageType, BROADCAST_RECEIVER};
pub use session::{
    CombatDetail, DmStyle, NarrativeTone, NpcState, RollbackAction, RollbackLog, SessionSnapshot,
    SessionState, SnapshotTrigger, StyleConfig, TimeManagerState,
};
