#![deny(missing_docs)]
//! # loreweaver-store — persistence contracts and implementations
//!
//! Traits for the three storage families the runtime consumes — a
//! graph-style entity store, a TTL key-value cache, and a rooted file
//! store — plus the session-persistence layer: session, snapshot, and
//! rollback-log repositories, the [`RollbackManager`] that ties them
//! together atomically per session, and the provider
//! [`ProfileManager`].
//!
//! Every query-like operation takes parameters; nothing here
//! concatenates user input into a query string. All file access
//! resolves against a configured root and rejects traversal.

mod entity;
mod error;
mod file;
mod fs_repos;
mod kv;
mod memory_repos;
mod profile;
mod records;
mod rollback;
mod session;

pub use entity::{EntityFilter, EntityRecord, EntityStore, MemoryEntityStore, Relationship};
pub use error::StoreError;
pub use file::{FileStat, FileStore};
pub use fs_repos::{FsRollbackRepository, FsSessionRepository, FsSnapshotRepository};
pub use kv::{KvCache, MemoryKvCache};
pub use memory_repos::{
    MemoryRollbackRepository, MemorySessionRepository, MemorySnapshotRepository,
};
pub use profile::{ProfileManager, ProviderProfile};
pub use records::{GameRecord, GameRecordKind, GameRecordRepository, MemoryGameRecordStore};
pub use rollback::RollbackManager;
pub use session::{
    RollbackRepository, SessionFilter, SessionPatch, SessionRepository, SnapshotRepository,
};
