#![deny(missing_docs)]
//! # loreweaver — umbrella crate
//!
//! A single import surface for the loreweaver runtime: the DM turn
//! pipeline and the agent/tool/reasoning substrate it runs on.
//! Re-exports member crates behind feature flags, plus a `prelude`
//! for the happy path.

#[cfg(feature = "core")]
pub use loreweaver_agent;
#[cfg(feature = "core")]
pub use loreweaver_bus;
#[cfg(feature = "dm")]
pub use loreweaver_dm;
#[cfg(feature = "monitor")]
pub use loreweaver_monitor;
#[cfg(feature = "core")]
pub use loreweaver_provider;
#[cfg(feature = "provider-anthropic")]
pub use loreweaver_provider_anthropic;
#[cfg(feature = "provider-ollama")]
pub use loreweaver_provider_ollama;
#[cfg(feature = "provider-openai")]
pub use loreweaver_provider_openai;
#[cfg(feature = "provider-openrouter")]
pub use loreweaver_provider_openrouter;
#[cfg(feature = "core")]
pub use loreweaver_reasoning;
#[cfg(feature = "core")]
pub use loreweaver_scheduler;
#[cfg(feature = "core")]
pub use loreweaver_store;
#[cfg(feature = "core")]
pub use loreweaver_tool;
#[cfg(feature = "core")]
pub use loreweaver_types;

/// Happy-path imports for running a table.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use loreweaver_agent::{Agent, AgentConfig, Orchestrator};
    #[cfg(feature = "core")]
    pub use loreweaver_bus::{BusConfig, MessageBus};
    #[cfg(feature = "dm")]
    pub use loreweaver_dm::{DmAgent, DmAgentConfig};
    #[cfg(feature = "provider-anthropic")]
    pub use loreweaver_provider_anthropic::Anthropic;
    #[cfg(feature = "provider-ollama")]
    pub use loreweaver_provider_ollama::Ollama;
    #[cfg(feature = "provider-openai")]
    pub use loreweaver_provider_openai::OpenAi;
    #[cfg(feature = "provider-openrouter")]
    pub use loreweaver_provider_openrouter::OpenRouter;
    #[cfg(feature = "core")]
    pub use loreweaver_provider::{ModelAdapter, ProviderConfig};
    #[cfg(feature = "core")]
    pub use loreweaver_reasoning::{EngineFactory, ReasoningMode};
    #[cfg(feature = "core")]
    pub use loreweaver_scheduler::{ModelScheduler, RequestContext, SchedulerConfig};
    #[cfg(feature = "core")]
    pub use loreweaver_store::{
        FsSessionRepository, MemoryEntityStore, ProfileManager, RollbackManager,
    };
    #[cfg(feature = "core")]
    pub use loreweaver_tool::{Tool, ToolManager, ToolRegistry};
    #[cfg(feature = "core")]
    pub use loreweaver_types::{
        AgentId, AgentMessage, MessageType, NpcId, PlayerInput, SessionId, SessionState,
    };
}
