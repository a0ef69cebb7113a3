//! End-to-end engine runs against a scripted model.

use loreweaver_provider::testing::ScriptedModel;
use loreweaver_reasoning::{
    EngineConfig, EngineFactory, EngineHost, ReActConfig, ReActExecutor, ReasoningMode,
    TaskContext,
};
use loreweaver_scheduler::{ModelScheduler, SchedulerConfig};
use loreweaver_tool::{builtin::CalculatorTool, ToolManager};
use loreweaver_types::AgentId;
use std::sync::Arc;

fn host(replies: &[&str]) -> EngineHost {
    let mut config = SchedulerConfig::default();
    config.default_provider = "scripted".into();
    config.max_retries = 0;
    let mut scheduler = ModelScheduler::new(config);
    scheduler.register_adapter(Arc::new(ScriptedModel::new(replies)));
    EngineHost {
        agent_id: AgentId::new("dm"),
        scheduler: Arc::new(scheduler),
        system_prompt: "You are a dungeon master.".into(),
        max_tokens: Some(500),
        temperature: Some(0.3),
    }
}

fn tools() -> Arc<ToolManager> {
    let manager = ToolManager::new();
    manager.register(Arc::new(CalculatorTool), "math");
    Arc::new(manager)
}

#[tokio::test]
async fn chain_stops_at_the_final_keyword() {
    let host = host(&[
        "The chest looks old and scarred.",
        "The lock bears faint abjuration runes.",
        "Final answer: the chest is magically trapped.",
        "this should never be requested",
    ]);
    let factory = EngineFactory::new();
    let engine = factory
        .create(ReasoningMode::ChainOfThought, EngineConfig::default())
        .unwrap();

    let result = engine
        .process(&host, &TaskContext::new("inspect the chest"), tools())
        .await;
    assert!(result.ok);
    assert_eq!(result.thoughts.len(), 3);
    assert!(result.final_answer.contains("magically trapped"));
    assert_eq!(result.reasoning_path.len(), 3);
}

#[tokio::test]
async fn chain_respects_the_step_budget() {
    let host = host(&["I keep circling the problem."]);
    let factory = EngineFactory::new();
    let mut config = EngineConfig::default();
    config.max_steps = 4;
    let engine = factory
        .create(ReasoningMode::ChainOfThought, config)
        .unwrap();

    let result = engine
        .process(&host, &TaskContext::new("an unsolvable riddle"), tools())
        .await;
    assert!(result.ok);
    assert_eq!(result.thoughts.len(), 4);
}

#[tokio::test]
async fn tree_picks_the_highest_confidence_path() {
    let host = host(&[
        "1. Pick the lock (confidence: 0.4)\n2. Smash it open (confidence: 0.95)",
        "1. Use a crowbar (confidence: 0.92)\n2. Kick it (confidence: 0.2)",
    ]);
    let factory = EngineFactory::new();
    let mut config = EngineConfig::default();
    config.max_depth = 1;
    let engine = factory.create(ReasoningMode::TreeOfThought, config).unwrap();

    let result = engine
        .process(&host, &TaskContext::new("open the chest"), tools())
        .await;
    assert!(result.ok);
    assert_eq!(result.final_answer, "Smash it open");
}

#[tokio::test]
async fn skeleton_synthesises_from_outline_and_details() {
    let host = host(&[
        "1. Scout\n2. Plan\n3. Strike",
        "Scout: the camp sleeps. Plan: hit the east gate. Strike: at dawn.",
        "Strike the sleeping camp through the east gate at dawn.",
    ]);
    let factory = EngineFactory::new();
    let engine = factory
        .create(ReasoningMode::SkeletonOfThought, EngineConfig::default())
        .unwrap();

    let result = engine
        .process(&host, &TaskContext::new("raid the goblin camp"), tools())
        .await;
    assert!(result.ok);
    assert_eq!(result.thoughts.len(), 2);
    assert!(result.final_answer.contains("east gate"));
}

#[tokio::test]
async fn react_executes_a_tool_and_finishes() {
    let host = host(&[
        "Thought: I need the total damage\nAction: calculator\nAction Input: {\"expression\": \"7 + 5\"}",
        "Thought: I have the total\nFinal Answer: the blow deals 12 damage",
    ]);
    let executor = ReActExecutor::new(
        Arc::clone(&host.scheduler),
        tools(),
        ReActConfig::default(),
    );

    let result = executor.execute("compute 7 + 5 damage", &[]).await;
    assert!(result.ok, "error: {:?}", result.error);
    assert_eq!(result.final_answer.as_deref(), Some("the blow deals 12 damage"));
    assert_eq!(result.iterations, 2);

    // Transcript shape: thought, action, observation, thought, final.
    use loreweaver_reasoning::ReActStepKind as K;
    let kinds: Vec<K> = result.steps.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![K::Thought, K::Action, K::Observation, K::Thought, K::FinalAnswer]
    );
    assert!(result.steps[2].content.contains("12"));
}

#[tokio::test]
async fn react_gives_up_after_max_iterations() {
    let host = host(&["Thought: still thinking"]);
    let executor = ReActExecutor::new(
        Arc::clone(&host.scheduler),
        tools(),
        ReActConfig {
            max_iterations: 3,
            ..ReActConfig::default()
        },
    );

    let result = executor.execute("an endless question", &[]).await;
    assert!(!result.ok);
    assert_eq!(result.error.as_deref(), Some("max iterations"));
    assert_eq!(result.iterations, 3);
}

#[tokio::test]
async fn react_surfaces_tool_validation_errors_as_observations() {
    let host = host(&[
        // Missing the required `expression` parameter entirely.
        "Thought: compute\nAction: calculator\nAction Input: {\"wrong\": 1}",
        "Final Answer: giving up gracefully",
    ]);
    let executor = ReActExecutor::new(
        Arc::clone(&host.scheduler),
        tools(),
        ReActConfig::default(),
    );

    let result = executor.execute("bad tool call", &[]).await;
    assert!(result.ok);
    let observation = result
        .steps
        .iter()
        .find(|s| s.kind == loreweaver_reasoning::ReActStepKind::Observation)
        .unwrap();
    assert!(observation.content.contains("error"));
}
