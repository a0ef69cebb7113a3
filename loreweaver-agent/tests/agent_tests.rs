//! Agent strategy selection, status machine, and the bus message loop.

use loreweaver_agent::{Agent, AgentConfig, AgentStatus, Orchestrator, WorkflowStep};
use loreweaver_bus::{BusConfig, MessageBus};
use loreweaver_provider::testing::ScriptedModel;
use loreweaver_reasoning::{EngineFactory, ReasoningMode};
use loreweaver_scheduler::{ModelScheduler, SchedulerConfig};
use loreweaver_tool::{builtin::CalculatorTool, ToolManager};
use loreweaver_types::{AgentId, AgentMessage, MessageType};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn scheduler(replies: &[&str]) -> Arc<ModelScheduler> {
    let mut config = SchedulerConfig::default();
    config.default_provider = "scripted".into();
    config.max_retries = 0;
    let mut scheduler = ModelScheduler::new(config);
    scheduler.register_adapter(Arc::new(ScriptedModel::new(replies)));
    Arc::new(scheduler)
}

fn tools() -> Arc<ToolManager> {
    let manager = ToolManager::new();
    manager.register(Arc::new(CalculatorTool), "math");
    Arc::new(manager)
}

#[tokio::test]
async fn plain_chat_strategy_when_nothing_else_is_wired() {
    let agent = Agent::new(
        AgentConfig::new(AgentId::new("bard"), "You are a bard."),
        scheduler(&["A song of swords and sorrow."]),
        None,
        None,
        None,
    );

    let answer = agent.execute_task("sing something").await.unwrap();
    assert_eq!(answer, "A song of swords and sorrow.");
    assert_eq!(agent.status(), AgentStatus::Idle);

    let history = agent.execution_history(10);
    assert_eq!(history.len(), 1);
    assert!(history[0].ok);
}

#[tokio::test]
async fn reasoning_strategy_wins_when_fully_wired() {
    let mut config = AgentConfig::new(AgentId::new("sage"), "You are a sage.");
    config.reasoning_mode = Some(ReasoningMode::ChainOfThought);
    let agent = Agent::new(
        config,
        scheduler(&["Final answer: the rune means 'danger'."]),
        Some(tools()),
        Some(Arc::new(EngineFactory::new())),
        None,
    );

    let answer = agent.execute_task("read the rune").await.unwrap();
    assert!(answer.contains("danger"));
}

#[tokio::test]
async fn react_strategy_without_a_reasoning_mode() {
    // can_reason is true, but no reasoning_mode is set, so the agent
    // falls through to ReAct over its tools.
    let config = AgentConfig::new(AgentId::new("scout"), "You are a scout.");
    let agent = Agent::new(
        config,
        scheduler(&[
            "Thought: count the tracks\nAction: calculator\nAction Input: {\"expression\": \"3 * 4\"}",
            "Final Answer: a dozen goblins passed here",
        ]),
        Some(tools()),
        None,
        None,
    );

    let answer = agent.execute_task("how many goblins?").await.unwrap();
    assert_eq!(answer, "a dozen goblins passed here");
}

#[tokio::test]
async fn shutdown_is_terminal() {
    let agent = Agent::new(
        AgentConfig::new(AgentId::new("ghost"), ""),
        scheduler(&["boo"]),
        None,
        None,
        None,
    );
    agent.shutdown();
    assert_eq!(agent.status(), AgentStatus::Shutdown);
    assert!(agent.execute_task("anything").await.is_err());
}

#[tokio::test]
async fn request_over_the_bus_gets_a_correlated_response() {
    let bus = Arc::new(MessageBus::new(BusConfig::default()));
    bus.register(&AgentId::new("caller"));

    let agent = Arc::new(Agent::new(
        AgentConfig::new(AgentId::new("oracle"), "You are an oracle."),
        scheduler(&["The stars say yes."]),
        None,
        None,
        Some(Arc::clone(&bus)),
    ));
    agent.start();

    let mut request = AgentMessage::new(
        AgentId::new("caller"),
        AgentId::new("oracle"),
        MessageType::Request,
        json!("will the quest succeed?"),
    );
    request.correlation_id = Some("q-1".into());
    bus.send(request).await.unwrap();

    let reply = bus
        .receive(&AgentId::new("caller"), Duration::from_secs(5))
        .await
        .unwrap()
        .expect("a response should arrive");
    assert_eq!(reply.message_type, MessageType::Response);
    assert_eq!(reply.correlation_id.as_deref(), Some("q-1"));
    assert_eq!(reply.content, json!("The stars say yes."));

    agent.shutdown();
}

#[tokio::test]
async fn orchestrator_routes_and_workflows() {
    let orchestrator = Orchestrator::new();
    let agent = Arc::new(Agent::new(
        AgentConfig::new(AgentId::new("smith"), "You are a smith."),
        scheduler(&["forged"]),
        None,
        None,
        None,
    ));
    orchestrator.register_agent(Arc::clone(&agent));

    let result = orchestrator
        .coordinate("forge a sword", &[AgentId::new("smith")])
        .await
        .unwrap();
    assert_eq!(result, "forged");

    let results = orchestrator
        .execute_workflow(&[
            WorkflowStep {
                agent: AgentId::new("smith"),
                task: "heat the forge".into(),
            },
            WorkflowStep {
                agent: AgentId::new("smith"),
                task: "hammer the blade".into(),
            },
        ])
        .await
        .unwrap();
    assert_eq!(results.len(), 2);

    let missing = orchestrator
        .coordinate("anything", &[AgentId::new("nobody")])
        .await;
    assert!(missing.is_err());

    orchestrator.shutdown_all();
    assert_eq!(agent.status(), AgentStatus::Shutdown);
}
