//! End-to-end debate flow tests.
//!
//! Drives full runs through the state machine with scripted agents and
//! asserts the transcript shape and the projected event stream.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use debate_forge::agent::{Agent, AgentContext, AgentReply, AgentRole};
use debate_forge::bus::{MessageKind, ToolCallRecord};
use debate_forge::error::{AgentError, AgentResult, ToolError};
use debate_forge::events::{DebateEvent, EventProjector};
use debate_forge::orchestrator::{DebatePhase, DebateRun};
use debate_forge::tools::{EchoToolRouter, ToolRouter};
use debate_forge::RunConfig;

/// Scripted participant with selectable role, latency, failure mode, and
/// optional tool usage during debate turns.
struct ScriptedAgent {
    name: String,
    role: AgentRole,
    delay: Duration,
    fail_on_turn: bool,
    use_tools: bool,
}

impl ScriptedAgent {
    fn debater(name: &str) -> Self {
        Self {
            name: name.to_string(),
            role: AgentRole::Debater,
            delay: Duration::ZERO,
            fail_on_turn: false,
            use_tools: false,
        }
    }

    fn with_role(mut self, role: AgentRole) -> Self {
        self.role = role;
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn failing_turns(mut self) -> Self {
        self.fail_on_turn = true;
        self
    }

    fn tool_user(mut self) -> Self {
        self.use_tools = true;
        self
    }

    fn arc(self) -> Arc<dyn Agent> {
        Arc::new(self)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> AgentRole {
        self.role
    }

    async fn analysis(&self, _ctx: AgentContext) -> AgentResult<AgentReply> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(AgentReply::text(format!("{} analysis", self.name)))
    }

    async fn debate_turn(&self, ctx: AgentContext) -> AgentResult<AgentReply> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_on_turn {
            return Err(AgentError::Llm("backend down".to_string()));
        }

        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
        if self.use_tools {
            if let Some(router) = &ctx.tools {
                let record = router
                    .call(
                        &EchoToolRouter::echo_key(),
                        json!({ "text": format!("evidence for {}", ctx.topic) }),
                    )
                    .await
                    .map_err(|e| AgentError::Tool(e.to_string()))?;
                tool_calls.push(record);
            }
        }

        Ok(AgentReply::text(format!("{} round {}", self.name, ctx.round_no))
            .with_tool_calls(tool_calls))
    }

    async fn propose_consensus(&self, _ctx: AgentContext) -> AgentResult<AgentReply> {
        Ok(AgentReply::text(format!("{} final conclusion", self.name)))
    }
}

fn standard_roster() -> Vec<Arc<dyn Agent>> {
    vec![
        ScriptedAgent::debater("Planner")
            .with_role(AgentRole::Planner)
            .arc(),
        ScriptedAgent::debater("OpenAI").arc(),
        ScriptedAgent::debater("Claude").arc(),
        ScriptedAgent::debater("Gemini").arc(),
        ScriptedAgent::debater("Judge")
            .with_role(AgentRole::Judge)
            .arc(),
    ]
}

/// 3 debaters + planner + judge, 2 rounds. One analysis
/// burst in list order, 2 rounds of 3 turns (round 1 arguments, round 2
/// rebuttals), one judge-authored conclusion, in that overall order.
#[tokio::test]
async fn full_run_produces_canonical_transcript_shape() {
    let mut run = DebateRun::new(RunConfig::new("AI adoption", 2), standard_roster(), None)
        .expect("valid run");
    run.run_to_end().await.expect("run completes");

    let history = run.bus().history();
    assert_eq!(history.len(), 5 + 3 + 3 + 1);

    // Analysis burst, agent-list order, all round 0.
    let analysis = &history[..5];
    assert!(analysis.iter().all(|m| m.kind == MessageKind::Analysis && m.round == 0));
    let order: Vec<&str> = analysis.iter().map(|m| m.agent.as_str()).collect();
    assert_eq!(order, vec!["Planner", "OpenAI", "Claude", "Gemini", "Judge"]);

    // Round 1: all arguments; round 2: all rebuttals; debaters only.
    let round1 = &history[5..8];
    assert!(round1.iter().all(|m| m.kind == MessageKind::Argument && m.round == 1));
    let round2 = &history[8..11];
    assert!(round2.iter().all(|m| m.kind == MessageKind::Rebuttal && m.round == 2));
    for round in [round1, round2] {
        let order: Vec<&str> = round.iter().map(|m| m.agent.as_str()).collect();
        assert_eq!(order, vec!["OpenAI", "Claude", "Gemini"]);
    }

    // Conclusion authored by the judge, round = total_rounds.
    let conclusion = &history[11];
    assert_eq!(conclusion.kind, MessageKind::Conclusion);
    assert_eq!(conclusion.agent, "Judge");
    assert_eq!(conclusion.round, 2);
}

/// Publish order equals agent-list order even when the first-listed agent
/// is the slowest in its round.
#[tokio::test]
async fn slow_agent_keeps_its_list_position() {
    let agents: Vec<Arc<dyn Agent>> = vec![
        ScriptedAgent::debater("tortoise")
            .slow(Duration::from_millis(60))
            .arc(),
        ScriptedAgent::debater("hare").arc(),
    ];
    let mut run = DebateRun::new(RunConfig::new("speed", 1), agents, None).expect("valid run");
    run.run_to_end().await.expect("run completes");

    let turns: Vec<String> = run
        .bus()
        .history()
        .iter()
        .filter(|m| m.kind == MessageKind::Argument)
        .map(|m| m.agent.clone())
        .collect();
    assert_eq!(turns, vec!["tortoise", "hare"]);
}

/// A failing agent yields exactly one error message per round and the run
/// still reaches teardown and terminates.
#[tokio::test]
async fn failing_agent_never_aborts_the_run() {
    let agents: Vec<Arc<dyn Agent>> = vec![
        ScriptedAgent::debater("healthy").arc(),
        ScriptedAgent::debater("broken").failing_turns().arc(),
    ];
    let mut run = DebateRun::new(RunConfig::new("resilience", 2), agents, None).expect("valid run");

    let mut phases = Vec::new();
    while !run.is_done() {
        phases.push(run.step().await.expect("step"));
    }
    assert!(phases.contains(&DebatePhase::Teardown));

    let errors: Vec<_> = run
        .bus()
        .history()
        .iter()
        .filter(|m| m.status.as_deref() == Some("error"))
        .cloned()
        .collect();
    assert_eq!(errors.len(), 2); // one per round
    assert!(errors.iter().all(|m| m.agent == "broken"));
}

/// Event stream for a full run: framing, round banners, message/tool
/// ordering, and conclusion, resumable across polls.
#[tokio::test]
async fn projected_event_stream_matches_run() {
    let agents: Vec<Arc<dyn Agent>> = vec![
        ScriptedAgent::debater("prober").tool_user().arc(),
        ScriptedAgent::debater("peer").arc(),
    ];
    let router: Arc<dyn ToolRouter> = Arc::new(EchoToolRouter::new());
    let mut run = DebateRun::new(
        RunConfig::new("tool use", 1),
        agents,
        Some(router),
    )
    .expect("valid run");

    let bus = run.bus();
    let mut projector = EventProjector::new(run.agents());
    let mut events = Vec::new();
    while !run.is_done() {
        run.step().await.expect("step");
        events.extend(projector.poll(&bus));
    }

    // One system event from the successful tool bootstrap.
    assert!(matches!(events[0], DebateEvent::System { .. }));

    // Round banner precedes the first turn message of the round.
    let banner_pos = events
        .iter()
        .position(|e| matches!(e, DebateEvent::RoundStart { round: 1 }))
        .expect("round.start emitted");
    match &events[banner_pos + 1] {
        DebateEvent::Message { agent, phase, .. } => {
            assert_eq!(agent, "prober");
            assert_eq!(*phase, "argument");
        }
        other => panic!("Expected message after round.start, got {other:?}"),
    }

    // The prober's tool event follows its own message.
    match &events[banner_pos + 2] {
        DebateEvent::Tool { agent, details } => {
            assert_eq!(agent, "prober");
            assert_eq!(details.tool, "local-stub:echo");
        }
        other => panic!("Expected tool event, got {other:?}"),
    }

    assert!(events
        .iter()
        .any(|e| matches!(e, DebateEvent::Conclusion { agent, .. } if agent == "prober")));
}

/// Failed tool bootstrap: the run completes, exactly one System message
/// references the failure, and no tool event is ever emitted.
#[tokio::test]
async fn unreachable_tools_degrade_to_system_notice() {
    struct DeadRouter;

    #[async_trait]
    impl ToolRouter for DeadRouter {
        async fn start(&self) -> Result<(), ToolError> {
            Err(ToolError::StartupFailed("spawn failed".to_string()))
        }
        async fn stop(&self) -> Result<(), ToolError> {
            Ok(())
        }
        fn list_tools(&self) -> Vec<String> {
            Vec::new()
        }
        async fn call(
            &self,
            key: &str,
            _args: serde_json::Value,
        ) -> Result<ToolCallRecord, ToolError> {
            Err(ToolError::UnknownTool {
                key: key.to_string(),
                known: Vec::new(),
            })
        }
    }

    let agents: Vec<Arc<dyn Agent>> = vec![
        ScriptedAgent::debater("solo").tool_user().arc(),
    ];
    let mut run = DebateRun::new(
        RunConfig::new("degraded", 1),
        agents,
        Some(Arc::new(DeadRouter)),
    )
    .expect("valid run");

    let bus = run.bus();
    let mut projector = EventProjector::new(run.agents());
    let mut events = Vec::new();
    while !run.is_done() {
        run.step().await.expect("run survives");
        events.extend(projector.poll(&bus));
    }

    let system_events: Vec<&DebateEvent> = events
        .iter()
        .filter(|e| matches!(e, DebateEvent::System { .. }))
        .collect();
    assert_eq!(system_events.len(), 1);
    match system_events[0] {
        DebateEvent::System { content } => assert!(content.contains("failed")),
        _ => unreachable!(),
    }
    assert!(!events.iter().any(|e| matches!(e, DebateEvent::Tool { .. })));
}

/// `total_rounds = 0`: no argument or rebuttal messages; consensus runs
/// directly after analysis.
#[tokio::test]
async fn zero_rounds_skips_debate_entirely() {
    let mut run = DebateRun::new(RunConfig::new("short", 0), standard_roster(), None)
        .expect("valid run");
    run.run_to_end().await.expect("run completes");

    let history = run.bus().history();
    assert!(history
        .iter()
        .all(|m| !matches!(m.kind, MessageKind::Argument | MessageKind::Rebuttal)));

    let kinds: Vec<MessageKind> = history.iter().map(|m| m.kind).collect();
    assert_eq!(kinds[..5], [MessageKind::Analysis; 5]);
    assert_eq!(*kinds.last().expect("conclusion"), MessageKind::Conclusion);
    assert_eq!(history.last().expect("conclusion").round, 0);
}
