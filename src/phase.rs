//! Phase executor: runs one debate phase against the transcript bus.
//!
//! Each phase selects its applicable agent subset, fans out the matching
//! capability call, waits for every draft at a join-all barrier, and only
//! then publishes the results in the fixed agent-list order, no matter
//! which task finished first. Publishing never happens inside the fan-out
//! tasks, which is what keeps the bus ordering deterministic and makes the
//! bus mutex uncontended in practice.
//!
//! An individual agent failure is captured at per-agent granularity and
//! published as a `status = "error"` message; a phase never aborts because
//! one agent failed.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use crate::agent::{Agent, AgentContext, AgentReply};
use crate::bus::{Message, MessageKind, TranscriptBus};
use crate::config::RunConfig;
use crate::tools::ToolRouter;

/// One collected draft, ready to publish.
struct Draft {
    agent: String,
    kind: MessageKind,
    reply: AgentReply,
}

impl Draft {
    fn into_message(self, round: u32) -> Message {
        let mut message = Message::new(self.kind, self.agent, round, self.reply.text)
            .with_citations(self.reply.citations)
            .with_tool_calls(self.reply.tool_calls);
        if let Some(status) = self.reply.status {
            message = message.with_status(status);
        }
        message
    }
}

/// Converts a failed capability call into an error draft for the phase.
fn error_reply(agent: &str, phase: &str, err: impl std::fmt::Display) -> AgentReply {
    AgentReply {
        text: format!("[{} error during {}: {}]", agent, phase, err),
        status: Some("error".to_string()),
        ..AgentReply::default()
    }
}

fn agent_context(
    topic: &str,
    round_no: u32,
    history: String,
    config: &RunConfig,
    tools: &Option<Arc<dyn ToolRouter>>,
) -> AgentContext {
    AgentContext::new(topic, round_no, history)
        .with_tools(tools.clone(), config.tool_budget_per_round)
}

/// Runs the analysis phase across all agents (non-participating roles
/// included, since the planner speaks here). Execution mode follows
/// `config.parallel_analysis`; publish order is always the list order.
pub async fn run_analysis(
    agents: &[Arc<dyn Agent>],
    bus: &TranscriptBus,
    config: &RunConfig,
    tools: &Option<Arc<dyn ToolRouter>>,
) {
    info!(agents = agents.len(), parallel = config.parallel_analysis, "analysis phase");

    let draft_one = |agent: Arc<dyn Agent>| {
        let history = bus.render_all();
        let ctx = agent_context(&config.topic, 0, history, config, tools);
        async move {
            let reply = match agent.analysis(ctx).await {
                Ok(reply) => reply,
                Err(err) => error_reply(agent.name(), "analysis", err),
            };
            Draft {
                agent: agent.name().to_string(),
                kind: MessageKind::Analysis,
                reply,
            }
        }
    };

    let drafts: Vec<Draft> = if config.parallel_analysis {
        join_all(agents.iter().cloned().map(draft_one)).await
    } else {
        let mut drafts = Vec::with_capacity(agents.len());
        for agent in agents {
            drafts.push(draft_one(agent.clone()).await);
        }
        drafts
    };

    for draft in drafts {
        bus.publish(draft.into_message(0));
    }
}

/// Runs one barriered debate round.
///
/// Every participating agent drafts concurrently against the same frozen
/// pre-round transcript; its view excludes its own prior messages and all
/// messages authored by non-participating roles (planner/judge), keeping
/// rule-setting and judging content out of peer context while leaving it
/// in the full transcript.
pub async fn run_debate_round(
    agents: &[Arc<dyn Agent>],
    bus: &TranscriptBus,
    config: &RunConfig,
    tools: &Option<Arc<dyn ToolRouter>>,
    round: u32,
) {
    let participants: Vec<Arc<dyn Agent>> = agents
        .iter()
        .filter(|a| a.participates())
        .cloned()
        .collect();

    let spectators: Vec<String> = agents
        .iter()
        .filter(|a| !a.participates())
        .map(|a| a.name().to_string())
        .collect();

    info!(round, participants = participants.len(), "debate round phase");

    let kind = MessageKind::for_round(round);

    let draft_one = |agent: Arc<dyn Agent>| {
        let name = agent.name().to_string();
        let history = bus.render(|m| m.agent != name && !spectators.contains(&m.agent));
        let ctx = agent_context(&config.topic, round, history, config, tools);
        async move {
            let reply = match agent.debate_turn(ctx).await {
                Ok(reply) => reply,
                Err(err) => error_reply(agent.name(), &format!("debate round {}", round), err),
            };
            Draft {
                agent: agent.name().to_string(),
                kind,
                reply,
            }
        }
    };

    // Barrier: every draft completes before the first publish.
    let drafts: Vec<Draft> = join_all(participants.iter().cloned().map(draft_one)).await;

    for draft in drafts {
        let recipients: Vec<String> = participants
            .iter()
            .map(|a| a.name().to_string())
            .filter(|n| n != &draft.agent)
            .collect();
        bus.publish(draft.into_message(round).with_recipients(recipients));
    }
}

/// Runs the consensus phase on the judge-role agent, falling back to the
/// first agent when no judge is configured. Context is the full transcript.
pub async fn run_consensus(
    agents: &[Arc<dyn Agent>],
    bus: &TranscriptBus,
    config: &RunConfig,
    tools: &Option<Arc<dyn ToolRouter>>,
) {
    let finaliser = agents
        .iter()
        .find(|a| a.role() == crate::agent::AgentRole::Judge)
        .or_else(|| agents.first())
        .expect("agent list validated non-empty before the run");

    debug!(finaliser = finaliser.name(), "consensus phase");

    let ctx = agent_context(
        &config.topic,
        config.total_rounds,
        bus.render_all(),
        config,
        tools,
    );

    let reply = match finaliser.propose_consensus(ctx).await {
        Ok(reply) => reply,
        Err(err) => error_reply(finaliser.name(), "consensus proposal", err),
    };

    let draft = Draft {
        agent: finaliser.name().to_string(),
        kind: MessageKind::Conclusion,
        reply,
    };
    bus.publish(draft.into_message(config.total_rounds));
}
