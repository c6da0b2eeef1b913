//! Debate state machine.
//!
//! Sequences the phases of one run: `Bootstrap → Analysis → DebateRound*
//! → Consensus → Teardown → Done`. The machine is pull-driven: a host
//! (CLI, web handler, test) calls [`DebateRun::step`] in a loop and polls
//! the event projector between steps, which fully decouples internal phase
//! execution from the external protocol.
//!
//! The round loop is the only cycle and is driven by the live `round_no`
//! checked after each increment, never by a fixed iteration count.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::Agent;
use crate::bus::{Message, TranscriptBus};
use crate::config::RunConfig;
use crate::error::{ConfigError, DebateError};
use crate::phase;
use crate::tools::ToolRouter;

/// The phases a run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebatePhase {
    /// Bring optional tool routing up.
    Bootstrap,
    /// Round-0 analysis burst.
    Analysis,
    /// One barriered debate round (loops while rounds remain).
    DebateRound,
    /// Final synthesis by the judge.
    Consensus,
    /// Release tool routing.
    Teardown,
    /// Terminal state; `step` refuses to run again.
    Done,
}

/// One debate run: configuration, agents, transcript, and phase cursor.
///
/// Exclusively owns its bus for the run's duration; readers get snapshots.
/// Never shared across concurrent runs.
pub struct DebateRun {
    id: Uuid,
    config: RunConfig,
    agents: Vec<Arc<dyn Agent>>,
    bus: Arc<TranscriptBus>,
    tools: Option<Arc<dyn ToolRouter>>,
    /// True when this run started the router and therefore must stop it.
    bootstrapped_tools: bool,
    phase: DebatePhase,
    round_no: u32,
}

impl DebateRun {
    /// Creates a run, applying the fatal configuration checks up front.
    pub fn new(
        config: RunConfig,
        agents: Vec<Arc<dyn Agent>>,
        tools: Option<Arc<dyn ToolRouter>>,
    ) -> Result<Self, DebateError> {
        config.validate()?;
        if agents.is_empty() {
            return Err(ConfigError::NoAgents.into());
        }
        // Names drive the exclude-self context filter and event attribution,
        // so the roster must carry unique, non-empty names regardless of how
        // it was assembled.
        let mut seen: Vec<String> = Vec::new();
        for agent in &agents {
            let name = agent.name();
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyAgentName.into());
            }
            let lowered = name.to_ascii_lowercase();
            if seen.contains(&lowered) {
                return Err(ConfigError::DuplicateAgentName(name.to_string()).into());
            }
            seen.push(lowered);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            config,
            agents,
            bus: Arc::new(TranscriptBus::new()),
            tools,
            bootstrapped_tools: false,
            phase: DebatePhase::Bootstrap,
            round_no: 1,
        })
    }

    /// Unique id for this run.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The run's transcript bus; hand this to an event projector.
    pub fn bus(&self) -> Arc<TranscriptBus> {
        self.bus.clone()
    }

    /// The run's configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The fixed agent list, in turn/display order.
    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    /// Current round counter.
    pub fn round_no(&self) -> u32 {
        self.round_no
    }

    /// Phase the next `step` call will execute.
    pub fn phase(&self) -> DebatePhase {
        self.phase
    }

    /// True once the run has reached its terminal state.
    pub fn is_done(&self) -> bool {
        self.phase == DebatePhase::Done
    }

    /// Executes the current phase and advances to the next one, returning
    /// the phase that ran. Errors only before any phase has executed
    /// (construction validates config) or when called after `Done`.
    pub async fn step(&mut self) -> Result<DebatePhase, DebateError> {
        let executed = self.phase;
        match self.phase {
            DebatePhase::Bootstrap => {
                self.bootstrap_tools().await;
                self.phase = DebatePhase::Analysis;
            }
            DebatePhase::Analysis => {
                phase::run_analysis(&self.agents, &self.bus, &self.config, &self.tools).await;
                self.phase = if self.round_no <= self.config.total_rounds {
                    DebatePhase::DebateRound
                } else {
                    DebatePhase::Consensus
                };
            }
            DebatePhase::DebateRound => {
                phase::run_debate_round(
                    &self.agents,
                    &self.bus,
                    &self.config,
                    &self.tools,
                    self.round_no,
                )
                .await;
                self.round_no += 1;
                // Back-edge decided on the live counter, post-increment.
                self.phase = if self.round_no <= self.config.total_rounds {
                    DebatePhase::DebateRound
                } else {
                    DebatePhase::Consensus
                };
            }
            DebatePhase::Consensus => {
                phase::run_consensus(&self.agents, &self.bus, &self.config, &self.tools).await;
                self.phase = DebatePhase::Teardown;
            }
            DebatePhase::Teardown => {
                self.teardown_tools().await;
                self.phase = DebatePhase::Done;
                info!(run = %self.id, messages = self.bus.len(), "debate complete");
            }
            DebatePhase::Done => return Err(DebateError::RunFinished),
        }
        Ok(executed)
    }

    /// Runs every remaining phase to completion.
    pub async fn run_to_end(&mut self) -> Result<(), DebateError> {
        while !self.is_done() {
            self.step().await?;
        }
        Ok(())
    }

    /// Starts the configured tool router, if any. Failure is non-fatal:
    /// the run records a System message and continues without tools.
    async fn bootstrap_tools(&mut self) {
        let Some(router) = self.tools.clone() else {
            return;
        };

        match router.start().await {
            Ok(()) => {
                self.bootstrapped_tools = true;
                let keys = router.list_tools();
                info!(run = %self.id, tools = ?keys, "tool routing initialised");
                self.bus.publish(Message::system(format!(
                    "Tool routing initialised with tools: {:?}",
                    keys
                )));
            }
            Err(err) => {
                warn!(run = %self.id, error = %err, "tool routing unavailable, continuing without tools");
                self.tools = None;
                self.bus.publish(Message::system(format!(
                    "[Tool routing initialisation failed: {}; continuing without tools]",
                    err
                )));
            }
        }
    }

    /// Stops a router this run started. Best-effort: shutdown must never
    /// crash the run.
    async fn teardown_tools(&mut self) {
        if !self.bootstrapped_tools {
            return;
        }
        if let Some(router) = self.tools.take() {
            if let Err(err) = router.stop().await {
                warn!(run = %self.id, error = %err, "tool routing shutdown failed");
            }
        }
        self.bootstrapped_tools = false;
    }
}
