//! CLI command definitions for debate-forge.
//!
//! The `run` command assembles a roster (optional planner, model-backed
//! debaters, judge), drives the debate state machine step by step, and
//! prints one JSON-encoded event per line, terminated by a `run.end`
//! sentinel. It is the reference implementation of the external consumer.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use crate::agent::{Agent, JudgeAgent, ModelAgent, PlannerAgent};
use crate::config::{AgentSpec, RunConfig};
use crate::error::ConfigError;
use crate::events::{DebateEvent, EventProjector};
use crate::llm::ChatClient;
use crate::orchestrator::DebateRun;
use crate::tools::{EchoToolRouter, ToolRouter};

/// Default model for agents without an explicit `NAME=MODEL` spec.
const DEFAULT_MODEL: &str = "openai/gpt-5-mini";

/// Perspective hints rotated across debaters that have none assigned.
const ROLE_HINTS: &[&str] = &[
    "optimistic futurist",
    "cautious pragmatist",
    "policy and operations skeptic",
];

/// Multi-agent structured debate orchestrator.
#[derive(Parser)]
#[command(name = "debate-forge")]
#[command(about = "Run multi-agent structured debates with live event streaming")]
#[command(version)]
#[command(
    long_about = "debate-forge orchestrates a phased debate (analysis, N barriered rounds, \
consensus) among LLM-backed agents and streams the transcript as JSON-line events.\n\n\
Example usage:\n  debate-forge run \"Will Rust dominate systems programming?\" --rounds 3"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run a debate and stream its events to stdout.
    Run(RunArgs),
}

/// Arguments for `debate-forge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// The debate topic.
    pub topic: String,

    /// Number of debate rounds (0 = analysis straight to consensus).
    #[arg(short, long, default_value = "3")]
    pub rounds: u32,

    /// Comma-separated debater specs, NAME or NAME=MODEL.
    #[arg(short, long, default_value = "OpenAI,Claude,Gemini")]
    pub agents: String,

    /// Model for agents without an explicit spec model.
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Model for the judge.
    #[arg(long)]
    pub judge_model: Option<String>,

    /// Skip the rule-setting planner.
    #[arg(long)]
    pub no_planner: bool,

    /// Run the analysis phase sequentially instead of concurrently.
    #[arg(long)]
    pub sequential_analysis: bool,

    /// Tool calls each agent may make per round.
    #[arg(long, default_value = "3")]
    pub tool_budget: u32,

    /// Enable the in-process echo tool router (demo tooling).
    #[arg(long)]
    pub echo_tools: bool,

    /// API key for the chat completions endpoint.
    #[arg(long, env = "DEBATE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, env = "DEBATE_API_BASE", default_value = "https://openrouter.ai/api/v1")]
    pub api_base: String,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the parsed CLI command.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_debate(args).await,
    }
}

fn emit(event: &DebateEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(err) => println!(
            "{{\"type\":\"error\",\"message\":\"serialize failed: {}\"}}",
            err
        ),
    }
}

/// Builds the roster and drives the run, streaming events as they appear.
async fn run_debate(args: RunArgs) -> anyhow::Result<()> {
    let api_key = args.api_key.clone().ok_or(ConfigError::MissingApiKey)?;

    let tools: Option<Arc<dyn ToolRouter>> = if args.echo_tools {
        Some(Arc::new(EchoToolRouter::new()))
    } else {
        None
    };
    let tool_allowlist = tools.as_ref().map(|t| t.list_tools()).unwrap_or_default();

    let specs = AgentSpec::parse_list(&args.agents)?;

    let mut agents: Vec<Arc<dyn Agent>> = Vec::new();
    if !args.no_planner {
        agents.push(Arc::new(PlannerAgent::new("Planner")));
    }
    for (i, spec) in specs.iter().enumerate() {
        let model = spec.model.as_deref().unwrap_or(&args.model);
        let completer = Arc::new(ChatClient::new(&args.api_base, &api_key, model));
        agents.push(Arc::new(
            ModelAgent::new(&spec.name, completer)
                .with_role_hint(ROLE_HINTS[i % ROLE_HINTS.len()])
                .with_tools(tool_allowlist.clone(), args.tool_budget),
        ));
    }
    let judge_model = args.judge_model.as_deref().unwrap_or(&args.model);
    agents.push(Arc::new(JudgeAgent::new(
        "Judge",
        Arc::new(ChatClient::new(&args.api_base, &api_key, judge_model)),
    )));

    let config = RunConfig::new(&args.topic, args.rounds)
        .with_parallel_analysis(!args.sequential_analysis)
        .with_tool_budget(args.tool_budget);

    let mut run = DebateRun::new(config, agents, tools)?;
    let bus = run.bus();
    let mut projector = EventProjector::new(run.agents());

    info!(run = %run.id(), topic = %args.topic, rounds = args.rounds, "debate starting");
    emit(&DebateEvent::run_start(&args.topic, run.agents(), args.rounds));

    while !run.is_done() {
        if let Err(err) = run.step().await {
            emit(&DebateEvent::Error {
                message: err.to_string(),
            });
            emit(&DebateEvent::RunEnd);
            return Err(err.into());
        }
        for event in projector.poll(&bus) {
            emit(&event);
        }
    }

    emit(&DebateEvent::RunEnd);
    Ok(())
}
