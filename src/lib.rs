//! debate-forge: multi-agent structured debate orchestration.
//!
//! This library coordinates a phased debate (analysis, N barriered debate
//! rounds, consensus) among autonomous agents, keeps the canonical
//! transcript on an append-only bus, and projects transcript growth as a
//! live, ordered event stream for an external consumer.

// Core modules
pub mod agent;
pub mod bus;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod orchestrator;
pub mod phase;
pub mod tools;

// Re-export the types most hosts need
pub use agent::{Agent, AgentContext, AgentReply, AgentRole};
pub use bus::{Message, MessageKind, ToolCallRecord, TranscriptBus};
pub use config::{AgentSpec, RunConfig};
pub use error::{AgentError, ConfigError, DebateError, LlmError, ToolError};
pub use events::{DebateEvent, EventProjector};
pub use orchestrator::{DebatePhase, DebateRun};
pub use tools::ToolRouter;
