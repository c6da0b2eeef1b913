//! Tool routing: optional, budgeted external actions for agents.
//!
//! The core only depends on the [`ToolRouter`] trait; concrete routers
//! (real protocol clients, process transports) live outside. The crate
//! ships one in-process router, [`EchoToolRouter`], used for demos and
//! tests. It exposes a single `echo` tool and needs no subprocess.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;

use crate::bus::ToolCallRecord;
use crate::error::ToolError;

/// Routes tool calls by `server:tool` key to whatever backs them.
///
/// `start` and `stop` are idempotent; `stop` must tolerate partial failure
/// (the orchestrator swallows its errors during teardown). A call with an
/// unknown key fails that call only, never the run.
#[async_trait]
pub trait ToolRouter: Send + Sync {
    /// Brings the router's endpoints up. Idempotent.
    async fn start(&self) -> Result<(), ToolError>;

    /// Tears the router down. Idempotent, best-effort.
    async fn stop(&self) -> Result<(), ToolError>;

    /// Keys of every tool this router can dispatch, as `server:tool`.
    fn list_tools(&self) -> Vec<String>;

    /// Invokes `tool_key` with `args`, returning the full call record.
    async fn call(&self, tool_key: &str, args: serde_json::Value)
        -> Result<ToolCallRecord, ToolError>;
}

/// In-process router exposing a single `local-stub:echo` tool.
#[derive(Debug, Default)]
pub struct EchoToolRouter {
    started: AtomicBool,
}

impl EchoToolRouter {
    const SERVER: &'static str = "local-stub";
    const TOOL: &'static str = "echo";

    /// The only key this router answers to.
    pub fn echo_key() -> String {
        format!("{}:{}", Self::SERVER, Self::TOOL)
    }

    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolRouter for EchoToolRouter {
    async fn start(&self) -> Result<(), ToolError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ToolError> {
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn list_tools(&self) -> Vec<String> {
        vec![Self::echo_key()]
    }

    async fn call(
        &self,
        tool_key: &str,
        args: serde_json::Value,
    ) -> Result<ToolCallRecord, ToolError> {
        if tool_key != Self::echo_key() {
            return Err(ToolError::UnknownTool {
                key: tool_key.to_string(),
                known: self.list_tools(),
            });
        }

        let text = args
            .get("text")
            .or_else(|| args.get("q"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(ToolCallRecord {
            server: Self::SERVER.to_string(),
            tool: Self::TOOL.to_string(),
            args,
            result: json!({ "message": "Echo (local-stub) active", "echo": text }),
        })
    }
}
