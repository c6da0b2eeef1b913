//! Transcript bus: the append-only, ordered message log for a debate run.
//!
//! The bus is the single source of truth for debate history. Messages are
//! immutable once published and the bus never edits or removes them; every
//! read returns an independent snapshot, so a reader is never affected by
//! publishes that happen after its read. Publish order is the authoritative
//! message order; `created_at` is informational only.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a transcript entry, one per debate phase plus `System`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Round-0 output: a plan, stance, or initial analysis.
    Analysis,
    /// A round-1 debate turn.
    Argument,
    /// A debate turn in rounds after the first.
    Rebuttal,
    /// The final synthesis produced by the consensus phase.
    Conclusion,
    /// Orchestrator housekeeping (tool bootstrap notices, failures).
    System,
}

impl MessageKind {
    /// Returns the uppercase label used in rendered transcript headers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Analysis => "ANALYSIS",
            Self::Argument => "ARGUMENT",
            Self::Rebuttal => "REBUTTAL",
            Self::Conclusion => "CONCLUSION",
            Self::System => "SYSTEM",
        }
    }

    /// The kind used for a debate turn in round `round`.
    pub fn for_round(round: u32) -> Self {
        if round <= 1 {
            Self::Argument
        } else {
            Self::Rebuttal
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One external tool invocation made by an agent during its turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the server hosting the tool.
    pub server: String,
    /// Name of the tool on that server.
    pub tool: String,
    /// Arguments the agent passed.
    pub args: serde_json::Value,
    /// Whatever the tool returned.
    pub result: serde_json::Value,
}

impl ToolCallRecord {
    /// The `server:tool` key used for routing and event display.
    pub fn key(&self) -> String {
        format!("{}:{}", self.server, self.tool)
    }
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Kind of entry.
    pub kind: MessageKind,
    /// Producer identity; non-empty for all kinds but `System`.
    pub agent: String,
    /// Round the message belongs to; 0 for analysis/system entries.
    pub round: u32,
    /// Main text content. May be empty for non-participating agents.
    pub content: String,
    /// Optional evidence metadata, opaque to the core.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<serde_json::Value>,
    /// Tool calls actually made while producing this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Directed recipients; `None` means broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<String>>,
    /// Lifecycle tag reported by the producer ("complete", "error", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// When the message was created. Informational; publish order rules.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a message with the required fields; optional metadata via `with_*`.
    pub fn new(
        kind: MessageKind,
        agent: impl Into<String>,
        round: u32,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            agent: agent.into(),
            round,
            content: content.into(),
            citations: Vec::new(),
            tool_calls: Vec::new(),
            recipients: None,
            status: None,
            created_at: Utc::now(),
        }
    }

    /// Creates an orchestrator-authored system message (round 0).
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageKind::System, "orchestrator", 0, content)
    }

    /// Attaches citation metadata.
    pub fn with_citations(mut self, citations: Vec<serde_json::Value>) -> Self {
        self.citations = citations;
        self
    }

    /// Attaches tool call records.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCallRecord>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Sets the directed recipient list.
    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = Some(recipients);
        self
    }

    /// Sets the lifecycle status tag.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Renders the `[KIND] agent (round R) — status: S` header line.
    pub fn header(&self) -> String {
        let mut header = format!("[{}] {} (round {})", self.kind.label(), self.agent, self.round);
        if let Some(status) = &self.status {
            header.push_str(&format!(" — status: {}", status));
        }
        header
    }
}

/// Append-only, ordered store of [`Message`]s for one debate run.
///
/// Publishes are serialized by an internal mutex so concurrent in-flight
/// agent tasks can never corrupt the log; the bus imposes no ordering
/// guarantee on which publish lands first, only that each is atomic.
/// Snapshots hand out `Arc<Message>` so they stay valid (and immutable)
/// regardless of later growth.
#[derive(Debug, Default)]
pub struct TranscriptBus {
    messages: Mutex<Vec<Arc<Message>>>,
}

impl TranscriptBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to the end of the log. Never fails.
    pub fn publish(&self, message: Message) {
        let mut messages = self.messages.lock().expect("transcript lock not poisoned");
        messages.push(Arc::new(message));
    }

    /// Number of messages published so far.
    pub fn len(&self) -> usize {
        self.messages.lock().expect("transcript lock not poisoned").len()
    }

    /// True if nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the full ordered history as an independent snapshot.
    pub fn history(&self) -> Vec<Arc<Message>> {
        self.messages
            .lock()
            .expect("transcript lock not poisoned")
            .clone()
    }

    /// Returns the canonical "context so far" view for round `round`.
    ///
    /// Round 0 includes only Analysis and System entries; round `r > 0`
    /// includes every kind with `message.round <= r`.
    pub fn history_upto(&self, round: u32) -> Vec<Arc<Message>> {
        self.history()
            .into_iter()
            .filter(|m| {
                if round == 0 {
                    matches!(m.kind, MessageKind::Analysis | MessageKind::System)
                } else {
                    m.round <= round
                }
            })
            .collect()
    }

    /// Renders the subsequence of messages accepted by `filter` into the
    /// headered text form agents consume as prompt context.
    ///
    /// The predicate is injectable so callers can exclude an agent's own
    /// messages or non-participating roles without mutating the bus.
    pub fn render<F>(&self, filter: F) -> String
    where
        F: Fn(&Message) -> bool,
    {
        self.history()
            .iter()
            .filter(|m| filter(m))
            .map(|m| format!("{}:\n{}\n", m.header(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Renders the full history with no exclusions.
    pub fn render_all(&self) -> String {
        self.render(|_| true)
    }
}
