//! Event projection: turning transcript growth into a live event stream.
//!
//! The [`EventProjector`] keeps a cursor over the bus and, on each poll,
//! translates every message appended since the last poll into
//! externally-meaningful [`DebateEvent`]s. It re-derives nothing: every
//! event is a direct projection of message fields. Emission order equals
//! bus append order, and a message's `tool` events always follow its
//! `message`/`conclusion` event.
//!
//! `run.start`, `run.end`, and `error` frame the stream and are emitted by
//! the driver, not by the projector.

use serde::Serialize;

use crate::agent::{Agent, AgentRole};
use crate::bus::{MessageKind, TranscriptBus};

/// Roster entry in a `run.start` event.
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub name: String,
    pub role: &'static str,
}

/// Payload of one `tool` event.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDetails {
    /// Target as `server:tool`.
    pub tool: String,
    pub args: serde_json::Value,
    pub result: serde_json::Value,
}

/// Events consumed by the external streaming transport, serialized as one
/// JSON object each, discriminated by `"type"`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum DebateEvent {
    /// The run is starting; carries the roster and round plan.
    #[serde(rename = "run.start")]
    RunStart {
        topic: String,
        agents: Vec<RosterEntry>,
        total_rounds: u32,
    },
    /// First message of a new debate round observed.
    #[serde(rename = "round.start")]
    RoundStart { round: u32 },
    /// An analysis, argument, or rebuttal message.
    #[serde(rename = "message")]
    Message {
        agent: String,
        role: &'static str,
        phase: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        round: Option<u32>,
        content: String,
    },
    /// The final conclusion.
    #[serde(rename = "conclusion")]
    Conclusion { agent: String, content: String },
    /// Orchestrator housekeeping.
    #[serde(rename = "system")]
    System { content: String },
    /// One tool call made while producing the preceding message.
    #[serde(rename = "tool")]
    Tool { agent: String, details: ToolDetails },
    /// The run failed before completing.
    #[serde(rename = "error")]
    Error { message: String },
    /// Sentinel: no more events will follow.
    #[serde(rename = "run.end")]
    RunEnd,
}

impl DebateEvent {
    /// Builds the `run.start` framing event from the fixed agent list.
    pub fn run_start(topic: impl Into<String>, agents: &[std::sync::Arc<dyn Agent>], total_rounds: u32) -> Self {
        Self::RunStart {
            topic: topic.into(),
            agents: agents
                .iter()
                .map(|a| RosterEntry {
                    name: a.name().to_string(),
                    role: a.role().display_name(),
                })
                .collect(),
            total_rounds,
        }
    }
}

/// Cursor-based projector over a strictly-growing [`TranscriptBus`].
///
/// Resumable: each poll scans only messages past the cursor, so a polling
/// loop never re-emits what it has already seen.
#[derive(Debug, Default)]
pub struct EventProjector {
    /// Messages already projected.
    cursor: usize,
    /// Last round a `round.start` was emitted for.
    current_round: Option<u32>,
    /// Agent name → role label, fixed for the run.
    roles: Vec<(String, &'static str)>,
}

impl EventProjector {
    /// Creates a projector that knows the run's roster (for role labels).
    pub fn new(agents: &[std::sync::Arc<dyn Agent>]) -> Self {
        Self {
            cursor: 0,
            current_round: None,
            roles: agents
                .iter()
                .map(|a| (a.name().to_string(), a.role().display_name()))
                .collect(),
        }
    }

    fn role_label(&self, agent: &str) -> &'static str {
        self.roles
            .iter()
            .find(|(name, _)| name == agent)
            .map(|(_, role)| *role)
            .unwrap_or(AgentRole::Debater.display_name())
    }

    /// Number of messages already projected.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Projects every message appended since the last poll.
    pub fn poll(&mut self, bus: &TranscriptBus) -> Vec<DebateEvent> {
        let history = bus.history();
        let mut events = Vec::new();

        for message in history.iter().skip(self.cursor) {
            match message.kind {
                MessageKind::Analysis => {
                    events.push(DebateEvent::Message {
                        agent: message.agent.clone(),
                        role: self.role_label(&message.agent),
                        phase: "analysis",
                        round: None,
                        content: message.content.clone(),
                    });
                }
                MessageKind::Argument | MessageKind::Rebuttal => {
                    if self.current_round != Some(message.round) {
                        self.current_round = Some(message.round);
                        events.push(DebateEvent::RoundStart {
                            round: message.round,
                        });
                    }
                    events.push(DebateEvent::Message {
                        agent: message.agent.clone(),
                        role: self.role_label(&message.agent),
                        phase: if message.kind == MessageKind::Argument {
                            "argument"
                        } else {
                            "rebuttal"
                        },
                        round: Some(message.round),
                        content: message.content.clone(),
                    });
                }
                MessageKind::Conclusion => {
                    events.push(DebateEvent::Conclusion {
                        agent: message.agent.clone(),
                        content: message.content.clone(),
                    });
                }
                MessageKind::System => {
                    events.push(DebateEvent::System {
                        content: message.content.clone(),
                    });
                }
            }

            // Tool events trail the message they belong to.
            for call in &message.tool_calls {
                events.push(DebateEvent::Tool {
                    agent: message.agent.clone(),
                    details: ToolDetails {
                        tool: call.key(),
                        args: call.args.clone(),
                        result: call.result.clone(),
                    },
                });
            }
        }

        self.cursor = history.len();
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Message, ToolCallRecord};
    use serde_json::json;

    fn bus_with_round_one() -> TranscriptBus {
        let bus = TranscriptBus::new();
        bus.publish(Message::new(MessageKind::Analysis, "alice", 0, "plan"));
        bus.publish(Message::new(MessageKind::Argument, "alice", 1, "claim"));
        bus.publish(Message::new(MessageKind::Argument, "bob", 1, "counter"));
        bus
    }

    fn empty_projector() -> EventProjector {
        EventProjector::new(&[])
    }

    #[test]
    fn test_round_start_emitted_once_per_round() {
        let bus = bus_with_round_one();
        bus.publish(Message::new(MessageKind::Rebuttal, "alice", 2, "reply"));

        let events = empty_projector().poll(&bus);
        let round_starts: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                DebateEvent::RoundStart { round } => Some(*round),
                _ => None,
            })
            .collect();
        assert_eq!(round_starts, vec![1, 2]);
    }

    #[test]
    fn test_cursor_makes_polling_resumable() {
        let bus = bus_with_round_one();
        let mut projector = empty_projector();

        let first = projector.poll(&bus);
        assert_eq!(first.len(), 4); // analysis + round.start + 2 messages
        assert!(projector.poll(&bus).is_empty());

        bus.publish(Message::new(MessageKind::Conclusion, "judge", 1, "done"));
        let second = projector.poll(&bus);
        assert_eq!(second.len(), 1);
        assert!(matches!(second[0], DebateEvent::Conclusion { .. }));
    }

    #[test]
    fn test_tool_events_follow_their_message() {
        let bus = TranscriptBus::new();
        bus.publish(
            Message::new(MessageKind::Argument, "alice", 1, "claim").with_tool_calls(vec![
                ToolCallRecord {
                    server: "local-stub".to_string(),
                    tool: "echo".to_string(),
                    args: json!({"text": "hi"}),
                    result: json!({"echo": "hi"}),
                },
            ]),
        );

        let events = empty_projector().poll(&bus);
        assert!(matches!(events[0], DebateEvent::RoundStart { round: 1 }));
        assert!(matches!(events[1], DebateEvent::Message { .. }));
        match &events[2] {
            DebateEvent::Tool { agent, details } => {
                assert_eq!(agent, "alice");
                assert_eq!(details.tool, "local-stub:echo");
            }
            other => panic!("Expected tool event, got {other:?}"),
        }
    }

    #[test]
    fn test_wire_format_is_type_tagged() {
        let event = DebateEvent::RoundStart { round: 2 };
        let json = serde_json::to_value(&event).expect("serializes");
        assert_eq!(json["type"], "round.start");
        assert_eq!(json["round"], 2);

        let end = serde_json::to_value(DebateEvent::RunEnd).expect("serializes");
        assert_eq!(end["type"], "run.end");

        let message = DebateEvent::Message {
            agent: "alice".to_string(),
            role: "Agent",
            phase: "analysis",
            round: None,
            content: "plan".to_string(),
        };
        let json = serde_json::to_value(&message).expect("serializes");
        assert_eq!(json["type"], "message");
        assert!(json.get("round").is_none());
    }

    #[test]
    fn test_system_messages_project_content_only() {
        let bus = TranscriptBus::new();
        bus.publish(Message::system("tools offline"));

        let events = empty_projector().poll(&bus);
        assert_eq!(events.len(), 1);
        match &events[0] {
            DebateEvent::System { content } => assert_eq!(content, "tools offline"),
            other => panic!("Expected system event, got {other:?}"),
        }
    }
}
