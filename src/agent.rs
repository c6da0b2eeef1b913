//! Agent capability: the participants of a debate.
//!
//! The orchestration core only depends on the [`Agent`] trait; everything
//! an implementation needs for one call arrives in an [`AgentContext`] and
//! everything it produces comes back in an [`AgentReply`]. Failures are the
//! phase executor's problem: agents should return `Err` rather than panic,
//! and must bound their own latency (the round barrier has no timeout).
//!
//! Three implementations ship with the crate: a deterministic
//! [`PlannerAgent`], the LLM-backed [`ModelAgent`] debater, and the
//! LLM-backed [`JudgeAgent`] that writes the final conclusion.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::bus::ToolCallRecord;
use crate::error::AgentResult;
use crate::llm::{ChatMessage, Completer};
use crate::tools::ToolRouter;

/// Role of an agent within a run, decided once at construction.
///
/// Only `Debater` agents take debate-round turns; `Planner` and `Judge`
/// still act during the analysis and consensus phases respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Takes a turn every debate round.
    Debater,
    /// Sets rules and structure during analysis; never debates.
    Planner,
    /// Silent until the consensus phase, then writes the conclusion.
    Judge,
}

impl AgentRole {
    /// Display label used in event rosters.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Debater => "Agent",
            Self::Planner => "Planner",
            Self::Judge => "Judge",
        }
    }
}

/// Everything an agent gets for one capability call.
#[derive(Clone)]
pub struct AgentContext {
    /// The debate topic.
    pub topic: String,
    /// Current round number; 0 during analysis.
    pub round_no: u32,
    /// Rendered transcript view this agent is allowed to see.
    pub history: String,
    /// Tool calls this agent may still make in this call.
    pub tool_budget: u32,
    /// Tool router, if the run has one.
    pub tools: Option<Arc<dyn ToolRouter>>,
}

impl AgentContext {
    pub fn new(topic: impl Into<String>, round_no: u32, history: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            round_no,
            history: history.into(),
            tool_budget: 0,
            tools: None,
        }
    }

    /// Attaches the tool router and remaining budget.
    pub fn with_tools(mut self, tools: Option<Arc<dyn ToolRouter>>, budget: u32) -> Self {
        self.tools = tools;
        self.tool_budget = budget;
        self
    }
}

/// Result of one agent capability call.
#[derive(Debug, Clone, Default)]
pub struct AgentReply {
    /// Main text output; may be empty for a non-participating phase.
    pub text: String,
    /// Evidence metadata, opaque to the core.
    pub citations: Vec<serde_json::Value>,
    /// Tool calls actually made during this call.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Lifecycle tag; `None` or "complete" on success.
    pub status: Option<String>,
}

impl AgentReply {
    /// A successful reply carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: Some("complete".to_string()),
            ..Self::default()
        }
    }

    /// An intentionally empty reply (agent sits this phase out).
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCallRecord>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// A debate participant. Implementations live outside the core; the
/// orchestrator only calls through this interface.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Identity, unique within a run's agent list.
    fn name(&self) -> &str;

    /// Role tag, fixed at construction.
    fn role(&self) -> AgentRole;

    /// Whether this agent takes debate-round turns.
    fn participates(&self) -> bool {
        self.role() == AgentRole::Debater
    }

    /// Produce round-0 output: a plan, stance, or empty if sitting out.
    async fn analysis(&self, ctx: AgentContext) -> AgentResult<AgentReply>;

    /// Produce a round-N argument or rebuttal; may use tools.
    async fn debate_turn(&self, ctx: AgentContext) -> AgentResult<AgentReply>;

    /// Produce the final synthesis from the full transcript.
    async fn propose_consensus(&self, ctx: AgentContext) -> AgentResult<AgentReply>;
}

// ============================================================================
// Planner
// ============================================================================

const PLAN_TEMPLATE: &str = "Structured Debate Plan

Topic
- {topic}

1) Rounds & Turn Order
- Total rounds and turn order are orchestrator-controlled; every round is
  barriered, so all agents respond to the same prior transcript.

2) Role / Perspective Assignments
- Each agent keeps a distinct, contrasting perspective and a stable stance
  across rounds. A stance change must open with 'STANCE CHANGE:' and cite
  the new evidence that forced it.

3) Evidence Requirements
- Factual claims need at least one recent citation, marked inline as
  [CITATION: Source, Year, Note]. Prefer quantifiable, dated sources.

4) Key Term Definitions
- Define ambiguous terms in the topic early; agree on metrics or note the
  disagreement so comparisons stay coherent across rounds.

5) Tool Strategy (if tools are available)
- Early rounds: gather trend and benchmark data. Later rounds: seek
  counter-evidence and verify contested figures. Keep calls minimal.

6) Risks & Safeguards
- Watch for vague claims, circular logic, and ignored opposing points. The
  Judge discounts unsupported claims and flags unannounced stance shifts.";

/// Deterministic, non-LLM planner. Speaks once, during analysis, to set
/// the debate's ground rules; never takes a debate turn.
pub struct PlannerAgent {
    name: String,
}

impl PlannerAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> AgentRole {
        AgentRole::Planner
    }

    async fn analysis(&self, ctx: AgentContext) -> AgentResult<AgentReply> {
        let text = PLAN_TEMPLATE.replace("{topic}", &ctx.topic);
        Ok(AgentReply::text(text).with_status("reading"))
    }

    async fn debate_turn(&self, _ctx: AgentContext) -> AgentResult<AgentReply> {
        Ok(AgentReply::silent())
    }

    async fn propose_consensus(&self, _ctx: AgentContext) -> AgentResult<AgentReply> {
        Ok(AgentReply::text(
            "Planner: recommend a joint conclusion stating common ground, remaining \
             disagreements, an explicit confidence (0-1), and caveats.",
        ))
    }
}

// ============================================================================
// Model-backed debater
// ============================================================================

const ANALYSIS_PROMPT: &str = "You are {agent_name}, participating in a structured professional debate.
Topic: \"{topic}\"

Your assigned perspective: {role_hint}

Start your first line with EXACTLY:
This is my analysis:

Then provide:
- Stance: <one definitive sentence>
- Key Arguments: (3-5 bullets)
- Evidence Needed: (and how you would obtain it via tools, if any)
- Uncertainties / Caveats: (1-3 bullets)

Keep it concise and self-contained. Mark any sourced fact inline as
[CITATION: Source, Year, Note], preferring recent data.";

const DEBATE_PROMPT: &str = "You are {agent_name}. Debate round {round_no}.
Topic: \"{topic}\"

Your assigned perspective: {role_hint}
Your original stance (from analysis): \"{original_stance}\"

Context so far (others' arguments; do not repeat them verbatim):
{history}

Start your first line with EXACTLY:
This is my round-{round_no}:

Then write 2-4 short paragraphs. Address the strongest point from each
opponent and defend your stance. If new evidence truly forces a change,
open with 'STANCE CHANGE: <new stance>' and cite that evidence inline as
[CITATION: Source, Year, Note]. Factual claims need a recent citation.";

const CONSENSUS_PROMPT: &str = "You are {agent_name}. The debate is over and a joint conclusion is needed.

Start your first line with EXACTLY:
This is my final conclusion:

Then provide:
1) The strongest common ground in 2-3 sentences.
2) Remaining disagreements, briefly.
3) A final, practical conclusion with a confidence score (0-1) and caveats.";

/// LLM-backed debater with a perspective hint and stance memory.
///
/// The agent remembers the stance it took during analysis and threads it
/// into every later round. It owns its tool budget: the core passes the
/// configured per-round allowance in the context but never touches the
/// counter.
pub struct ModelAgent {
    name: String,
    completer: Arc<dyn Completer>,
    role_hint: String,
    tool_allowlist: Vec<String>,
    tool_budget: AtomicU32,
    original_stance: Mutex<Option<String>>,
}

impl ModelAgent {
    pub fn new(name: impl Into<String>, completer: Arc<dyn Completer>) -> Self {
        Self {
            name: name.into(),
            completer,
            role_hint: String::new(),
            tool_allowlist: Vec::new(),
            tool_budget: AtomicU32::new(0),
            original_stance: Mutex::new(None),
        }
    }

    /// Sets the perspective this agent argues from.
    pub fn with_role_hint(mut self, hint: impl Into<String>) -> Self {
        self.role_hint = hint.into();
        self
    }

    /// Permits the given tool keys, with a total call budget.
    pub fn with_tools(mut self, allowlist: Vec<String>, budget: u32) -> Self {
        self.tool_allowlist = allowlist;
        self.tool_budget = AtomicU32::new(budget);
        self
    }

    fn role_hint_or_default(&self) -> &str {
        if self.role_hint.is_empty() {
            "(no specific perspective assigned)"
        } else {
            &self.role_hint
        }
    }

    /// Prefers search-like tools, then echo, then the first allowed key.
    fn pick_tool_key(&self) -> Option<&str> {
        self.tool_allowlist
            .iter()
            .find(|k| k.to_ascii_lowercase().contains("search"))
            .or_else(|| {
                self.tool_allowlist
                    .iter()
                    .find(|k| k.to_ascii_lowercase().contains("echo"))
            })
            .or_else(|| self.tool_allowlist.first())
            .map(String::as_str)
    }

    /// Calls a tool if it is allowlisted and budget remains; `None` means
    /// the guard rails rejected the call without error.
    async fn maybe_call_tool(
        &self,
        ctx: &AgentContext,
        tool_key: &str,
        args: serde_json::Value,
    ) -> Option<ToolCallRecord> {
        let router = ctx.tools.as_ref()?;
        if !self.tool_allowlist.iter().any(|k| k == tool_key) {
            return None;
        }
        // A failed call still spends budget, as the original allowance is
        // per attempt.
        if self
            .tool_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| b.checked_sub(1))
            .is_err()
        {
            return None;
        }

        match router.call(tool_key, args).await {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(agent = %self.name, tool = tool_key, error = %err, "tool call failed");
                None
            }
        }
    }

    /// Pulls the "Stance:" line out of an analysis, falling back to the
    /// first non-empty line.
    fn extract_stance(text: &str) -> Option<String> {
        for line in text.lines() {
            let trimmed = line
                .trim()
                .trim_start_matches(['-', '*'])
                .trim()
                .trim_start_matches("**")
                .trim();
            for label in ["Stance:", "Position:", "Conclusion:"] {
                if let Some(rest) = trimmed.strip_prefix(label) {
                    let stance = rest.trim().trim_start_matches("**").trim();
                    if !stance.is_empty() {
                        return Some(stance.to_string());
                    }
                }
            }
        }
        text.lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
    }
}

#[async_trait]
impl Agent for ModelAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> AgentRole {
        AgentRole::Debater
    }

    async fn analysis(&self, ctx: AgentContext) -> AgentResult<AgentReply> {
        let prompt = ANALYSIS_PROMPT
            .replace("{agent_name}", &self.name)
            .replace("{topic}", &ctx.topic)
            .replace("{role_hint}", self.role_hint_or_default());

        let text = self.completer.complete(vec![ChatMessage::user(prompt)]).await?;

        let stance = Self::extract_stance(&text);
        *self.original_stance.lock().expect("stance lock not poisoned") = stance;

        Ok(AgentReply::text(text))
    }

    async fn debate_turn(&self, ctx: AgentContext) -> AgentResult<AgentReply> {
        let mut tool_calls = Vec::new();

        // Best-effort evidence probe before drafting.
        if let Some(tool_key) = self.pick_tool_key().map(str::to_string) {
            let args = if tool_key.to_ascii_lowercase().contains("search") {
                json!({ "q": ctx.topic, "count": 3 })
            } else {
                json!({ "text": format!("{} requesting brief evidence on: {}", self.name, ctx.topic) })
            };
            if let Some(record) = self.maybe_call_tool(&ctx, &tool_key, args).await {
                tool_calls.push(record);
            }
        }

        let stance = self
            .original_stance
            .lock()
            .expect("stance lock not poisoned")
            .clone()
            .unwrap_or_else(|| "(not captured in analysis)".to_string());

        // Cap history to keep prompts bounded.
        let history: String = ctx.history.chars().take(6000).collect();

        let prompt = DEBATE_PROMPT
            .replace("{agent_name}", &self.name)
            .replace("{round_no}", &ctx.round_no.to_string())
            .replace("{topic}", &ctx.topic)
            .replace("{role_hint}", self.role_hint_or_default())
            .replace("{original_stance}", &stance)
            .replace("{history}", &history);

        let text = self.completer.complete(vec![ChatMessage::user(prompt)]).await?;
        Ok(AgentReply::text(text).with_tool_calls(tool_calls))
    }

    async fn propose_consensus(&self, _ctx: AgentContext) -> AgentResult<AgentReply> {
        let prompt = CONSENSUS_PROMPT.replace("{agent_name}", &self.name);
        let text = self.completer.complete(vec![ChatMessage::user(prompt)]).await?;
        Ok(AgentReply::text(text))
    }
}

// ============================================================================
// Judge
// ============================================================================

const JUDGE_PROMPT: &str = "You are the neutral judge of a structured research debate. Produce a single,
self-contained conclusion based only on the transcript below.

Structure your conclusion as:
1) Strongest shared ground (2-4 sentences).
2) Remaining disagreements, briefly.
3) A balanced, practical conclusion with a confidence score (0.0-1.0) and
   explicit caveats, justified by the weight of evidence in the transcript.
4) Evidence and conduct review: citation quality and recency, whether any
   claim had to be discounted for missing evidence, and any stance changes
   (flagged or not).

Rules: stay strictly neutral, introduce no outside information, and keep
the framing general and research-oriented.

--- Transcript Start ---
{history}
--- Transcript End ---";

/// LLM-backed judge. Silent through analysis and every round; writes the
/// final conclusion from the full transcript.
pub struct JudgeAgent {
    name: String,
    completer: Arc<dyn Completer>,
}

impl JudgeAgent {
    pub fn new(name: impl Into<String>, completer: Arc<dyn Completer>) -> Self {
        Self {
            name: name.into(),
            completer,
        }
    }
}

#[async_trait]
impl Agent for JudgeAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> AgentRole {
        AgentRole::Judge
    }

    async fn analysis(&self, _ctx: AgentContext) -> AgentResult<AgentReply> {
        Ok(AgentReply::silent())
    }

    async fn debate_turn(&self, _ctx: AgentContext) -> AgentResult<AgentReply> {
        Ok(AgentReply::silent())
    }

    async fn propose_consensus(&self, ctx: AgentContext) -> AgentResult<AgentReply> {
        let prompt = JUDGE_PROMPT.replace("{history}", &ctx.history);
        let text = self.completer.complete(vec![ChatMessage::user(prompt)]).await?;
        Ok(AgentReply::text(text))
    }
}
