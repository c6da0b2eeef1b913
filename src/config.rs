//! Run configuration.
//!
//! All feature switches are explicit fields passed into the state machine
//! at construction; phase logic never reads ambient process state.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for one debate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// The debate topic. Must not be blank.
    pub topic: String,
    /// Number of debate rounds. 0 means analysis straight to consensus.
    pub total_rounds: u32,
    /// Run the analysis phase as a concurrent fan-out instead of
    /// sequentially. Either way, publish order is the agent list order.
    pub parallel_analysis: bool,
    /// Tool calls each agent may make per round (agents enforce this
    /// themselves; the core only passes it along).
    pub tool_budget_per_round: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            topic: String::new(),
            total_rounds: 3,
            parallel_analysis: true,
            tool_budget_per_round: 3,
        }
    }
}

impl RunConfig {
    pub fn new(topic: impl Into<String>, total_rounds: u32) -> Self {
        Self {
            topic: topic.into(),
            total_rounds,
            ..Self::default()
        }
    }

    /// Selects sequential or concurrent analysis execution.
    pub fn with_parallel_analysis(mut self, parallel: bool) -> Self {
        self.parallel_analysis = parallel;
        self
    }

    /// Sets the per-round tool budget handed to agents.
    pub fn with_tool_budget(mut self, budget: u32) -> Self {
        self.tool_budget_per_round = budget;
        self
    }

    /// Fatal pre-run checks. A run must not start from a bad config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        Ok(())
    }
}

/// One `NAME` or `NAME=MODEL` agent spec as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Agent display name, unique within the run.
    pub name: String,
    /// Model identifier; `None` means the run's default model.
    pub model: Option<String>,
}

impl AgentSpec {
    /// Parses `NAME` or `NAME=MODEL`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::EmptyAgentName);
        }
        match raw.split_once('=') {
            None => Ok(Self {
                name: raw.to_string(),
                model: None,
            }),
            Some((name, model)) => {
                let name = name.trim();
                let model = model.trim();
                if name.is_empty() || model.is_empty() {
                    return Err(ConfigError::InvalidAgentSpec(raw.to_string()));
                }
                Ok(Self {
                    name: name.to_string(),
                    model: Some(model.to_string()),
                })
            }
        }
    }

    /// Parses a comma-separated spec list, rejecting duplicate names
    /// (case-insensitive, since names drive role display and exclusions).
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, ConfigError> {
        let mut specs = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
            let spec = Self::parse(part)?;
            let lowered = spec.name.to_ascii_lowercase();
            if seen.contains(&lowered) {
                return Err(ConfigError::DuplicateAgentName(spec.name));
            }
            seen.push(lowered);
            specs.push(spec);
        }
        if specs.is_empty() {
            return Err(ConfigError::NoAgents);
        }
        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_topic_rejected() {
        let config = RunConfig::new("  ", 3);
        assert!(matches!(config.validate(), Err(ConfigError::EmptyTopic)));

        let config = RunConfig::new("Is Rust the future?", 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_agent_spec_parsing() {
        let spec = AgentSpec::parse("OpenAI").expect("bare name");
        assert_eq!(spec.name, "OpenAI");
        assert!(spec.model.is_none());

        let spec = AgentSpec::parse("Claude=anthropic/claude-haiku-4-5").expect("name=model");
        assert_eq!(spec.name, "Claude");
        assert_eq!(spec.model.as_deref(), Some("anthropic/claude-haiku-4-5"));

        assert!(AgentSpec::parse("=model").is_err());
        assert!(AgentSpec::parse("").is_err());
    }

    #[test]
    fn test_spec_list_rejects_duplicates_and_empties() {
        let specs = AgentSpec::parse_list("A,B=m,C").expect("valid list");
        assert_eq!(specs.len(), 3);

        assert!(matches!(
            AgentSpec::parse_list("A,a"),
            Err(ConfigError::DuplicateAgentName(_))
        ));
        assert!(matches!(
            AgentSpec::parse_list(" ,"),
            Err(ConfigError::NoAgents)
        ));
    }
}
