//! Coaching decisions.

use crate::extraction::attempt::AttemptSummary;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do with an agent's instruction after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Restore the instruction version that produced the best-ever attempt.
    Revert,
    /// Adjust the current instruction to address observed gaps.
    Refine,
    /// Try a materially different instruction to escape a plateau.
    Explore,
    /// Keep the current instruction.
    Maintain,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Revert,
        Strategy::Refine,
        Strategy::Explore,
        Strategy::Maintain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Revert => "revert",
            Strategy::Refine => "refine",
            Strategy::Explore => "explore",
            Strategy::Maintain => "maintain",
        }
    }

    /// Whether this strategy produces a new instruction version.
    pub fn writes_instruction(&self) -> bool {
        matches!(self, Strategy::Refine | Strategy::Explore)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "revert" => Ok(Strategy::Revert),
            "refine" => Ok(Strategy::Refine),
            "explore" => Ok(Strategy::Explore),
            "maintain" => Ok(Strategy::Maintain),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

/// Where a decision came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rule", rename_all = "snake_case")]
pub enum DecisionSource {
    /// A deterministic precedence rule, by name.
    Rule(String),
    /// A validated advisory response.
    Advisory,
    /// The deterministic refine fallback.
    Fallback,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionSource::Rule(name) => write!(f, "rule:{name}"),
            DecisionSource::Advisory => f.write_str("advisory"),
            DecisionSource::Fallback => f.write_str("fallback"),
        }
    }
}

/// The outcome of one Strategy Selector call.
///
/// Decisions are consumed once: committed to the agent, written to the
/// ledger, then dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingDecision {
    pub strategy: Strategy,
    /// For Revert: the attempt whose instruction version is restored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<AttemptSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_instruction: Option<String>,
    pub confidence: f64,
    pub rationale: String,
    pub source: DecisionSource,
}

impl CoachingDecision {
    pub fn new(
        strategy: Strategy,
        confidence: f64,
        rationale: impl Into<String>,
        source: DecisionSource,
    ) -> Self {
        Self {
            strategy,
            target: None,
            new_instruction: None,
            confidence: confidence.clamp(0.0, 1.0),
            rationale: rationale.into(),
            source,
        }
    }

    pub fn with_target(mut self, target: AttemptSummary) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_instruction(mut self, text: impl Into<String>) -> Self {
        self.new_instruction = Some(text.into());
        self
    }

    /// Round of the revert target, if any.
    pub fn target_round(&self) -> Option<u32> {
        self.target.as_ref().map(|t| t.round)
    }

    pub fn is_fallback(&self) -> bool {
        self.source == DecisionSource::Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!(" Revert ".parse::<Strategy>(), Ok(Strategy::Revert));
        assert_eq!("EXPLORE".parse::<Strategy>(), Ok(Strategy::Explore));
        assert!("rewrite".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_decision_source_serde() {
        let json = serde_json::to_string(&DecisionSource::Rule("round_cap".into())).unwrap();
        assert_eq!(json, r#"{"kind":"rule","rule":"round_cap"}"#);
        let back: DecisionSource = serde_json::from_str(r#"{"kind":"advisory"}"#).unwrap();
        assert_eq!(back, DecisionSource::Advisory);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let d = CoachingDecision::new(Strategy::Refine, 1.7, "r", DecisionSource::Fallback);
        assert_eq!(d.confidence, 1.0);
        assert!(d.is_fallback());
        assert_eq!(d.target_round(), None);
    }
}
