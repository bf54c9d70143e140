//! Learning phase classification.
//!
//! The phase is a pure function of how many distinct documents have at
//! least one recorded attempt. It is recomputed from a ledger snapshot on
//! every decision and never stored.

use crate::coaching::decision::Strategy;
use crate::config::validation::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse learning regime, ordered from least to most mature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningPhase {
    Exploration,
    Optimization,
    Convergence,
    Golden,
}

impl LearningPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningPhase::Exploration => "exploration",
            LearningPhase::Optimization => "optimization",
            LearningPhase::Convergence => "convergence",
            LearningPhase::Golden => "golden",
        }
    }

    /// Whether the stuck-detection rule may switch to Explore.
    pub fn allows_exploration(&self) -> bool {
        matches!(self, LearningPhase::Exploration | LearningPhase::Optimization)
    }

    pub fn preferred_strategy(&self) -> Strategy {
        match self {
            LearningPhase::Exploration => Strategy::Explore,
            LearningPhase::Optimization => Strategy::Refine,
            LearningPhase::Convergence | LearningPhase::Golden => Strategy::Maintain,
        }
    }
}

impl fmt::Display for LearningPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper bounds (inclusive) of the first three phases, in documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseThresholds {
    pub exploration: u64,
    pub optimization: u64,
    pub convergence: u64,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            exploration: 50,
            optimization: 150,
            convergence: 200,
        }
    }
}

/// Coaching round budget per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseRounds {
    pub exploration: u32,
    pub optimization: u32,
    pub convergence: u32,
    pub golden: u32,
}

impl Default for PhaseRounds {
    fn default() -> Self {
        Self {
            exploration: 5,
            optimization: 3,
            convergence: 2,
            golden: 1,
        }
    }
}

/// Per-phase behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseProfile {
    pub phase: LearningPhase,
    /// Maximum rounds (attempts) per document/agent pair, counted across runs.
    pub max_rounds: u32,
    pub preferred_strategy: Strategy,
}

/// Maps document counts to phases.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhaseClassifier {
    thresholds: PhaseThresholds,
    rounds: PhaseRounds,
}

impl PhaseClassifier {
    pub fn new(thresholds: PhaseThresholds, rounds: PhaseRounds) -> Self {
        Self { thresholds, rounds }
    }

    pub fn thresholds(&self) -> &PhaseThresholds {
        &self.thresholds
    }

    pub fn classify(&self, documents: u64) -> LearningPhase {
        let t = &self.thresholds;
        if documents <= t.exploration {
            LearningPhase::Exploration
        } else if documents <= t.optimization {
            LearningPhase::Optimization
        } else if documents <= t.convergence {
            LearningPhase::Convergence
        } else {
            LearningPhase::Golden
        }
    }

    /// Document count at which the phase after the current one begins.
    pub fn next_phase_at(&self, documents: u64) -> Option<u64> {
        let t = &self.thresholds;
        match self.classify(documents) {
            LearningPhase::Exploration => Some(t.exploration + 1),
            LearningPhase::Optimization => Some(t.optimization + 1),
            LearningPhase::Convergence => Some(t.convergence + 1),
            LearningPhase::Golden => None,
        }
    }

    pub fn profile(&self, phase: LearningPhase) -> PhaseProfile {
        let max_rounds = match phase {
            LearningPhase::Exploration => self.rounds.exploration,
            LearningPhase::Optimization => self.rounds.optimization,
            LearningPhase::Convergence => self.rounds.convergence,
            LearningPhase::Golden => self.rounds.golden,
        };
        PhaseProfile {
            phase,
            max_rounds,
            preferred_strategy: phase.preferred_strategy(),
        }
    }

    /// Classify and return the phase profile in one step.
    pub fn profile_for(&self, documents: u64) -> PhaseProfile {
        self.profile(self.classify(documents))
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let t = &self.thresholds;
        if !(t.exploration < t.optimization && t.optimization < t.convergence) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::PhaseThresholdsOutOfOrder,
                format!(
                    "phase thresholds must be strictly increasing, got {}/{}/{}",
                    t.exploration, t.optimization, t.convergence
                ),
            ));
        }
        let r = &self.rounds;
        if [r.exploration, r.optimization, r.convergence, r.golden].contains(&0) {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ZeroMaxRounds,
                "a phase with max_rounds = 0 never coaches",
            ));
        }
        issues
    }
}
