//! Strategy Selector.
//!
//! The decision is a pure function of the current attempt, the agent's
//! [`PerformanceRecord`] and the [`PhaseProfile`], both derived from one
//! ledger snapshot. Precedence rules decide first; if none fires the caller
//! consults the advisory service and passes the validated (or rejected)
//! response to [`StrategySelector::resolve`].

use super::advisory::{AdvisoryContext, AdvisoryRejection, AdvisoryResponse};
use super::decision::{CoachingDecision, DecisionSource, Strategy};
use super::refinement;
use super::rules::{CoachingRule, DEFAULT_RULES, RuleContext, first_match};
use crate::agent::entities::Instruction;
use crate::config::validation::{ConfigIssue, ConfigIssueCode, check_unit_interval};
use crate::core::ids::{AgentId, DocumentId};
use crate::extraction::attempt::AttemptSummary;
use crate::golden::curator::GoldenExample;
use crate::learning::performance::PerformanceRecord;
use crate::learning::phase::{LearningPhase, PhaseProfile};
use crate::quality::Metrics;
use serde::{Deserialize, Serialize};

/// Selector thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Revert when best-ever minus current accuracy exceeds this.
    pub regression_margin: f64,
    /// Maintain at or above this accuracy.
    pub excellence_threshold: f64,
    /// Number of recent attempts inspected for a plateau.
    pub stuck_window: usize,
    /// Plateau when max - min accuracy over the window is below this.
    pub stuck_spread: f64,
    /// In the Golden phase, delegated decisions below this confidence become Maintain.
    pub golden_min_confidence: f64,
    /// Advisory confidence below which the phase's preferred strategy is used.
    pub advisory_min_confidence: f64,
    /// Confidence attached to the deterministic fallback.
    pub fallback_confidence: f64,
    pub max_instruction_chars: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            regression_margin: 0.10,
            excellence_threshold: 0.95,
            stuck_window: 5,
            stuck_spread: 0.02,
            golden_min_confidence: 0.90,
            advisory_min_confidence: 0.6,
            fallback_confidence: 0.5,
            max_instruction_chars: 20_000,
        }
    }
}

impl SelectorConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        check_unit_interval(&mut issues, "coaching.regression_margin", self.regression_margin);
        check_unit_interval(&mut issues, "coaching.excellence_threshold", self.excellence_threshold);
        check_unit_interval(&mut issues, "coaching.stuck_spread", self.stuck_spread);
        check_unit_interval(&mut issues, "coaching.golden_min_confidence", self.golden_min_confidence);
        check_unit_interval(
            &mut issues,
            "coaching.advisory_min_confidence",
            self.advisory_min_confidence,
        );
        check_unit_interval(&mut issues, "coaching.fallback_confidence", self.fallback_confidence);
        if self.stuck_window < 2 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ThresholdOutOfRange,
                "coaching.stuck_window below 2 treats every attempt as a plateau",
            ));
        }
        issues
    }
}

/// Everything one decision depends on.
#[derive(Debug, Clone, Copy)]
pub struct SelectionInput<'a> {
    pub agent_id: &'a AgentId,
    pub document_id: &'a DocumentId,
    pub instruction: &'a Instruction,
    pub base_instruction: &'a str,
    pub current: &'a AttemptSummary,
    pub metrics: &'a Metrics,
    pub record: &'a PerformanceRecord,
    pub profile: PhaseProfile,
    pub coaching_rounds_used: u32,
    pub golden: &'a [GoldenExample],
}

/// Result of the precedence rules.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// A rule fired; no advisory call needed.
    Decided(CoachingDecision),
    /// No rule fired; consult the advisory service.
    Delegate(Box<AdvisoryContext>),
}

/// Decides coaching actions.
#[derive(Debug)]
pub struct StrategySelector {
    config: SelectorConfig,
    rules: &'static [CoachingRule],
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

impl StrategySelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            rules: DEFAULT_RULES,
        }
    }

    pub fn with_rules(mut self, rules: &'static [CoachingRule]) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Run the precedence rules.
    pub fn evaluate(&self, input: &SelectionInput<'_>) -> Verdict {
        let ctx = RuleContext {
            current: input.current,
            record: input.record,
            profile: input.profile,
            coaching_rounds_used: input.coaching_rounds_used,
            config: &self.config,
        };
        match first_match(self.rules, &ctx) {
            Some(decision) => Verdict::Decided(self.complete(decision, input)),
            None => Verdict::Delegate(Box::new(self.advisory_context(input))),
        }
    }

    /// Decide without an advisory service: rules, then the deterministic fallback.
    pub fn decide(&self, input: &SelectionInput<'_>) -> CoachingDecision {
        match self.evaluate(input) {
            Verdict::Decided(decision) => decision,
            Verdict::Delegate(_) => self.fallback(input, "no advisory service configured"),
        }
    }

    /// Turn an advisory outcome into a decision.
    pub fn resolve(
        &self,
        input: &SelectionInput<'_>,
        advice: Result<AdvisoryResponse, AdvisoryRejection>,
    ) -> CoachingDecision {
        let response = match advice {
            Ok(response) => response,
            Err(rejection) => return self.fallback(input, &rejection.to_string()),
        };

        let (strategy, rationale) = if response.confidence < self.config.advisory_min_confidence {
            (
                input.profile.preferred_strategy,
                format!(
                    "advisory confidence {:.2} too low for {}; using {} phase preference",
                    response.confidence, response.strategy, input.profile.phase
                ),
            )
        } else {
            (response.strategy, response.reasoning.clone())
        };

        let mut decision =
            CoachingDecision::new(strategy, response.confidence, rationale, DecisionSource::Advisory);

        match strategy {
            Strategy::Revert => {
                let target = response
                    .target_round
                    .and_then(|r| input.record.find_round(input.document_id, r))
                    .or(input.record.best_ever.as_ref());
                match target {
                    Some(t) => decision = decision.with_target(t.clone()),
                    None => {
                        return self.fallback(input, "advisory revert without a known target");
                    }
                }
            }
            Strategy::Refine | Strategy::Explore if strategy == response.strategy => {
                if let Some(text) = response.new_instruction {
                    decision = decision.with_instruction(text);
                }
            }
            _ => {}
        }

        self.golden_guard(self.complete(decision, input), input)
    }

    /// Deterministic Refine used when the advisory path fails.
    pub fn fallback(&self, input: &SelectionInput<'_>, reason: &str) -> CoachingDecision {
        let decision = CoachingDecision::new(
            Strategy::Refine,
            self.config.fallback_confidence,
            format!("fallback refine: {reason}"),
            DecisionSource::Fallback,
        );
        self.golden_guard(self.complete(decision, input), input)
    }

    /// Strategies the advisory service may return in this phase.
    pub fn allowed_strategies(&self, phase: LearningPhase) -> Vec<Strategy> {
        Strategy::ALL
            .into_iter()
            .filter(|s| *s != Strategy::Explore || phase.allows_exploration())
            .collect()
    }

    fn advisory_context(&self, input: &SelectionInput<'_>) -> AdvisoryContext {
        AdvisoryContext {
            agent_id: input.agent_id.clone(),
            document_id: input.document_id.clone(),
            round: input.current.round,
            phase: input.profile.phase,
            max_rounds: input.profile.max_rounds,
            coaching_rounds_used: input.coaching_rounds_used,
            current: input.metrics.clone(),
            best_ever: input.record.best_ever.clone(),
            recent_history: input.record.recent_window.clone(),
            trend: input.record.trend,
            allowed_strategies: self.allowed_strategies(input.profile.phase),
            current_instruction: input.instruction.text.clone(),
            golden_examples: input.golden.to_vec(),
        }
    }

    /// Fill in a deterministic instruction for Refine/Explore when absent.
    fn complete(&self, decision: CoachingDecision, input: &SelectionInput<'_>) -> CoachingDecision {
        if decision.new_instruction.is_some() {
            return decision;
        }
        match decision.strategy {
            Strategy::Refine => {
                let text =
                    refinement::refine(&input.instruction.text, input.metrics, input.current.round);
                decision.with_instruction(text)
            }
            Strategy::Explore => {
                let text = refinement::explore(
                    input.base_instruction,
                    input.metrics,
                    input.instruction.version,
                );
                decision.with_instruction(text)
            }
            Strategy::Revert | Strategy::Maintain => decision,
        }
    }

    /// In the Golden phase only confident delegated decisions may change anything.
    fn golden_guard(&self, decision: CoachingDecision, input: &SelectionInput<'_>) -> CoachingDecision {
        if input.profile.phase != LearningPhase::Golden
            || decision.strategy == Strategy::Maintain
            || decision.confidence >= self.config.golden_min_confidence
        {
            return decision;
        }
        CoachingDecision::new(
            Strategy::Maintain,
            decision.confidence,
            format!(
                "golden phase: {} at confidence {:.2} below {:.2} ({})",
                decision.strategy,
                decision.confidence,
                self.config.golden_min_confidence,
                decision.rationale
            ),
            decision.source,
        )
    }
}
