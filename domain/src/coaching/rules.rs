//! Ordered precedence rules of the Strategy Selector.
//!
//! Each rule is a named predicate over a [`RuleContext`]. The table is
//! evaluated top-down and the first rule that fires decides. When none
//! fires, the decision is delegated (advisory service or deterministic
//! fallback).

use super::decision::{CoachingDecision, DecisionSource, Strategy};
use super::selector::SelectorConfig;
use crate::extraction::attempt::AttemptSummary;
use crate::learning::performance::PerformanceRecord;
use crate::learning::phase::PhaseProfile;

/// Inputs every rule sees.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub current: &'a AttemptSummary,
    pub record: &'a PerformanceRecord,
    pub profile: PhaseProfile,
    /// Coaching rounds already spent on this (document, agent) pair.
    pub coaching_rounds_used: u32,
    pub config: &'a SelectorConfig,
}

/// A named predicate that may produce a decision.
pub struct CoachingRule {
    pub name: &'static str,
    pub evaluate: fn(&RuleContext<'_>) -> Option<CoachingDecision>,
}

impl std::fmt::Debug for CoachingRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoachingRule").field("name", &self.name).finish()
    }
}

/// Default precedence table.
pub const DEFAULT_RULES: &[CoachingRule] = &[
    CoachingRule {
        name: "round_cap",
        evaluate: round_cap,
    },
    CoachingRule {
        name: "revert_on_regression",
        evaluate: revert_on_regression,
    },
    CoachingRule {
        name: "maintain_on_excellence",
        evaluate: maintain_on_excellence,
    },
    CoachingRule {
        name: "explore_when_stuck",
        evaluate: explore_when_stuck,
    },
];

/// Evaluate a rule table top-down.
pub fn first_match(rules: &[CoachingRule], ctx: &RuleContext<'_>) -> Option<CoachingDecision> {
    rules.iter().find_map(|rule| (rule.evaluate)(ctx))
}

fn rule(name: &str) -> DecisionSource {
    DecisionSource::Rule(name.to_string())
}

/// The phase's coaching budget is spent.
pub fn round_cap(ctx: &RuleContext<'_>) -> Option<CoachingDecision> {
    (ctx.coaching_rounds_used >= ctx.profile.max_rounds).then(|| {
        CoachingDecision::new(
            Strategy::Maintain,
            1.0,
            format!(
                "{} of {} coaching rounds used in {} phase",
                ctx.coaching_rounds_used, ctx.profile.max_rounds, ctx.profile.phase
            ),
            rule("round_cap"),
        )
    })
}

/// Current accuracy fell well below the best ever recorded.
pub fn revert_on_regression(ctx: &RuleContext<'_>) -> Option<CoachingDecision> {
    let best = ctx.record.best_ever.as_ref()?;
    let drop = best.accuracy - ctx.current.accuracy;
    (drop > ctx.config.regression_margin).then(|| {
        CoachingDecision::new(
            Strategy::Revert,
            0.95,
            format!(
                "accuracy {:.3} is {:.3} below best ever {:.3} (round {})",
                ctx.current.accuracy, drop, best.accuracy, best.round
            ),
            rule("revert_on_regression"),
        )
        .with_target(best.clone())
    })
}

/// Current accuracy is already excellent.
pub fn maintain_on_excellence(ctx: &RuleContext<'_>) -> Option<CoachingDecision> {
    (ctx.current.accuracy >= ctx.config.excellence_threshold).then(|| {
        CoachingDecision::new(
            Strategy::Maintain,
            1.0,
            format!(
                "accuracy {:.3} meets excellence threshold {:.2}",
                ctx.current.accuracy, ctx.config.excellence_threshold
            ),
            rule("maintain_on_excellence"),
        )
    })
}

/// The last N attempts sit on a plateau and the phase still explores.
pub fn explore_when_stuck(ctx: &RuleContext<'_>) -> Option<CoachingDecision> {
    let stuck = ctx.record.window_is_full(ctx.config.stuck_window)
        && ctx.record.window_spread < ctx.config.stuck_spread;
    (stuck && ctx.profile.phase.allows_exploration()).then(|| {
        CoachingDecision::new(
            Strategy::Explore,
            0.75,
            format!(
                "last {} attempts within {:.3} of each other",
                ctx.config.stuck_window, ctx.record.window_spread
            ),
            rule("explore_when_stuck"),
        )
    })
}
