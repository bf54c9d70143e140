//! Coaching: deciding how an agent's instruction should change.
//!
//! - [`decision`]: the four strategies and the decision value
//! - [`rules`]: ordered precedence rules (round cap, revert, maintain, explore)
//! - [`selector`]: combines rules, advisory responses and the fallback
//! - [`advisory`]: context sent to the advisory service and response validation
//! - [`refinement`]: deterministic instruction rewrites

pub mod advisory;
pub mod decision;
pub mod refinement;
pub mod rules;
pub mod selector;

pub use advisory::{AdvisoryContext, AdvisoryRejection, AdvisoryResponse, parse_advisory_response};
pub use decision::{CoachingDecision, DecisionSource, Strategy};
pub use rules::{CoachingRule, DEFAULT_RULES, RuleContext};
pub use selector::{SelectionInput, SelectorConfig, StrategySelector, Verdict};
