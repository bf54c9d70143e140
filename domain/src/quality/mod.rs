//! Quality evaluation of extraction results.
//!
//! - [`Metrics`]: accuracy / coverage / precision / recall / f1, always in `[0, 1]`
//! - [`QualityEvaluator`]: scores a payload against reference data, or
//!   self-assesses it against the agent's schema when no reference exists

pub mod evaluator;
pub mod metrics;

pub use evaluator::{EvaluatorConfig, QualityEvaluator};
pub use metrics::{EvaluationBasis, Metrics};
