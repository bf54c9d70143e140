//! Metrics value object.

use serde::{Deserialize, Serialize};

/// What the scores were measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationBasis {
    /// Compared field by field with reference data.
    Reference,
    /// Heuristic self-assessment; lower confidence.
    #[default]
    SelfAssessed,
}

/// Quality scores of one extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Metrics {
    pub accuracy: f64,
    pub coverage: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub basis: EvaluationBasis,
}

impl Metrics {
    /// All-zero metrics, used for absent or empty results.
    pub fn zero(basis: EvaluationBasis) -> Self {
        Self {
            basis,
            ..Self::default()
        }
    }

    /// Build metrics from raw scores, clamping each to `[0, 1]` and deriving f1.
    pub fn from_scores(
        accuracy: f64,
        coverage: f64,
        precision: f64,
        recall: f64,
        basis: EvaluationBasis,
    ) -> Self {
        let precision = clamp_unit(precision);
        let recall = clamp_unit(recall);
        Self {
            accuracy: clamp_unit(accuracy),
            coverage: clamp_unit(coverage),
            precision,
            recall,
            f1: harmonic_mean(precision, recall),
            missing_fields: Vec::new(),
            errors: Vec::new(),
            basis,
        }
    }

    pub fn with_missing_fields(mut self, fields: Vec<String>) -> Self {
        self.missing_fields = fields;
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    /// Self-assessed scores are lower confidence than reference scores.
    pub fn is_low_confidence(&self) -> bool {
        self.basis != EvaluationBasis::Reference
    }
}

/// Clamp to `[0, 1]`, mapping NaN to 0.
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Harmonic mean, defined as 0 when both inputs are 0.
pub(crate) fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a + b <= 0.0 {
        0.0
    } else {
        clamp_unit(2.0 * a * b / (a + b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_metrics() {
        let m = Metrics::zero(EvaluationBasis::Reference);
        assert_eq!(m.accuracy, 0.0);
        assert_eq!(m.f1, 0.0);
        assert!(!m.is_low_confidence());
    }

    #[test]
    fn test_from_scores_clamps_and_derives_f1() {
        let m = Metrics::from_scores(1.5, -0.2, 0.5, 1.0, EvaluationBasis::Reference);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.coverage, 0.0);
        assert!((m.f1 - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_harmonic_mean_zero() {
        assert_eq!(harmonic_mean(0.0, 0.0), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
    }

    #[test]
    fn test_self_assessed_is_low_confidence() {
        assert!(Metrics::zero(EvaluationBasis::SelfAssessed).is_low_confidence());
    }
}
