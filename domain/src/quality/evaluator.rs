//! Quality evaluator.
//!
//! `evaluate` never fails: absent results score zero, absent references
//! fall back to a schema-driven self-assessment flagged as
//! [`EvaluationBasis::SelfAssessed`].

use super::metrics::{EvaluationBasis, Metrics, clamp_unit};
use crate::config::validation::{ConfigIssue, check_unit_interval};
use crate::extraction::payload::{ExtractionPayload, FieldValue};
use crate::extraction::parsing::parse_number;
use crate::extraction::schema::ExtractionSchema;
use serde::{Deserialize, Serialize};

/// Evaluator tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Relative tolerance for numeric field comparison.
    pub numeric_tolerance: f64,
    /// Multiplier applied to self-assessed accuracy.
    pub self_assessment_discount: f64,
    /// Coverage below which a self-assessment reports a low-coverage error.
    pub low_coverage_threshold: f64,
    /// Maximum number of per-field error messages kept in [`Metrics::errors`].
    pub max_reported_errors: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            numeric_tolerance: 0.01,
            self_assessment_discount: 0.8,
            low_coverage_threshold: 0.5,
            max_reported_errors: 10,
        }
    }
}

impl EvaluatorConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        check_unit_interval(&mut issues, "evaluation.numeric_tolerance", self.numeric_tolerance);
        check_unit_interval(
            &mut issues,
            "evaluation.self_assessment_discount",
            self.self_assessment_discount,
        );
        check_unit_interval(
            &mut issues,
            "evaluation.low_coverage_threshold",
            self.low_coverage_threshold,
        );
        issues
    }
}

/// Scores extraction payloads.
#[derive(Debug, Clone, Default)]
pub struct QualityEvaluator {
    config: EvaluatorConfig,
}

impl QualityEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate a result, with or without reference data.
    pub fn evaluate(
        &self,
        result: Option<&ExtractionPayload>,
        reference: Option<&ExtractionPayload>,
        schema: &ExtractionSchema,
    ) -> Metrics {
        match reference {
            Some(reference) => self.evaluate_against_reference(result, reference),
            None => self.self_assess(result, schema),
        }
    }

    fn evaluate_against_reference(
        &self,
        result: Option<&ExtractionPayload>,
        reference: &ExtractionPayload,
    ) -> Metrics {
        let expected: Vec<(&String, &FieldValue)> = reference
            .fields
            .iter()
            .filter(|(_, v)| v.is_present())
            .collect();

        if expected.is_empty() {
            return Metrics::zero(EvaluationBasis::Reference)
                .with_error("Reference has no populated fields");
        }

        let Some(result) = result else {
            return Metrics::zero(EvaluationBasis::Reference)
                .with_missing_fields(expected.iter().map(|(k, _)| (*k).clone()).collect())
                .with_error("Empty extraction");
        };

        let extracted = result.present_count();
        let mut matched = 0usize;
        let mut covered = 0usize;
        let mut missing = Vec::new();
        let mut errors = Vec::new();

        for (name, expected_value) in &expected {
            match result.get(name) {
                Some(actual) if actual.is_present() => {
                    covered += 1;
                    if values_match(actual, expected_value, self.config.numeric_tolerance) {
                        matched += 1;
                    } else if errors.len() < self.config.max_reported_errors {
                        errors.push(format!("Incorrect value for {name}"));
                    }
                }
                _ => {
                    missing.push((*name).clone());
                    if errors.len() < self.config.max_reported_errors {
                        errors.push(format!("Missing field: {name}"));
                    }
                }
            }
        }

        let total = expected.len() as f64;
        let accuracy = matched as f64 / total;
        let coverage = covered as f64 / total;
        let precision = if extracted == 0 {
            0.0
        } else {
            matched as f64 / extracted as f64
        };
        let recall = matched as f64 / total;

        if extracted == 0 {
            errors.insert(0, "Empty extraction".to_string());
        }

        Metrics::from_scores(accuracy, coverage, precision, recall, EvaluationBasis::Reference)
            .with_missing_fields(missing)
            .with_errors(errors)
    }

    fn self_assess(&self, result: Option<&ExtractionPayload>, schema: &ExtractionSchema) -> Metrics {
        let Some(result) = result else {
            return Metrics::zero(EvaluationBasis::SelfAssessed).with_error("Empty extraction");
        };

        let (coverage, validity, missing) = if schema.is_open() {
            let total = result.fields.len();
            if total == 0 {
                return Metrics::zero(EvaluationBasis::SelfAssessed)
                    .with_error("Empty extraction");
            }
            let missing: Vec<String> = result
                .fields
                .iter()
                .filter(|(_, v)| !v.is_present())
                .map(|(k, _)| k.clone())
                .collect();
            let coverage = result.present_count() as f64 / total as f64;
            (coverage, 1.0, missing)
        } else {
            let total = schema.fields.len() as f64;
            let populated = schema
                .fields
                .iter()
                .filter(|spec| result.get(&spec.name).is_some_and(FieldValue::is_present))
                .count();
            let valid = schema
                .fields
                .iter()
                .filter(|spec| spec.accepts(result.get(&spec.name)))
                .count();
            let missing = schema
                .required_fields()
                .filter(|spec| !result.get(&spec.name).is_some_and(FieldValue::is_present))
                .map(|spec| spec.name.clone())
                .collect();
            (populated as f64 / total, valid as f64 / total, missing)
        };

        let accuracy = coverage * validity * self.config.self_assessment_discount;
        let mut metrics = Metrics::from_scores(
            accuracy,
            coverage,
            accuracy,
            coverage,
            EvaluationBasis::SelfAssessed,
        )
        .with_missing_fields(missing);

        if result.is_empty() {
            metrics = metrics.with_error("Empty extraction");
        } else if coverage < self.config.low_coverage_threshold {
            metrics = metrics.with_error(format!("Low coverage: {:.0}%", coverage * 100.0));
        }
        if validity < 1.0 {
            metrics = metrics.with_error(format!(
                "Structural validity {:.0}%",
                clamp_unit(validity) * 100.0
            ));
        }
        metrics
    }
}

/// Type-appropriate comparison of an extracted value with a reference value.
pub fn values_match(actual: &FieldValue, expected: &FieldValue, tolerance: f64) -> bool {
    match (actual, expected) {
        (FieldValue::Null, FieldValue::Null) => true,
        (FieldValue::Number(a), FieldValue::Number(b)) => numbers_match(*a, *b, tolerance),
        (FieldValue::Number(a), FieldValue::Text(b)) | (FieldValue::Text(b), FieldValue::Number(a)) => {
            parse_number(b).is_some_and(|b| numbers_match(*a, b, tolerance))
        }
        (FieldValue::Text(a), FieldValue::Text(b)) => {
            a.trim().to_lowercase() == b.trim().to_lowercase()
        }
        (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
        (FieldValue::List(a), FieldValue::List(b)) => lists_match(a, b, tolerance),
        (FieldValue::Record(a), FieldValue::Record(b)) => b
            .iter()
            .filter(|(_, v)| v.is_present())
            .all(|(k, v)| a.get(k).is_some_and(|av| values_match(av, v, tolerance))),
        _ => false,
    }
}

/// Relative tolerance comparison.
pub fn numbers_match(a: f64, b: f64, tolerance: f64) -> bool {
    if a == b {
        return true;
    }
    let scale = a.abs().max(b.abs());
    (a - b).abs() <= tolerance * scale
}

/// Order-insensitive list comparison: every expected item must pair with a
/// distinct actual item, and lengths must agree.
fn lists_match(actual: &[FieldValue], expected: &[FieldValue], tolerance: f64) -> bool {
    if actual.len() != expected.len() {
        return false;
    }
    let mut used = vec![false; actual.len()];
    expected.iter().all(|e| {
        let found = actual
            .iter()
            .enumerate()
            .find(|(i, a)| !used[*i] && values_match(a, e, tolerance))
            .map(|(i, _)| i);
        match found {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}
