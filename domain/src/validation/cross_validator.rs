//! Applies [`ValidationRule`]s to the final payloads of one document.

use super::rules::ValidationRule;
use crate::core::ids::AgentId;
use crate::extraction::parsing::parse_number;
use crate::extraction::{ExtractionPayload, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One violated rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub rule: String,
    pub agents: Vec<AgentId>,
    pub message: String,
    /// Absolute numeric difference, for numeric rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difference: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Rules whose inputs were all present.
    pub checked: usize,
    /// Rules skipped for missing inputs.
    pub skipped: Vec<String>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

enum Outcome {
    Skipped,
    Passed,
    Violated { message: String, difference: Option<f64> },
}

#[derive(Debug, Clone)]
pub struct CrossValidator {
    rules: Vec<ValidationRule>,
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self::new(ValidationRule::brf_defaults())
    }
}

impl CrossValidator {
    pub fn new(rules: Vec<ValidationRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn validate(&self, results: &BTreeMap<AgentId, ExtractionPayload>) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rule in &self.rules {
            match check(rule, results) {
                Outcome::Skipped => report.skipped.push(rule.name().to_string()),
                Outcome::Passed => report.checked += 1,
                Outcome::Violated { message, difference } => {
                    report.checked += 1;
                    report.warnings.push(ValidationWarning {
                        rule: rule.name().to_string(),
                        agents: rule.agents(),
                        message,
                        difference,
                    });
                }
            }
        }
        report
    }
}

fn numeric(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(n) => Some(*n),
        FieldValue::Text(s) => parse_number(s),
        _ => None,
    }
}

fn field_number(payload: &ExtractionPayload, field: &str) -> Option<f64> {
    payload.get(field).and_then(numeric)
}

fn sum_fields(payload: &ExtractionPayload, fields: &[String]) -> Option<f64> {
    fields.iter().map(|f| field_number(payload, f)).sum()
}

fn compare(expected: f64, actual: f64, tolerance: f64, describe: impl FnOnce() -> String) -> Outcome {
    let difference = (expected - actual).abs();
    if difference <= tolerance {
        Outcome::Passed
    } else {
        Outcome::Violated {
            message: format!("{} (difference {difference}, tolerance {tolerance})", describe()),
            difference: Some(difference),
        }
    }
}

fn check(rule: &ValidationRule, results: &BTreeMap<AgentId, ExtractionPayload>) -> Outcome {
    match rule {
        ValidationRule::SumEquals {
            agent,
            plus,
            minus,
            equals,
            tolerance,
            ..
        } => {
            let Some(payload) = results.get(agent) else {
                return Outcome::Skipped;
            };
            let (Some(p), Some(m), Some(target)) = (
                sum_fields(payload, plus),
                sum_fields(payload, minus),
                field_number(payload, equals),
            ) else {
                return Outcome::Skipped;
            };
            compare(p - m, target, *tolerance, || {
                let mut lhs = plus.join(" + ");
                for f in minus {
                    lhs.push_str(" - ");
                    lhs.push_str(f);
                }
                format!("{lhs} = {} but {equals} = {target}", p - m)
            })
        }
        ValidationRule::ListSumEquals {
            agent,
            list,
            item_field,
            equals,
            tolerance,
            ..
        } => {
            let Some(payload) = results.get(agent) else {
                return Outcome::Skipped;
            };
            let (Some(items), Some(target)) = (payload.list(list), field_number(payload, equals)) else {
                return Outcome::Skipped;
            };
            let amounts: Vec<f64> = items
                .iter()
                .filter_map(|item| match item {
                    FieldValue::Record(map) => map.get(item_field).and_then(numeric),
                    other => numeric(other),
                })
                .collect();
            if amounts.is_empty() {
                return Outcome::Skipped;
            }
            let sum: f64 = amounts.iter().sum();
            compare(sum, target, *tolerance, || {
                format!("sum of {list}[].{item_field} = {sum} but {equals} = {target}")
            })
        }
        ValidationRule::MinCardinality {
            agent, field, min, ..
        } => {
            let Some(items) = results.get(agent).and_then(|p| p.list(field)) else {
                return Outcome::Skipped;
            };
            if items.len() >= *min {
                Outcome::Passed
            } else {
                Outcome::Violated {
                    message: format!("{field} has {} entries, expected at least {min}", items.len()),
                    difference: None,
                }
            }
        }
        ValidationRule::CrossAgentAgreement {
            field,
            agents,
            tolerance,
            ..
        } => {
            let values: Vec<(&AgentId, &FieldValue)> = agents
                .iter()
                .filter_map(|a| {
                    results
                        .get(a)
                        .and_then(|p| p.get(field))
                        .filter(|v| v.is_present())
                        .map(|v| (a, v))
                })
                .collect();
            if values.len() < 2 {
                return Outcome::Skipped;
            }
            let (first_agent, first) = values[0];
            for &(agent, value) in &values[1..] {
                let outcome = match tolerance {
                    Some(tol) => match (numeric(first), numeric(value)) {
                        (Some(a), Some(b)) => compare(a, b, *tol, || {
                            format!("{field}: {first_agent} reports {a}, {agent} reports {b}")
                        }),
                        _ => Outcome::Skipped,
                    },
                    None => {
                        let a = text_form(first);
                        let b = text_form(value);
                        if a == b {
                            Outcome::Passed
                        } else {
                            Outcome::Violated {
                                message: format!(
                                    "{field}: {first_agent} reports '{a}', {agent} reports '{b}'"
                                ),
                                difference: None,
                            }
                        }
                    }
                };
                if !matches!(outcome, Outcome::Passed) {
                    return outcome;
                }
            }
            Outcome::Passed
        }
    }
}

fn text_form(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.trim().to_lowercase(),
        other => serde_json::to_string(other).unwrap_or_default().to_lowercase(),
    }
}
