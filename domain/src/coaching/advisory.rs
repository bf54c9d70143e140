//! Advisory service context and response validation.
//!
//! The advisory service is untrusted. Its raw text goes through
//! [`parse_advisory_response`], which either yields a fully validated
//! [`AdvisoryResponse`] or an [`AdvisoryRejection`] explaining why the
//! deterministic fallback must be used instead.

use super::decision::Strategy;
use crate::core::ids::{AgentId, DocumentId};
use crate::extraction::attempt::AttemptSummary;
use crate::extraction::parsing::extract_json_object;
use crate::golden::curator::GoldenExample;
use crate::learning::performance::Trend;
use crate::learning::phase::LearningPhase;
use crate::quality::Metrics;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Confidence assumed when the service omits one.
pub const DEFAULT_ADVISORY_CONFIDENCE: f64 = 0.7;

/// Everything the advisory service is told about one decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisoryContext {
    pub agent_id: AgentId,
    pub document_id: DocumentId,
    pub round: u32,
    pub phase: LearningPhase,
    pub max_rounds: u32,
    pub coaching_rounds_used: u32,
    pub current: Metrics,
    pub best_ever: Option<AttemptSummary>,
    pub recent_history: Vec<AttemptSummary>,
    pub trend: Trend,
    pub allowed_strategies: Vec<Strategy>,
    pub current_instruction: String,
    pub golden_examples: Vec<GoldenExample>,
}

impl AdvisoryContext {
    /// Render the context as a prompt for a text-completion advisor.
    pub fn to_prompt(&self) -> String {
        let best = self
            .best_ever
            .as_ref()
            .map_or("no history".to_string(), |b| {
                format!("{:.1}% (round {}, document {})", b.accuracy * 100.0, b.round, b.document_id)
            });
        let history: Vec<String> = self
            .recent_history
            .iter()
            .map(|s| format!("{}#{}={:.1}%", s.document_id, s.round, s.accuracy * 100.0))
            .collect();
        let allowed: Vec<&str> = self.allowed_strategies.iter().map(Strategy::as_str).collect();
        let errors: Vec<&str> = self.current.errors.iter().take(5).map(String::as_str).collect();
        let missing: Vec<&str> = self
            .current
            .missing_fields
            .iter()
            .take(5)
            .map(String::as_str)
            .collect();

        format!(
            r#"You are coaching a document extraction agent: {agent}
Learning phase: {phase} (round {round}, coaching rounds used {used} of {max})

CURRENT PERFORMANCE:
- Accuracy: {acc:.1}%
- Coverage: {cov:.1}%
- F1: {f1:.1}%
- Errors: {errors}
- Missing fields: {missing}

HISTORY:
- Best ever: {best}
- Recent rounds: {history}
- Trend: {trend:?}
- Golden examples available: {golden}

CURRENT INSTRUCTION:
{instruction}

Recommend one strategy from [{allowed}].
- revert: go back to the instruction that produced the best result
- refine: improve the current instruction (provide new_instruction)
- explore: try a materially different instruction (provide new_instruction)
- maintain: keep the current instruction

Respond ONLY with JSON:
{{"strategy": "...", "target_round": null, "new_instruction": null, "confidence": 0.0, "reasoning": "..."}}"#,
            agent = self.agent_id,
            phase = self.phase,
            round = self.round,
            used = self.coaching_rounds_used,
            max = self.max_rounds,
            acc = self.current.accuracy * 100.0,
            cov = self.current.coverage * 100.0,
            f1 = self.current.f1 * 100.0,
            errors = if errors.is_empty() { "none".to_string() } else { errors.join("; ") },
            missing = if missing.is_empty() { "none".to_string() } else { missing.join(", ") },
            history = if history.is_empty() { "none".to_string() } else { history.join(", ") },
            trend = self.trend,
            golden = self.golden_examples.len(),
            instruction = self.current_instruction,
            allowed = allowed.join(", "),
        )
    }
}

/// A validated advisory recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryResponse {
    pub strategy: Strategy,
    pub target_round: Option<u32>,
    pub new_instruction: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
}

/// Why an advisory response was not used.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdvisoryRejection {
    #[error("advisory service unavailable: {0}")]
    Unavailable(String),

    #[error("no JSON object in advisory response")]
    NotJson,

    #[error("missing or unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("strategy {0} is not allowed here")]
    DisallowedStrategy(Strategy),

    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("new instruction exceeds {max} characters ({len})")]
    InstructionTooLong { len: usize, max: usize },
}

/// Validate a raw advisory reply against the allowed outputs.
pub fn parse_advisory_response(
    raw: &str,
    allowed: &[Strategy],
    max_instruction_chars: usize,
) -> Result<AdvisoryResponse, AdvisoryRejection> {
    let value = extract_json_object(raw).ok_or(AdvisoryRejection::NotJson)?;

    let strategy_text = value
        .get("strategy")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let strategy: Strategy = strategy_text
        .parse()
        .map_err(|_| AdvisoryRejection::UnknownStrategy(strategy_text.to_string()))?;
    if !allowed.contains(&strategy) {
        return Err(AdvisoryRejection::DisallowedStrategy(strategy));
    }

    let confidence = match value.get("confidence") {
        None | Some(Value::Null) => DEFAULT_ADVISORY_CONFIDENCE,
        Some(v) => {
            let c = v.as_f64().ok_or(AdvisoryRejection::ConfidenceOutOfRange(f64::NAN))?;
            if !(0.0..=1.0).contains(&c) {
                return Err(AdvisoryRejection::ConfidenceOutOfRange(c));
            }
            c
        }
    };

    let new_instruction = value
        .get("new_instruction")
        .or_else(|| value.get("new_prompt"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if let Some(text) = &new_instruction {
        let len = text.chars().count();
        if len > max_instruction_chars {
            return Err(AdvisoryRejection::InstructionTooLong {
                len,
                max: max_instruction_chars,
            });
        }
    }

    let target_round = value
        .get("target_round")
        .and_then(Value::as_u64)
        .and_then(|r| u32::try_from(r).ok());

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("advisory recommendation")
        .to_string();

    Ok(AdvisoryResponse {
        strategy,
        target_round,
        new_instruction,
        confidence,
        reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Strategy; 4] = Strategy::ALL;

    #[test]
    fn test_parses_fenced_response() {
        let raw = "Here you go:\n```json\n{\"strategy\": \"Refine\", \"new_instruction\": \"  Do better.  \", \"confidence\": 0.8, \"reasoning\": \"gaps\"}\n```";
        let r = parse_advisory_response(raw, &ALL, 100).unwrap();
        assert_eq!(r.strategy, Strategy::Refine);
        assert_eq!(r.new_instruction.as_deref(), Some("Do better."));
        assert_eq!(r.confidence, 0.8);
        assert_eq!(r.reasoning, "gaps");
    }

    #[test]
    fn test_defaults_confidence() {
        let r = parse_advisory_response(r#"{"strategy":"maintain"}"#, &ALL, 100).unwrap();
        assert_eq!(r.confidence, DEFAULT_ADVISORY_CONFIDENCE);
        assert_eq!(r.target_round, None);
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            parse_advisory_response("no json here", &ALL, 100),
            Err(AdvisoryRejection::NotJson)
        );
        assert!(matches!(
            parse_advisory_response(r#"{"strategy":"rewrite"}"#, &ALL, 100),
            Err(AdvisoryRejection::UnknownStrategy(_))
        ));
        assert!(matches!(
            parse_advisory_response(r#"{"confidence":0.9}"#, &ALL, 100),
            Err(AdvisoryRejection::UnknownStrategy(_))
        ));
        assert_eq!(
            parse_advisory_response(
                r#"{"strategy":"explore"}"#,
                &[Strategy::Refine, Strategy::Maintain],
                100
            ),
            Err(AdvisoryRejection::DisallowedStrategy(Strategy::Explore))
        );
        assert_eq!(
            parse_advisory_response(r#"{"strategy":"refine","confidence":1.5}"#, &ALL, 100),
            Err(AdvisoryRejection::ConfidenceOutOfRange(1.5))
        );
        assert!(matches!(
            parse_advisory_response(r#"{"strategy":"refine","new_instruction":"abcdef"}"#, &ALL, 3),
            Err(AdvisoryRejection::InstructionTooLong { len: 6, max: 3 })
        ));
    }

    #[test]
    fn test_prompt_mentions_allowed_strategies() {
        let ctx = AdvisoryContext {
            agent_id: AgentId::new("balance_sheet_agent"),
            document_id: DocumentId::new("d1"),
            round: 3,
            phase: LearningPhase::Exploration,
            max_rounds: 5,
            coaching_rounds_used: 2,
            current: Metrics::default(),
            best_ever: None,
            recent_history: Vec::new(),
            trend: Trend::Insufficient,
            allowed_strategies: vec![Strategy::Refine, Strategy::Maintain],
            current_instruction: "Extract.".into(),
            golden_examples: Vec::new(),
        };
        let prompt = ctx.to_prompt();
        assert!(prompt.contains("[refine, maintain]"));
        assert!(prompt.contains("balance_sheet_agent"));
        assert!(prompt.contains("Best ever: no history"));
    }
}
