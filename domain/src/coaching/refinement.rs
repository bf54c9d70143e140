//! Deterministic instruction rewrites.
//!
//! Used whenever a Refine or Explore decision has no validated instruction
//! from the advisory service. Feedback is appended as a single marked block
//! that replaces any earlier block, so repeated refinement does not grow the
//! instruction without bound.

use crate::core::text::truncate;
use crate::quality::Metrics;

const FEEDBACK_MARKER: &str = "\n\nCOACHING FEEDBACK";
const APPROACH_MARKER: &str = "\n\nALTERNATIVE APPROACH";
const MAX_LISTED_FIELDS: usize = 10;

const APPROACHES: [&str; 3] = [
    "Scan every table on the given pages first, then use the surrounding text only to fill gaps.",
    "Work through the section headings in order and extract the fields in the order listed above.",
    "Read the whole zone once, list every candidate value with its page, then pick the best candidate per field.",
];

/// Strip previously appended feedback and approach blocks.
pub fn strip_coaching(instruction: &str) -> &str {
    let cut = [FEEDBACK_MARKER, APPROACH_MARKER]
        .iter()
        .filter_map(|m| instruction.find(m))
        .min()
        .unwrap_or(instruction.len());
    &instruction[..cut]
}

/// Append targeted feedback derived from the attempt's gaps.
pub fn refine(instruction: &str, metrics: &Metrics, round: u32) -> String {
    let mut lines = Vec::new();

    let empty = metrics
        .errors
        .iter()
        .any(|e| e.starts_with("Empty extraction"));
    if empty {
        lines.push(
            "The previous attempt returned nothing. Search for the Swedish terms of each field \
             and check whether the values sit in a table."
                .to_string(),
        );
    }

    if !metrics.missing_fields.is_empty() {
        let listed: Vec<&str> = metrics
            .missing_fields
            .iter()
            .take(MAX_LISTED_FIELDS)
            .map(String::as_str)
            .collect();
        lines.push(format!(
            "These fields were missing: {}. Look for Swedish variations and abbreviations of their names.",
            listed.join(", ")
        ));
    }

    let incorrect: Vec<&str> = metrics
        .errors
        .iter()
        .filter_map(|e| e.strip_prefix("Incorrect value for "))
        .take(MAX_LISTED_FIELDS)
        .collect();
    if !incorrect.is_empty() {
        lines.push(format!(
            "These values were wrong: {}. Swedish reports use a space as thousands separator and a \
             comma as decimal separator; use the current year's column.",
            incorrect.join(", ")
        ));
    }

    if lines.is_empty() {
        lines.push(
            "Re-check every value against the source pages and fill every field that is present."
                .to_string(),
        );
    }

    let mut text = strip_coaching(instruction).to_string();
    text.push_str(&format!("{FEEDBACK_MARKER} (after round {round}):\n"));
    for line in lines {
        text.push_str("- ");
        text.push_str(&line);
        text.push('\n');
    }
    text
}

/// Rewrite the instruction around a different extraction approach.
///
/// The approach is picked by `variant`, so consecutive explorations of the
/// same agent try different approaches.
pub fn explore(instruction: &str, metrics: &Metrics, variant: u32) -> String {
    let approach = APPROACHES[variant as usize % APPROACHES.len()];
    let mut text = strip_coaching(instruction).to_string();
    text.push_str(&format!("{APPROACH_MARKER}:\n{approach}\n"));
    if !metrics.missing_fields.is_empty() {
        let fields = metrics.missing_fields.join(", ");
        text.push_str(&format!("Pay particular attention to: {}\n", truncate(&fields, 400)));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::EvaluationBasis;

    fn metrics() -> Metrics {
        Metrics::from_scores(0.5, 0.5, 0.5, 0.5, EvaluationBasis::Reference)
            .with_missing_fields(vec!["total_assets".into(), "cash_and_bank".into()])
            .with_errors(vec!["Incorrect value for total_equity".into()])
    }

    #[test]
    fn test_refine_lists_gaps() {
        let text = refine("Extract the balance sheet.", &metrics(), 2);
        assert!(text.starts_with("Extract the balance sheet."));
        assert!(text.contains("COACHING FEEDBACK (after round 2)"));
        assert!(text.contains("total_assets, cash_and_bank"));
        assert!(text.contains("These values were wrong: total_equity"));
    }

    #[test]
    fn test_refine_replaces_previous_feedback() {
        let once = refine("Base.", &metrics(), 1);
        let twice = refine(&once, &metrics(), 2);
        assert_eq!(twice.matches("COACHING FEEDBACK").count(), 1);
        assert!(twice.contains("after round 2"));
    }

    #[test]
    fn test_refine_empty_extraction() {
        let m = Metrics::zero(EvaluationBasis::SelfAssessed).with_error("Empty extraction");
        let text = refine("Base.", &m, 1);
        assert!(text.contains("returned nothing"));
    }

    #[test]
    fn test_explore_rotates_approach_and_is_deterministic() {
        let a = explore("Base.", &metrics(), 1);
        let b = explore("Base.", &metrics(), 2);
        assert_ne!(a, b);
        assert_eq!(a, explore("Base.", &metrics(), 1));
        assert_eq!(a, explore(&refine("Base.", &metrics(), 1), &metrics(), 1));
    }

    #[test]
    fn test_strip_coaching() {
        assert_eq!(strip_coaching("Base."), "Base.");
        assert_eq!(strip_coaching(&refine("Base.", &metrics(), 1)), "Base.");
    }
}
