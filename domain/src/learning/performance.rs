//! Performance records.
//!
//! A [`PerformanceRecord`] is derived on demand from the attempts in a
//! ledger snapshot. It is never stored or mutated in place.

use crate::core::ids::{AgentId, DocumentClass, DocumentId};
use crate::extraction::attempt::{AttemptSummary, ExtractionAttempt};
use serde::{Deserialize, Serialize};

/// Slope (accuracy per attempt) below which the window counts as flat.
const FLAT_SLOPE: f64 = 0.01;

/// Direction of recent accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Flat,
    /// Fewer than two data points.
    Insufficient,
}

/// Aggregated history of one agent within one document class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub document_class: DocumentClass,
    pub agent_id: AgentId,
    pub total_attempts: usize,
    /// Highest-accuracy attempt; ties resolve to the earliest.
    pub best_ever: Option<AttemptSummary>,
    /// Most recent attempts, oldest first.
    pub recent_window: Vec<AttemptSummary>,
    pub trend: Trend,
    pub window_mean: f64,
    /// max - min accuracy over the window.
    pub window_spread: f64,
}

impl PerformanceRecord {
    /// Aggregate attempts given in ledger order.
    ///
    /// Attempts for other agents or classes are ignored.
    pub fn from_attempts<'a>(
        document_class: &DocumentClass,
        agent_id: &AgentId,
        attempts: impl IntoIterator<Item = &'a ExtractionAttempt>,
        window: usize,
    ) -> Self {
        let summaries: Vec<AttemptSummary> = attempts
            .into_iter()
            .filter(|a| &a.agent_id == agent_id && &a.document_class == document_class)
            .map(ExtractionAttempt::summary)
            .collect();

        let mut best_ever: Option<&AttemptSummary> = None;
        for summary in &summaries {
            if best_ever.is_none_or(|b| summary.accuracy > b.accuracy) {
                best_ever = Some(summary);
            }
        }
        let best_ever = best_ever.cloned();

        let start = summaries.len().saturating_sub(window);
        let recent_window = summaries[start..].to_vec();
        let accuracies: Vec<f64> = recent_window.iter().map(|s| s.accuracy).collect();

        let (window_mean, window_spread) = if accuracies.is_empty() {
            (0.0, 0.0)
        } else {
            let mean = accuracies.iter().sum::<f64>() / accuracies.len() as f64;
            let max = accuracies.iter().cloned().fold(f64::MIN, f64::max);
            let min = accuracies.iter().cloned().fold(f64::MAX, f64::min);
            (mean, max - min)
        };

        Self {
            document_class: document_class.clone(),
            agent_id: agent_id.clone(),
            total_attempts: summaries.len(),
            best_ever,
            trend: classify_trend(&accuracies),
            recent_window,
            window_mean,
            window_spread,
        }
    }

    pub fn best_accuracy(&self) -> f64 {
        self.best_ever.as_ref().map_or(0.0, |b| b.accuracy)
    }

    pub fn is_empty(&self) -> bool {
        self.total_attempts == 0
    }

    /// Whether the window holds at least `n` attempts.
    pub fn window_is_full(&self, n: usize) -> bool {
        n > 0 && self.recent_window.len() >= n
    }

    /// Find a round of `document` in the window or the best-ever slot.
    ///
    /// Round numbers restart for every document, so attempts of other
    /// documents never match.
    pub fn find_round(&self, document: &DocumentId, round: u32) -> Option<&AttemptSummary> {
        let matches = |s: &&AttemptSummary| &s.document_id == document && s.round == round;
        self.recent_window
            .iter()
            .rev()
            .find(matches)
            .or(self.best_ever.as_ref().filter(matches))
    }
}

/// Least-squares slope over equally spaced points.
pub fn slope(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    Some(num / den)
}

fn classify_trend(values: &[f64]) -> Trend {
    match slope(values) {
        None => Trend::Insufficient,
        Some(s) if s > FLAT_SLOPE => Trend::Improving,
        Some(s) if s < -FLAT_SLOPE => Trend::Declining,
        Some(_) => Trend::Flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::payload::ExtractionPayload;
    use crate::quality::{EvaluationBasis, Metrics};

    fn attempt(doc: &str, agent: &str, round: u32, accuracy: f64) -> ExtractionAttempt {
        ExtractionAttempt::new(
            DocumentId::new(doc),
            DocumentClass::default(),
            AgentId::new(agent),
            round,
            round,
            ExtractionPayload::new(),
            Metrics::from_scores(accuracy, 1.0, accuracy, accuracy, EvaluationBasis::Reference),
        )
    }

    fn record(attempts: &[ExtractionAttempt], window: usize) -> PerformanceRecord {
        PerformanceRecord::from_attempts(
            &DocumentClass::default(),
            &AgentId::new("balance_sheet"),
            attempts,
            window,
        )
    }

    #[test]
    fn test_empty_history() {
        let r = record(&[], 5);
        assert!(r.is_empty());
        assert_eq!(r.best_accuracy(), 0.0);
        assert_eq!(r.trend, Trend::Insufficient);
        assert!(!r.window_is_full(5));
    }

    #[test]
    fn test_best_ever_and_window() {
        let attempts = vec![
            attempt("d1", "balance_sheet", 1, 0.62),
            attempt("d1", "balance_sheet", 2, 0.81),
            attempt("d1", "other", 1, 0.99),
            attempt("d1", "balance_sheet", 3, 0.68),
        ];
        let r = record(&attempts, 2);
        assert_eq!(r.total_attempts, 3);
        assert_eq!(r.best_ever.as_ref().unwrap().round, 2);
        assert_eq!(r.recent_window.len(), 2);
        assert_eq!(r.recent_window[0].round, 2);
        assert!((r.window_spread - 0.13).abs() < 1e-9);
        assert_eq!(r.find_round(&DocumentId::new("d1"), 2).unwrap().accuracy, 0.81);
    }

    #[test]
    fn test_find_round_stays_within_document() {
        let attempts = vec![
            attempt("d1", "balance_sheet", 1, 0.95),
            attempt("d2", "balance_sheet", 1, 0.40),
            attempt("d2", "balance_sheet", 2, 0.55),
        ];
        let r = record(&attempts, 5);
        let d2 = DocumentId::new("d2");
        assert_eq!(r.find_round(&d2, 1).unwrap().accuracy, 0.40);
        assert_eq!(r.find_round(&DocumentId::new("d1"), 1).unwrap().accuracy, 0.95);
        assert!(r.find_round(&d2, 3).is_none());
        assert!(r.find_round(&DocumentId::new("d3"), 1).is_none());
    }

    #[test]
    fn test_best_ever_ties_resolve_to_earliest() {
        let attempts = vec![
            attempt("d1", "balance_sheet", 1, 0.9),
            attempt("d2", "balance_sheet", 1, 0.9),
        ];
        let best = record(&attempts, 5).best_ever.unwrap();
        assert_eq!(best.document_id.as_str(), "d1");
    }

    #[test]
    fn test_trend() {
        let up: Vec<_> = (1..=5)
            .map(|r| attempt("d", "balance_sheet", r, 0.5 + 0.05 * r as f64))
            .collect();
        assert_eq!(record(&up, 5).trend, Trend::Improving);

        let down: Vec<_> = (1..=5)
            .map(|r| attempt("d", "balance_sheet", r, 0.9 - 0.05 * r as f64))
            .collect();
        assert_eq!(record(&down, 5).trend, Trend::Declining);

        let flat: Vec<_> = (1..=5)
            .map(|r| attempt("d", "balance_sheet", r, 0.8))
            .collect();
        let r = record(&flat, 5);
        assert_eq!(r.trend, Trend::Flat);
        assert_eq!(r.window_spread, 0.0);
        assert!(r.window_is_full(5));
    }

    #[test]
    fn test_slope() {
        assert_eq!(slope(&[1.0]), None);
        assert!((slope(&[0.0, 1.0, 2.0]).unwrap() - 1.0).abs() < 1e-12);
    }
}
