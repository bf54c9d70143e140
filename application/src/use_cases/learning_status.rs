//! Learning Status use case
//!
//! Reads the whole ledger once and summarizes it for operators. Nothing is
//! invoked and nothing is written.

use crate::config::EngineConfig;
use crate::ports::ledger_store::{LedgerStore, StoreError};
use crate::use_cases::engine::performance_window;
use coach_domain::{LearningStatus, LedgerFilter, PhaseClassifier, StatusOptions, StrategySelector};
use std::sync::Arc;
use tracing::debug;

/// Use case for summarizing the learning state
pub struct LearningStatusUseCase {
    store: Arc<dyn LedgerStore>,
    classifier: PhaseClassifier,
    options: StatusOptions,
}

impl LearningStatusUseCase {
    pub fn new(store: Arc<dyn LedgerStore>, classifier: PhaseClassifier) -> Self {
        Self {
            store,
            classifier,
            options: StatusOptions::default(),
        }
    }

    /// Use the window and plateau tolerance a coaching run would use.
    pub fn with_run_settings(mut self, config: &EngineConfig, selector: &StrategySelector) -> Self {
        self.options.window = performance_window(config, selector);
        self.options.stable_spread = selector.config().stuck_spread;
        self
    }

    pub fn with_recent_sessions(mut self, limit: usize) -> Self {
        self.options.recent_sessions = limit;
        self
    }

    pub async fn execute(&self) -> Result<LearningStatus, StoreError> {
        let snapshot = self.store.snapshot(&LedgerFilter::all()).await?;
        debug!("Summarizing {} ledger records", snapshot.len());
        Ok(LearningStatus::from_snapshot(&snapshot, &self.classifier, &self.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::MemoryStore;
    use coach_domain::{
        AgentId, DocumentClass, DocumentId, EvaluationBasis, ExtractionAttempt, ExtractionPayload,
        LearningPhase, LedgerEntry, Metrics, SelectorConfig, Trend,
    };

    fn attempt(doc: &str, round: u32, accuracy: f64) -> LedgerEntry {
        LedgerEntry::Attempt(ExtractionAttempt::new(
            DocumentId::new(doc),
            DocumentClass::new("brf_annual_report"),
            AgentId::new("balance_sheet_agent"),
            round,
            round,
            ExtractionPayload::new(),
            Metrics::from_scores(accuracy, 1.0, accuracy, accuracy, EvaluationBasis::Reference),
        ))
    }

    #[tokio::test]
    async fn test_status_reads_the_whole_ledger() {
        let store = Arc::new(MemoryStore::default());
        for (doc, round, accuracy) in [("d1", 1, 0.5), ("d1", 2, 0.7), ("d2", 1, 0.9)] {
            store.append(attempt(doc, round, accuracy)).await.unwrap();
        }

        let status = LearningStatusUseCase::new(store, PhaseClassifier::default())
            .with_recent_sessions(5)
            .execute()
            .await
            .unwrap();

        assert_eq!(status.as_of_seq, 3);
        assert_eq!(status.classes[0].documents, 2);
        assert_eq!(status.classes[0].phase, LearningPhase::Exploration);
        assert_eq!(status.agents.len(), 1);
        assert_eq!(status.agents[0].attempts, 3);
        assert_eq!(status.agents[0].trend, Trend::Improving);
        assert_eq!(status.recent_sessions[0].document_id.as_str(), "d2");
        assert_eq!(status.recent_sessions[1].rounds, 2);
    }

    #[tokio::test]
    async fn test_run_settings_set_the_convergence_window() {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::default());
        for (doc, accuracy) in [("d1", 0.90), ("d2", 0.91), ("d3", 0.90)] {
            store.append(attempt(doc, 1, accuracy)).await.unwrap();
        }
        let config = EngineConfig {
            history_window: 3,
            ..EngineConfig::default()
        };
        let selector = StrategySelector::new(SelectorConfig {
            stuck_window: 2,
            ..SelectorConfig::default()
        });

        let short = LearningStatusUseCase::new(Arc::clone(&store), PhaseClassifier::default())
            .with_run_settings(&config, &selector)
            .execute()
            .await
            .unwrap();
        assert!(short.agents[0].converged);

        let default = LearningStatusUseCase::new(store, PhaseClassifier::default())
            .execute()
            .await
            .unwrap();
        assert!(!default.agents[0].converged);
    }
}
