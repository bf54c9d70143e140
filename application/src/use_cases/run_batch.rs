//! Run Batch use case
//!
//! Sectionizes a document source and runs each document independently,
//! bounded by the document concurrency limit. Every document gets a child
//! cancellation token: cancelling the batch reaches all of them, while a
//! failing document never affects its siblings.
//!
//! With [`RunBatchUseCase::with_skip_processed`], documents that already
//! have attempts in the ledger are reported as skipped without running.

use crate::ports::ledger_store::StoreError;
use crate::ports::progress::{NoProgress, ProgressNotifier};
use crate::ports::sectionizer::{SectionizeError, Sectionizer};
use crate::use_cases::engine::EngineServices;
use crate::use_cases::run_document::RunDocumentUseCase;
use chrono::Utc;
use coach_domain::{DocumentClass, DocumentId, DocumentReport, DocumentStatus, LedgerFilter, RunReport};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Class recorded for documents that could not be read.
const UNREAD_CLASS: &str = "unknown";

/// Errors that prevent a batch from starting
#[derive(Error, Debug)]
pub enum RunBatchError {
    #[error("No documents found in {0}")]
    NoDocuments(String),

    #[error(transparent)]
    Sectionize(#[from] SectionizeError),

    #[error("Could not restore learning state: {0}")]
    Restore(#[from] StoreError),
}

/// Use case for running a batch of documents
pub struct RunBatchUseCase {
    services: EngineServices,
    sectionizer: Arc<dyn Sectionizer>,
    skip_processed: bool,
}

impl RunBatchUseCase {
    pub fn new(services: EngineServices, sectionizer: Arc<dyn Sectionizer>) -> Self {
        Self {
            services,
            sectionizer,
            skip_processed: false,
        }
    }

    /// Skip documents that already have attempts in the ledger.
    pub fn with_skip_processed(mut self, skip: bool) -> Self {
        self.skip_processed = skip;
        self
    }

    /// Execute the use case with default (no-op) progress
    pub async fn execute(&self, source: &str, token: &CancellationToken) -> Result<RunReport, RunBatchError> {
        self.execute_with_progress(source, token, Arc::new(NoProgress)).await
    }

    /// Execute the use case with progress callbacks
    pub async fn execute_with_progress(
        &self,
        source: &str,
        token: &CancellationToken,
        progress: Arc<dyn ProgressNotifier>,
    ) -> Result<RunReport, RunBatchError> {
        let started_at = Utc::now();

        let history = self.services.store.snapshot(&LedgerFilter::all()).await?;
        let replayed = self.services.agents.restore(&history).await;
        if replayed > 0 {
            info!("Restored {} instruction changes from the ledger", replayed);
        }
        let processed: Arc<HashSet<DocumentId>> = Arc::new(if self.skip_processed {
            history.processed_documents().into_iter().cloned().collect()
        } else {
            HashSet::new()
        });

        let locations = self.sectionizer.discover(source).await?;
        if locations.is_empty() {
            return Err(RunBatchError::NoDocuments(source.to_string()));
        }
        info!(
            "Running {} documents (up to {} at a time)",
            locations.len(),
            self.services.config.document_concurrency
        );
        progress.on_run_start(locations.len());

        let semaphore = Arc::new(Semaphore::new(self.services.config.document_concurrency.max(1)));
        let runner = RunDocumentUseCase::new(self.services.clone());
        let mut join_set = JoinSet::new();

        for (index, location) in locations.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let sectionizer = Arc::clone(&self.sectionizer);
            let runner = runner.clone();
            let progress = Arc::clone(&progress);
            let processed = Arc::clone(&processed);
            let token = token.child_token();
            let location = location.clone();

            join_set.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    let report = unrun(&location, DocumentStatus::Cancelled);
                    progress.on_document_complete(&report);
                    return (index, report);
                };
                let report = match sectionizer.sectionize(&location).await {
                    Ok(input) if processed.contains(&input.document.id) => {
                        info!("Skipping {}: already in the ledger", input.document.id);
                        let mut report = DocumentReport::new(
                            input.document.id,
                            input.document.class,
                            Utc::now(),
                        );
                        report.status = DocumentStatus::Skipped;
                        progress.on_document_complete(&report);
                        report
                    }
                    Ok(document) => runner.execute_with_progress(document, &token, progress).await,
                    Err(e) => {
                        warn!("Skipping {}: {}", location, e);
                        let report = unrun(
                            &location,
                            DocumentStatus::Failed {
                                reason: e.to_string(),
                            },
                        );
                        progress.on_document_complete(&report);
                        report
                    }
                };
                (index, report)
            });
        }

        let mut slots: Vec<Option<DocumentReport>> = vec![None; locations.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => warn!("Document task failed to join: {}", e),
            }
        }

        let documents = slots
            .into_iter()
            .zip(&locations)
            .map(|(slot, location)| {
                slot.unwrap_or_else(|| {
                    unrun(
                        location,
                        DocumentStatus::Failed {
                            reason: "document task panicked".to_string(),
                        },
                    )
                })
            })
            .collect();

        progress.on_run_complete();
        Ok(RunReport {
            started_at,
            finished_at: Utc::now(),
            documents,
        })
    }
}

/// Report for a document that never reached the engine.
fn unrun(location: &str, status: DocumentStatus) -> DocumentReport {
    let mut report = DocumentReport::new(
        DocumentId::new(location),
        DocumentClass::new(UNREAD_CLASS),
        Utc::now(),
    );
    report.status = status;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::advisor::{AdvisoryError, CoachingAdvisor};
    use crate::ports::ledger_store::LedgerStore;
    use crate::ports::model_invoker::{InvokeError, InvokeRequest};
    use crate::ports::sectionizer::SectionizedDocument;
    use crate::use_cases::test_support::{FnInvoker, MemoryStore, quick_config};
    use async_trait::async_trait;
    use coach_domain::learning::InstructionChangeRecord;
    use coach_domain::{
        AdvisoryContext, AgentCatalog, AgentSpec, Document, InstructionChange, LedgerEntry,
        PageRange, PhaseClassifier, PhaseRounds, PhaseThresholds, PriorityTier, RouterConfig,
        Section, SectionRouter, Strategy,
    };
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const BALANCE: &str = r#"{"total_assets": 900, "total_equity": 400, "total_liabilities": 500}"#;

    /// Documents keyed by location; unknown locations are not found.
    struct MemorySectionizer {
        documents: BTreeMap<String, SectionizedDocument>,
        order: Vec<String>,
    }

    impl MemorySectionizer {
        fn new(locations: &[&str]) -> Self {
            let documents = locations
                .iter()
                .filter(|l| !l.starts_with("missing"))
                .map(|l| {
                    let document = Document::new(
                        *l,
                        DocumentClass::new("brf_annual_report"),
                        vec![Section::table("Balansräkning", PageRange::new(2, 3).unwrap())],
                    );
                    let reference = serde_json::from_str(BALANCE).unwrap();
                    (
                        l.to_string(),
                        SectionizedDocument::new(document).with_reference("balance_sheet_agent", reference),
                    )
                })
                .collect();
            Self {
                documents,
                order: locations.iter().map(|l| l.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl Sectionizer for MemorySectionizer {
        async fn discover(&self, _source: &str) -> Result<Vec<String>, SectionizeError> {
            Ok(self.order.clone())
        }

        async fn sectionize(&self, location: &str) -> Result<SectionizedDocument, SectionizeError> {
            self.documents
                .get(location)
                .cloned()
                .ok_or_else(|| SectionizeError::NotFound(location.to_string()))
        }
    }

    fn catalog() -> AgentCatalog {
        AgentCatalog::new(vec![
            AgentSpec::new("balance_sheet_agent", PriorityTier::Critical, "Extract the balance sheet.")
                .with_targets(["Balansräkning"]),
        ])
    }

    fn services<F>(store: Arc<MemoryStore>, invoker: FnInvoker<F>) -> EngineServices
    where
        F: Fn(&InvokeRequest) -> Result<String, InvokeError> + Send + Sync + 'static,
    {
        let catalog = catalog();
        EngineServices::new(Arc::new(invoker), store, &catalog)
            .with_router(SectionRouter::new(&catalog, &RouterConfig::default()))
            .with_config(quick_config().with_document_concurrency(2))
    }

    fn balance(_request: &InvokeRequest) -> Result<String, InvokeError> {
        Ok(BALANCE.to_string())
    }

    /// Slow advisor counting how many of its calls overlap.
    #[derive(Default)]
    struct OverlapAdvisor {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CoachingAdvisor for OverlapAdvisor {
        async fn advise(&self, _context: &AdvisoryContext) -> Result<String, AdvisoryError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(25)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(r#"{"strategy": "maintain", "confidence": 0.8, "reasoning": "hold"}"#.to_string())
        }
    }

    // ==================== Batch Runs ====================

    #[tokio::test]
    async fn test_batch_keeps_order_and_isolates_failures() {
        let sectionizer = MemorySectionizer::new(&["brf_001", "missing_002", "brf_003"]);
        let use_case = RunBatchUseCase::new(
            services(Arc::new(MemoryStore::default()), FnInvoker(balance)),
            Arc::new(sectionizer),
        );

        let report = use_case.execute("reports/", &CancellationToken::new()).await.unwrap();

        let ids: Vec<&str> = report.documents.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(ids, vec!["brf_001", "missing_002", "brf_003"]);
        assert!(report.documents[0].is_completed());
        assert!(matches!(report.documents[1].status, DocumentStatus::Failed { .. }));
        assert!(report.documents[2].is_completed());

        let summary = report.summary();
        assert_eq!(summary.documents, 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert!(report.has_failures());
    }

    #[tokio::test]
    async fn test_empty_source_is_an_error() {
        let use_case = RunBatchUseCase::new(
            services(Arc::new(MemoryStore::default()), FnInvoker(balance)),
            Arc::new(MemorySectionizer::new(&[])),
        );

        let err = use_case.execute("empty/", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RunBatchError::NoDocuments(_)));
    }

    #[tokio::test]
    async fn test_cancelled_batch_reports_every_document() {
        let use_case = RunBatchUseCase::new(
            services(Arc::new(MemoryStore::default()), FnInvoker(balance)),
            Arc::new(MemorySectionizer::new(&["brf_001", "brf_002"])),
        );
        let token = CancellationToken::new();
        token.cancel();

        let report = use_case.execute("reports/", &token).await.unwrap();

        assert_eq!(report.documents.len(), 2);
        assert!(
            report
                .documents
                .iter()
                .all(|d| d.status == DocumentStatus::Cancelled)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_decisions_for_one_agent_never_overlap() {
        let advisor = Arc::new(OverlapAdvisor::default());
        let partial = FnInvoker(|_request: &InvokeRequest| {
            Ok(r#"{"total_assets": 900, "total_equity": 1}"#.to_string())
        });
        let services = services(Arc::new(MemoryStore::default()), partial)
            .with_advisor(Arc::clone(&advisor) as Arc<dyn CoachingAdvisor>)
            .with_classifier(PhaseClassifier::new(
                PhaseThresholds::default(),
                PhaseRounds {
                    exploration: 2,
                    ..PhaseRounds::default()
                },
            ))
            .with_config(quick_config().with_document_concurrency(4));
        let use_case = RunBatchUseCase::new(
            services,
            Arc::new(MemorySectionizer::new(&["brf_001", "brf_002", "brf_003", "brf_004"])),
        );

        let report = use_case.execute("reports/", &CancellationToken::new()).await.unwrap();

        assert!(report.documents.iter().all(|d| d.is_completed()));
        assert!(advisor.calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(advisor.max_in_flight.load(Ordering::SeqCst), 1);
    }

    // ==================== Learning Across Runs ====================

    #[tokio::test]
    async fn test_skip_processed_leaves_ledger_documents_alone() {
        let store = Arc::new(MemoryStore::default());
        let first = RunBatchUseCase::new(
            services(Arc::clone(&store), FnInvoker(balance)),
            Arc::new(MemorySectionizer::new(&["brf_001"])),
        );
        first.execute("reports/", &CancellationToken::new()).await.unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&calls);
        let invoker = FnInvoker(move |request: &InvokeRequest| {
            recorder.lock().unwrap().push(request.document_id.to_string());
            Ok(BALANCE.to_string())
        });
        let second = RunBatchUseCase::new(
            services(Arc::clone(&store), invoker),
            Arc::new(MemorySectionizer::new(&["brf_001", "brf_002"])),
        )
        .with_skip_processed(true);

        let report = second.execute("reports/", &CancellationToken::new()).await.unwrap();

        assert_eq!(report.documents[0].status, DocumentStatus::Skipped);
        assert_eq!(report.documents[0].document_class.as_str(), "brf_annual_report");
        assert!(report.documents[1].is_completed());
        assert_eq!(report.summary().skipped, 1);
        assert!(!report.has_failures());
        assert!(calls.lock().unwrap().iter().all(|d| d == "brf_002"));
    }

    #[tokio::test]
    async fn test_processed_documents_rerun_by_default() {
        let store = Arc::new(MemoryStore::default());
        for _ in 0..2 {
            let use_case = RunBatchUseCase::new(
                services(Arc::clone(&store), FnInvoker(balance)),
                Arc::new(MemorySectionizer::new(&["brf_001"])),
            );
            let report = use_case.execute("reports/", &CancellationToken::new()).await.unwrap();
            assert!(report.documents[0].is_completed());
        }
    }

    #[tokio::test]
    async fn test_batch_resumes_instruction_history_from_ledger() {
        let store = Arc::new(MemoryStore::default());
        store
            .append(LedgerEntry::InstructionChanged(InstructionChangeRecord {
                document_id: DocumentId::new("brf_000"),
                change: InstructionChange {
                    agent_id: "balance_sheet_agent".into(),
                    strategy: Strategy::Refine,
                    from_version: 1,
                    to_version: 2,
                    text: "Extract the balance sheet. Totals are in SEK.".into(),
                },
                recorded_at: Utc::now(),
            }))
            .await
            .unwrap();

        let seen: Arc<Mutex<Vec<u32>>> = Arc::default();
        let recorder = Arc::clone(&seen);
        let invoker = FnInvoker(move |request: &InvokeRequest| {
            recorder.lock().unwrap().push(request.instruction.version);
            Ok(BALANCE.to_string())
        });
        let use_case = RunBatchUseCase::new(
            services(store, invoker),
            Arc::new(MemorySectionizer::new(&["brf_001"])),
        );

        use_case.execute("reports/", &CancellationToken::new()).await.unwrap();

        assert_eq!(seen.lock().unwrap().first(), Some(&2));
    }
}
