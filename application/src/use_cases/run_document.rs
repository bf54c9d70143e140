//! Run Document use case
//!
//! Runs every routed agent on one sectionized document:
//!
//! 1. Route sections to agents and build the tiered execution plan
//! 2. Coach each agent, batch by batch ([`execute_plan`])
//! 3. Cross-validate the final payloads
//! 4. Curate golden examples from this document's attempts
//!
//! Agent-level problems never fail the document; they show up as failed
//! [`AgentOutcome`]s. Only a ledger failure aborts the run, and then the
//! report keeps the outcomes collected so far.

use crate::ports::ledger_store::StoreError;
use crate::ports::progress::{NoProgress, ProgressNotifier};
use crate::ports::run_logger::RunEvent;
use crate::ports::sectionizer::SectionizedDocument;
use crate::use_cases::coach_agent::{AgentTask, CoachAgentUseCase, CoachError};
use crate::use_cases::engine::EngineServices;
use crate::use_cases::scheduler::{ScheduleOutcome, TaskFailure, execute_plan};
use chrono::Utc;
use coach_domain::{
    AgentId, AgentOutcome, Assignment, Document, DocumentReport, DocumentStatus, ExecutionPlan,
    ExtractionPayload, GoldenAction, LedgerEntry, LedgerEntryKind, LedgerFilter,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that stop a document run
#[derive(Error, Debug)]
pub enum RunDocumentError {
    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Agent {agent} aborted the document: {message}")]
    Agent { agent: AgentId, message: String },
}

impl RunDocumentError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunDocumentError::Cancelled)
    }
}

/// Use case for running all agents on one document
#[derive(Clone)]
pub struct RunDocumentUseCase {
    services: EngineServices,
}

impl RunDocumentUseCase {
    pub fn new(services: EngineServices) -> Self {
        Self { services }
    }

    /// Execute the use case with default (no-op) progress
    pub async fn execute(&self, input: SectionizedDocument, token: &CancellationToken) -> DocumentReport {
        self.execute_with_progress(input, token, Arc::new(NoProgress)).await
    }

    /// Execute the use case with progress callbacks
    pub async fn execute_with_progress(
        &self,
        input: SectionizedDocument,
        token: &CancellationToken,
        progress: Arc<dyn ProgressNotifier>,
    ) -> DocumentReport {
        let SectionizedDocument {
            document,
            references,
        } = input;
        let document = Arc::new(document);
        let mut report = DocumentReport::new(document.id.clone(), document.class.clone(), Utc::now());

        info!("Starting document {} ({})", document.id, document.class);

        match self
            .run(&document, references, token, &progress, &mut report)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {
                info!("Document {} cancelled", document.id);
                report.status = DocumentStatus::Cancelled;
            }
            Err(e) => {
                warn!("Document {} failed: {}", document.id, e);
                self.services.logger.log(RunEvent::new(
                    "document_failed",
                    json!({
                        "document_id": document.id,
                        "reason": e.to_string(),
                        "agents_finished": report.agents.len(),
                    }),
                ));
                report.status = DocumentStatus::Failed {
                    reason: e.to_string(),
                };
            }
        }

        report.finished_at = Utc::now();
        progress.on_document_complete(&report);
        report
    }

    async fn run(
        &self,
        document: &Arc<Document>,
        references: BTreeMap<AgentId, Value>,
        token: &CancellationToken,
        progress: &Arc<dyn ProgressNotifier>,
        report: &mut DocumentReport,
    ) -> Result<(), RunDocumentError> {
        let documents_seen = self.services.store.document_count(&document.class).await?;
        report.phase = Some(self.services.classifier.classify(documents_seen));

        let routing = self.services.router.route(&document.sections);
        report.unmatched_sections = routing.unmatched_sections.clone();
        if !routing.unmatched_sections.is_empty() {
            debug!(
                "{}: {} sections matched no agent: {:?}",
                document.id,
                routing.unmatched_sections.len(),
                routing.unmatched_sections
            );
        }

        let plan = ExecutionPlan::build(routing.assignments, self.services.config.agent_concurrency);
        info!(
            "{}: {} agents in {} batches ({:?} phase)",
            document.id,
            plan.agent_count(),
            plan.batch_count(),
            report.phase
        );
        progress.on_document_start(&document.id, plan.agent_count());

        let mut references = self.conform_references(&plan, references).await;
        let coach = CoachAgentUseCase::new(self.services.clone());
        let schedule = execute_plan(&plan, &document.id, token, progress.as_ref(), |assignment| {
            let task = AgentTask {
                document: Arc::clone(document),
                reference: references.remove(&assignment.agent_id),
                assignment,
            };
            let coach = coach.clone();
            let token = token.clone();
            let progress = Arc::clone(progress);
            async move {
                let result = coach.execute(&task, &token).await;
                let accuracy = result.as_ref().ok().map(AgentOutcome::accuracy);
                progress.on_agent_complete(&task.document.id, &task.assignment.agent_id, accuracy);
                result
            }
        })
        .await;

        let stop = self.collect(schedule, report).await;
        if let Some(err) = stop {
            return Err(err);
        }
        if token.is_cancelled() {
            return Err(RunDocumentError::Cancelled);
        }

        report.validation = self.services.validator.validate(&report.final_payloads());
        for warning in &report.validation.warnings {
            warn!("{}: {} ({})", document.id, warning.message, warning.rule);
        }

        report.golden_promotions = self.curate(document).await?;
        Ok(())
    }

    /// Conform raw reference data through each routed agent's schema.
    async fn conform_references(
        &self,
        plan: &ExecutionPlan,
        mut raw: BTreeMap<AgentId, Value>,
    ) -> HashMap<AgentId, ExtractionPayload> {
        let mut conformed = HashMap::new();
        for assignment in plan.batches().flat_map(|b| b.assignments.iter()) {
            let (Some(value), Some(agent)) = (
                raw.remove(&assignment.agent_id),
                self.services.agents.get(&assignment.agent_id),
            ) else {
                continue;
            };
            let result = agent.lock().await.spec().schema.conform(&value);
            if !result.violations.is_empty() {
                debug!(
                    "Reference for {} has {} schema violations",
                    assignment.agent_id,
                    result.violations.len()
                );
            }
            conformed.insert(assignment.agent_id.clone(), result.payload);
        }
        conformed
    }

    /// Move scheduler results into the report.
    ///
    /// Returns the error that stopped scheduling, if any.
    async fn collect(
        &self,
        schedule: ScheduleOutcome<AgentOutcome, CoachError>,
        report: &mut DocumentReport,
    ) -> Option<RunDocumentError> {
        let mut stop = None;
        for finished in schedule.finished {
            let assignment = finished.assignment;
            match finished.result {
                Ok(outcome) => report.agents.push(outcome),
                Err(TaskFailure::Error(e)) if e.is_cancelled() => {
                    report.agents.push(self.failed(&assignment, "cancelled").await);
                }
                Err(TaskFailure::Error(e)) => {
                    warn!("{} failed: {}", assignment.agent_id, e);
                    report.agents.push(self.failed(&assignment, e.to_string()).await);
                    if stop.is_none() {
                        stop = Some(match e {
                            CoachError::Store(store) => RunDocumentError::Store(store),
                            other => RunDocumentError::Agent {
                                agent: assignment.agent_id.clone(),
                                message: other.to_string(),
                            },
                        });
                    }
                }
                Err(TaskFailure::Panicked) => {
                    warn!("{} task panicked", assignment.agent_id);
                    report.agents.push(self.failed(&assignment, "agent task panicked").await);
                }
            }
        }

        let reason = if schedule.cancelled {
            "cancelled before completion"
        } else {
            "not run: document stopped early"
        };
        for assignment in &schedule.unfinished {
            report.agents.push(self.failed(assignment, reason).await);
        }

        if schedule.cancelled && stop.is_none() {
            stop = Some(RunDocumentError::Cancelled);
        }
        stop
    }

    async fn failed(&self, assignment: &Assignment, reason: impl Into<String>) -> AgentOutcome {
        let version = self
            .services
            .agents
            .current_instruction(&assignment.agent_id)
            .await
            .map_or(0, |i| i.version);
        AgentOutcome::failed(assignment.agent_id.clone(), assignment.tier, version, reason)
    }

    /// Promote qualifying attempts of this document into the golden set.
    async fn curate(&self, document: &Document) -> Result<usize, StoreError> {
        let _gate = self.services.golden_gate.lock().await;
        let golden_filter = LedgerFilter::all()
            .class(document.class.clone())
            .kind(LedgerEntryKind::GoldenPromoted)
            .kind(LedgerEntryKind::GoldenDeactivated);
        let mut golden = self.services.store.snapshot(&golden_filter).await?.golden_set();
        let attempts = self
            .services
            .store
            .snapshot(
                &LedgerFilter::all()
                    .document(document.id.clone())
                    .kind(LedgerEntryKind::Attempt),
            )
            .await?;
        let curator = &self.services.curator;

        let mut candidates: Vec<_> = attempts
            .attempts()
            .filter(|a| curator.qualifies(a))
            .collect();
        candidates.sort_by(|a, b| b.accuracy().total_cmp(&a.accuracy()));

        let mut promoted = 0;
        for attempt in candidates {
            for action in curator.curate(&golden, attempt) {
                self.services
                    .store
                    .append(LedgerEntry::from(action.clone()))
                    .await?;
                match &action {
                    GoldenAction::Promote(example) => {
                        promoted += 1;
                        info!(
                            "Golden example: {} round {} on {} ({:.3})",
                            example.agent_id, example.round, example.document_id, example.score
                        );
                        self.services.logger.log(RunEvent::new(
                            "golden_promoted",
                            json!({
                                "document_id": example.document_id,
                                "agent_id": example.agent_id,
                                "round": example.round,
                                "score": example.score,
                            }),
                        ));
                    }
                    GoldenAction::Deactivate(d) => {
                        debug!("Golden example deactivated: {}", d.reason);
                        self.services.logger.log(RunEvent::new(
                            "golden_deactivated",
                            json!({
                                "document_id": d.document_id,
                                "agent_id": d.agent_id,
                                "round": d.round,
                                "reason": d.reason,
                            }),
                        ));
                    }
                }
                golden.apply(&action);
            }
        }
        Ok(promoted)
    }
}
