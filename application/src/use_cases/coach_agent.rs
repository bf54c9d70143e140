//! Coach Agent use case
//!
//! One coaching session: a single agent on a single document.
//!
//! Each round invokes the agent with its current instruction on the pages
//! of its extraction zone, scores the result, records the attempt, and asks
//! the Strategy Selector what to do next. The session stops on Maintain,
//! when a decision leaves the instruction unchanged, when a Revert points
//! back into this document, or when the (document, agent) pair has used the
//! phase's `max_rounds`. Rounds recorded by earlier runs count against that
//! budget. The decision after the last budgeted round is still committed, so
//! it shapes the agent's next document.
//! The final result is the best-accuracy attempt of the session.

use crate::ports::advisor::CoachingAdvisor;
use crate::ports::ledger_store::StoreError;
use crate::ports::model_invoker::InvokeRequest;
use crate::ports::run_logger::RunEvent;
use crate::use_cases::engine::EngineServices;
use crate::use_cases::retry::{RetryError, call_with_retry};
use coach_domain::learning::{DecisionRecord, InstructionChangeRecord};
use coach_domain::{
    AdvisoryContext, AdvisoryRejection, AdvisoryResponse, AgentId, AgentOutcome, AgentSpec,
    Assignment, CoachingDecision, DecisionSummary, Document, ExtractionAttempt, ExtractionPayload,
    Instruction, LedgerEntry, LedgerFilter, LedgerSnapshot, Metrics, SelectionInput, Strategy, Verdict,
    extraction::extract_json_object, parse_advisory_response,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that end a session early.
///
/// Per-attempt failures (timeouts, bad output) are not errors: they become
/// zero-accuracy attempts and go through the selector like any other.
#[derive(Error, Debug)]
pub enum CoachError {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoachError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoachError::Cancelled)
    }
}

/// Input for one coaching session.
#[derive(Debug, Clone)]
pub struct AgentTask {
    pub document: Arc<Document>,
    pub assignment: Assignment,
    /// Ground truth for this agent, already conformed to its schema.
    pub reference: Option<ExtractionPayload>,
}

/// Use case for coaching one agent on one document
#[derive(Clone)]
pub struct CoachAgentUseCase {
    services: EngineServices,
}

impl CoachAgentUseCase {
    pub fn new(services: EngineServices) -> Self {
        Self { services }
    }

    pub async fn execute(
        &self,
        task: &AgentTask,
        token: &CancellationToken,
    ) -> Result<AgentOutcome, CoachError> {
        let agent_id = &task.assignment.agent_id;
        let document = task.document.as_ref();
        let handle = self
            .services
            .agents
            .get(agent_id)
            .ok_or_else(|| CoachError::UnknownAgent(agent_id.clone()))?;
        let spec = handle.lock().await.spec().clone();
        let pages = document.zone_pages(&task.assignment.pages);
        let agent_filter = LedgerFilter::all()
            .class(document.class.clone())
            .agent(agent_id.clone());

        let mut snapshot = self.services.store.snapshot(&agent_filter).await?;
        let mut round = snapshot.next_round(&document.id, agent_id);

        debug!(
            "Coaching {} on {} ({} zone pages, starting at round {})",
            agent_id,
            document.id,
            pages.len(),
            round
        );

        let mut attempts: Vec<ExtractionAttempt> = Vec::new();
        let mut decisions: Vec<DecisionSummary> = Vec::new();
        let mut adopted_round: Option<u32> = None;

        loop {
            if token.is_cancelled() {
                return Err(CoachError::Cancelled);
            }

            let profile = self
                .services
                .classifier
                .profile_for(snapshot.distinct_documents(&document.class));
            if round > profile.max_rounds {
                if attempts.is_empty() {
                    return Ok(self.budget_spent(&spec, document, &snapshot, profile.max_rounds).await);
                }
                debug!(
                    "{} on {}: {} rounds used, budget spent",
                    agent_id, document.id, profile.max_rounds
                );
                break;
            }

            let instruction = handle.lock().await.current_instruction().clone();
            let golden = snapshot
                .golden_set()
                .active(&document.class, agent_id)
                .to_vec();

            let request = InvokeRequest {
                agent_id: agent_id.clone(),
                document_id: document.id.clone(),
                instruction: instruction.clone(),
                schema: spec.schema.clone(),
                pages: pages.clone(),
                golden_examples: golden,
            };
            let attempt = self
                .attempt(&spec, document, round, &instruction, &request, task.reference.as_ref(), token)
                .await?;
            self.services
                .store
                .append(LedgerEntry::Attempt(attempt.clone()))
                .await?;
            self.services.logger.log(RunEvent::new(
                "attempt_recorded",
                json!({
                    "document_id": document.id,
                    "agent_id": agent_id,
                    "round": round,
                    "instruction_version": instruction.version,
                    "accuracy": attempt.metrics.accuracy,
                    "coverage": attempt.metrics.coverage,
                    "basis": attempt.metrics.basis,
                    "failure": attempt.failure,
                }),
            ));
            info!(
                "{} on {} round {}: accuracy {:.3}",
                agent_id, document.id, round, attempt.metrics.accuracy
            );
            attempts.push(attempt.clone());

            // Decide and commit while holding the agent
            let mut agent = handle.lock().await;
            let current_instruction = agent.current_instruction().clone();
            snapshot = self.services.store.snapshot(&agent_filter).await?;
            let decision = self
                .decide(&spec, document, &attempt, &current_instruction, &snapshot, token)
                .await?;

            let phase = self
                .services
                .classifier
                .classify(snapshot.distinct_documents(&document.class));
            self.services
                .store
                .append(LedgerEntry::Decision(DecisionRecord {
                    document_id: document.id.clone(),
                    document_class: document.class.clone(),
                    agent_id: agent_id.clone(),
                    round,
                    phase,
                    decision: decision.clone(),
                    recorded_at: Utc::now(),
                }))
                .await?;
            self.services.logger.log(RunEvent::new(
                "decision_taken",
                json!({
                    "document_id": document.id,
                    "agent_id": agent_id,
                    "round": round,
                    "phase": phase,
                    "strategy": decision.strategy,
                    "source": decision.source.to_string(),
                    "confidence": decision.confidence,
                    "target_round": decision.target_round(),
                    "rationale": decision.rationale,
                }),
            ));
            decisions.push(DecisionSummary::new(round, &decision));

            let change = match agent.apply_decision(&decision) {
                Ok(change) => change,
                Err(e) => {
                    warn!("Could not apply {} for {}: {}", decision.strategy, agent_id, e);
                    None
                }
            };
            if let Some(change) = &change {
                self.services
                    .store
                    .append(LedgerEntry::InstructionChanged(InstructionChangeRecord {
                        document_id: document.id.clone(),
                        change: change.clone(),
                        recorded_at: Utc::now(),
                    }))
                    .await?;
                self.services.logger.log(RunEvent::new(
                    "instruction_changed",
                    json!({
                        "document_id": document.id,
                        "agent_id": agent_id,
                        "strategy": change.strategy,
                        "from_version": change.from_version,
                        "to_version": change.to_version,
                    }),
                ));
            }
            drop(agent);

            match decision.strategy {
                Strategy::Maintain => break,
                Strategy::Revert => {
                    if let Some(target) = &decision.target
                        && target.document_id == document.id
                    {
                        adopted_round = Some(target.round);
                        break;
                    }
                    if change.is_none() {
                        break;
                    }
                }
                Strategy::Refine | Strategy::Explore => {
                    if change.is_none() {
                        break;
                    }
                }
            }
            round += 1;
        }

        let instruction_version = handle.lock().await.current_instruction().version;
        let rounds = attempts.len() as u32;
        Ok(outcome(&spec, attempts, rounds, decisions, adopted_round, instruction_version))
    }

    /// Outcome for a pair whose round budget earlier runs already spent.
    ///
    /// No model call is made; the result is the best recorded attempt.
    async fn budget_spent(
        &self,
        spec: &AgentSpec,
        document: &Document,
        snapshot: &LedgerSnapshot,
        max_rounds: u32,
    ) -> AgentOutcome {
        info!(
            "{} on {}: all {} rounds already recorded, reusing best attempt",
            spec.id, document.id, max_rounds
        );
        self.services.logger.log(RunEvent::new(
            "round_budget_spent",
            json!({
                "document_id": document.id,
                "agent_id": spec.id,
                "max_rounds": max_rounds,
            }),
        ));
        let previous: Vec<ExtractionAttempt> = snapshot
            .attempts()
            .filter(|a| a.document_id == document.id)
            .cloned()
            .collect();
        let version = match self.services.agents.current_instruction(&spec.id).await {
            Some(instruction) => instruction.version,
            None => previous.last().map_or(0, |a| a.instruction_version),
        };
        outcome(spec, previous, 0, Vec::new(), None, version)
    }

    /// Invoke the model once and score the result.
    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        spec: &AgentSpec,
        document: &Document,
        round: u32,
        instruction: &Instruction,
        request: &InvokeRequest,
        reference: Option<&ExtractionPayload>,
        token: &CancellationToken,
    ) -> Result<ExtractionAttempt, CoachError> {
        let invoker = self.services.invoker.as_ref();
        let label = format!("invoke {}", spec.id);
        let result = call_with_retry(&self.services.config.invoke_retry, token, &label, move || {
            invoker.invoke(request)
        })
        .await;

        let evaluator = self.services.evaluator.as_ref();
        let new_attempt = |payload: ExtractionPayload, metrics: Metrics| {
            ExtractionAttempt::new(
                document.id.clone(),
                document.class.clone(),
                spec.id.clone(),
                round,
                instruction.version,
                payload,
                metrics,
            )
        };

        match result {
            Ok(raw) => {
                let Some(value) = extract_json_object(&raw) else {
                    let metrics = evaluator
                        .evaluate(None, reference, &spec.schema)
                        .with_error("Response contained no JSON object");
                    return Ok(new_attempt(ExtractionPayload::new(), metrics)
                        .with_failure("unparseable model output"));
                };
                let conformed = spec.schema.conform(&value);
                let mut metrics = evaluator.evaluate(Some(&conformed.payload), reference, &spec.schema);
                let room = evaluator
                    .config()
                    .max_reported_errors
                    .saturating_sub(metrics.errors.len());
                metrics
                    .errors
                    .extend(conformed.violations.iter().take(room).map(|v| v.to_string()));
                Ok(new_attempt(conformed.payload, metrics))
            }
            Err(RetryError::Cancelled) => Err(CoachError::Cancelled),
            Err(e) => {
                warn!("{} failed on {}: {}", spec.id, document.id, e);
                let metrics = evaluator
                    .evaluate(None, reference, &spec.schema)
                    .with_error(e.to_string());
                Ok(new_attempt(ExtractionPayload::new(), metrics).with_failure(e.to_string()))
            }
        }
    }

    /// Run the selector, consulting the advisor when no rule fires.
    #[allow(clippy::too_many_arguments)]
    async fn decide(
        &self,
        spec: &AgentSpec,
        document: &Document,
        attempt: &ExtractionAttempt,
        instruction: &Instruction,
        snapshot: &LedgerSnapshot,
        token: &CancellationToken,
    ) -> Result<CoachingDecision, CoachError> {
        let selector = self.services.selector.as_ref();
        let profile = self
            .services
            .classifier
            .profile_for(snapshot.distinct_documents(&document.class));
        let record = snapshot.performance(&document.class, &spec.id, self.services.performance_window());
        let golden = snapshot.golden_set().active(&document.class, &spec.id).to_vec();
        let current = attempt.summary();

        let input = SelectionInput {
            agent_id: &spec.id,
            document_id: &document.id,
            instruction,
            base_instruction: &spec.base_instruction,
            current: &current,
            metrics: &attempt.metrics,
            record: &record,
            profile,
            coaching_rounds_used: attempt.round.saturating_sub(1),
            golden: &golden,
        };

        let context = match selector.evaluate(&input) {
            Verdict::Decided(decision) => return Ok(decision),
            Verdict::Delegate(context) => context,
        };
        let Some(advisor) = self.services.advisor.as_deref() else {
            return Ok(selector.fallback(&input, "no advisory service configured"));
        };

        let advice = self.consult(advisor, &context, token).await?;
        if let Err(rejection) = &advice {
            warn!("Advisory response for {} rejected: {}", spec.id, rejection);
            self.services.logger.log(RunEvent::new(
                "advisory_rejected",
                json!({
                    "document_id": document.id,
                    "agent_id": spec.id,
                    "round": attempt.round,
                    "reason": rejection.to_string(),
                }),
            ));
        }
        Ok(selector.resolve(&input, advice))
    }

    async fn consult(
        &self,
        advisor: &dyn CoachingAdvisor,
        context: &AdvisoryContext,
        token: &CancellationToken,
    ) -> Result<Result<AdvisoryResponse, AdvisoryRejection>, CoachError> {
        let label = format!("advise {}", context.agent_id);
        let raw = call_with_retry(&self.services.config.advisory_retry, token, &label, move || {
            advisor.advise(context)
        })
        .await;
        match raw {
            Ok(text) => Ok(parse_advisory_response(
                &text,
                &context.allowed_strategies,
                self.services.selector.config().max_instruction_chars,
            )),
            Err(RetryError::Cancelled) => Err(CoachError::Cancelled),
            Err(e) => Ok(Err(AdvisoryRejection::Unavailable(e.to_string()))),
        }
    }
}

/// Pick the final attempt and build the outcome.
fn outcome(
    spec: &AgentSpec,
    attempts: Vec<ExtractionAttempt>,
    rounds: u32,
    decisions: Vec<DecisionSummary>,
    adopted_round: Option<u32>,
    instruction_version: u32,
) -> AgentOutcome {
    let adopted = adopted_round.and_then(|r| attempts.iter().find(|a| a.round == r));
    let best = adopted.or_else(|| {
        attempts.iter().fold(None, |best: Option<&ExtractionAttempt>, a| match best {
            Some(b) if b.accuracy() >= a.accuracy() => Some(b),
            _ => Some(a),
        })
    });

    let failure = if attempts.iter().all(ExtractionAttempt::is_failure) {
        attempts.last().and_then(|a| a.failure.clone())
    } else {
        None
    };

    let final_metrics = best.map(|a| a.metrics.clone()).unwrap_or_default();
    AgentOutcome {
        agent_id: spec.id.clone(),
        tier: spec.tier,
        rounds,
        decisions,
        final_round: best.map(|a| a.round),
        accepted: failure.is_none() && final_metrics.accuracy >= spec.confidence_threshold,
        final_metrics,
        final_payload: best.filter(|a| !a.is_failure()).map(|a| a.payload.clone()),
        instruction_version,
        failure,
    }
}
