//! Execution Scheduler
//!
//! Walks an [`ExecutionPlan`]: tiers in priority order, batches in order
//! within a tier, every agent of a batch dispatched concurrently. A batch
//! must fully resolve before the next one starts, so no agent of a lower
//! tier ever overlaps with one of a higher tier.
//!
//! Cancellation aborts the running batch and skips the rest. A task that
//! returns `Err` is treated as fatal for the document: its batch is allowed
//! to finish, then scheduling stops.

use crate::ports::progress::ProgressNotifier;
use coach_domain::{Assignment, DocumentId, ExecutionPlan};
use std::future::Future;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum TaskFailure<E> {
    /// The task returned an error.
    Error(E),
    /// The task panicked.
    Panicked,
}

#[derive(Debug)]
pub struct TaskOutcome<O, E> {
    pub assignment: Assignment,
    pub result: Result<O, TaskFailure<E>>,
}

#[derive(Debug)]
pub struct ScheduleOutcome<O, E> {
    /// Resolved tasks, in plan order.
    pub finished: Vec<TaskOutcome<O, E>>,
    /// Tasks aborted or never started.
    pub unfinished: Vec<Assignment>,
    pub cancelled: bool,
    /// Scheduling stopped because a task returned an error.
    pub halted: bool,
}

impl<O, E> ScheduleOutcome<O, E> {
    fn new() -> Self {
        Self {
            finished: Vec::new(),
            unfinished: Vec::new(),
            cancelled: false,
            halted: false,
        }
    }

    /// The first error returned by a task, if any.
    pub fn first_error(&self) -> Option<&E> {
        self.finished.iter().find_map(|t| match &t.result {
            Err(TaskFailure::Error(e)) => Some(e),
            _ => None,
        })
    }
}

/// Run every batch of `plan`, creating each task with `make_task`.
pub async fn execute_plan<O, E, F, Fut>(
    plan: &ExecutionPlan,
    document: &DocumentId,
    token: &CancellationToken,
    progress: &dyn ProgressNotifier,
    mut make_task: F,
) -> ScheduleOutcome<O, E>
where
    F: FnMut(Assignment) -> Fut,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    let mut outcome = ScheduleOutcome::new();
    let batches: Vec<_> = plan.batches().collect();

    for (position, batch) in batches.iter().enumerate() {
        if token.is_cancelled() {
            outcome.cancelled = true;
        }
        if outcome.cancelled || outcome.halted {
            outcome
                .unfinished
                .extend(batches[position..].iter().flat_map(|b| b.assignments.iter().cloned()));
            break;
        }

        debug!(
            "{}: dispatching {} batch {} ({} agents)",
            document,
            batch.tier,
            batch.index,
            batch.len()
        );
        progress.on_batch_start(document, batch.tier, batch.len());

        let mut join_set = JoinSet::new();
        for (slot, assignment) in batch.assignments.iter().enumerate() {
            let task = make_task(assignment.clone());
            join_set.spawn(async move { (slot, task.await) });
        }

        let mut slots: Vec<Option<Result<O, TaskFailure<E>>>> =
            (0..batch.len()).map(|_| None).collect();
        let mut aborted = false;
        loop {
            let joined = if aborted {
                join_set.join_next().await
            } else {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        join_set.abort_all();
                        aborted = true;
                        continue;
                    }
                    joined = join_set.join_next() => joined,
                }
            };
            let Some(joined) = joined else {
                break;
            };
            match joined {
                Ok((slot, result)) => slots[slot] = Some(result.map_err(TaskFailure::Error)),
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!("{}: agent task failed to join: {}", document, e),
            }
        }

        for (assignment, slot) in batch.assignments.iter().zip(slots) {
            match slot {
                Some(result) => {
                    if matches!(result, Err(TaskFailure::Error(_))) {
                        outcome.halted = true;
                    }
                    outcome.finished.push(TaskOutcome {
                        assignment: assignment.clone(),
                        result,
                    });
                }
                None if aborted => outcome.unfinished.push(assignment.clone()),
                None => outcome.finished.push(TaskOutcome {
                    assignment: assignment.clone(),
                    result: Err(TaskFailure::Panicked),
                }),
            }
        }
        if aborted {
            outcome.cancelled = true;
        }
    }

    outcome
}
