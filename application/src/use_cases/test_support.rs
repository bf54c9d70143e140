//! Test doubles for the application ports.

use crate::config::{EngineConfig, RetryPolicy};
use crate::ports::advisor::{AdvisoryError, CoachingAdvisor};
use crate::ports::ledger_store::{LedgerStore, StoreError};
use crate::ports::model_invoker::{InvokeError, InvokeRequest, ModelInvoker};
use crate::ports::run_logger::{RunEvent, RunEventLogger};
use async_trait::async_trait;
use coach_domain::learning::RoundIndex;
use coach_domain::{
    AdvisoryContext, DocumentClass, DocumentCounter, LedgerEntry, LedgerFilter, LedgerRecord,
    LedgerSnapshot,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Retries disabled and short timeouts.
pub fn quick_config() -> EngineConfig {
    EngineConfig::default().with_retry(
        RetryPolicy::default()
            .with_max_retries(0)
            .with_base_delay(Duration::from_millis(1))
            .with_timeout(Duration::from_secs(5))
            .without_jitter(),
    )
}

/// Returns scripted responses in order, repeating the last one.
pub struct ScriptedInvoker {
    responses: Mutex<VecDeque<Result<String, InvokeError>>>,
    versions: Mutex<Vec<u32>>,
}

impl ScriptedInvoker {
    pub fn new(responses: Vec<Result<&str, InvokeError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| r.map(str::to_string)).collect()),
            versions: Mutex::new(Vec::new()),
        }
    }

    /// Instruction versions seen, one per call.
    pub fn versions_seen(&self) -> Vec<u32> {
        self.versions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InvokeError> {
        self.versions.lock().unwrap().push(request.instruction.version);
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.pop_front().unwrap()
        } else {
            responses.front().cloned().unwrap()
        }
    }
}

/// Answers each request with a function of the request.
pub struct FnInvoker<F>(pub F);

#[async_trait]
impl<F> ModelInvoker for FnInvoker<F>
where
    F: Fn(&InvokeRequest) -> Result<String, InvokeError> + Send + Sync,
{
    async fn invoke(&self, request: &InvokeRequest) -> Result<String, InvokeError> {
        (self.0)(request)
    }
}

#[derive(Default)]
struct StoreState {
    records: Vec<Arc<LedgerRecord>>,
    index: RoundIndex,
    documents: DocumentCounter,
}

/// Ledger in a vector, with switchable append failures.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn fail_appends(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .map(|r| match r.entry {
                LedgerEntry::Attempt(_) => "attempt",
                LedgerEntry::Decision(_) => "decision",
                LedgerEntry::InstructionChanged(_) => "instruction",
                LedgerEntry::GoldenPromoted(_) => "promoted",
                LedgerEntry::GoldenDeactivated(_) => "deactivated",
            })
            .collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn append(&self, entry: LedgerEntry) -> Result<LedgerRecord, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk detached".into()));
        }
        let mut state = self.state.lock().unwrap();
        state.index.admit(&entry).map_err(StoreError::RoundOutOfOrder)?;
        state.documents.record(&entry);
        let record = LedgerRecord {
            seq: state.records.len() as u64 + 1,
            entry,
        };
        state.records.push(Arc::new(record.clone()));
        Ok(record)
    }

    async fn snapshot(&self, filter: &LedgerFilter) -> Result<LedgerSnapshot, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(LedgerSnapshot::from_shared(
            state.records.len() as u64,
            state.records.iter().filter(|r| filter.matches(r)).cloned().collect(),
            state.documents.counts(),
        ))
    }

    async fn document_count(&self, class: &DocumentClass) -> Result<u64, StoreError> {
        Ok(self.state.lock().unwrap().documents.count(class))
    }
}

pub struct FixedAdvisor(pub &'static str);

#[async_trait]
impl CoachingAdvisor for FixedAdvisor {
    async fn advise(&self, _context: &AdvisoryContext) -> Result<String, AdvisoryError> {
        Ok(self.0.to_string())
    }
}

#[derive(Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<&'static str>>,
}

impl RecordingLogger {
    pub fn contains(&self, event_type: &str) -> bool {
        self.events.lock().unwrap().iter().any(|e| *e == event_type)
    }
}

impl RunEventLogger for RecordingLogger {
    fn log(&self, event: RunEvent) {
        self.events.lock().unwrap().push(event.event_type);
    }
}
