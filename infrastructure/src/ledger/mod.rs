//! Ledger store adapters
//!
//! Both stores keep the full record list in memory behind a
//! `tokio::sync::RwLock`; [`JsonlLedgerStore`] additionally appends each
//! record to a JSON Lines file before it becomes visible to readers.

mod jsonl;
mod memory;

pub use jsonl::JsonlLedgerStore;
pub use memory::InMemoryLedgerStore;

use coach_application::StoreError;
use coach_domain::{
    DocumentClass, DocumentCounter, LedgerEntry, LedgerFilter, LedgerRecord, LedgerSnapshot,
    RoundIndex,
};
use std::sync::Arc;

/// Records plus the round index guarding attempt order and the per-class
/// document counts behind the learning phase.
#[derive(Debug, Default)]
struct LedgerState {
    records: Vec<Arc<LedgerRecord>>,
    index: RoundIndex,
    documents: DocumentCounter,
}

impl LedgerState {
    fn next_seq(&self) -> u64 {
        self.records.last().map_or(1, |r| r.seq + 1)
    }

    /// Validate `entry` and assign its sequence number without publishing it.
    fn prepare(&self, entry: LedgerEntry) -> Result<LedgerRecord, StoreError> {
        self.index.check(&entry).map_err(StoreError::RoundOutOfOrder)?;
        Ok(LedgerRecord {
            seq: self.next_seq(),
            entry,
        })
    }

    /// Publish a prepared record.
    fn commit(&mut self, record: LedgerRecord) -> Result<(), StoreError> {
        self.index.admit(&record.entry).map_err(StoreError::RoundOutOfOrder)?;
        self.documents.record(&record.entry);
        self.records.push(Arc::new(record));
        Ok(())
    }

    fn snapshot(&self, filter: &LedgerFilter) -> LedgerSnapshot {
        LedgerSnapshot::from_shared(
            self.records.last().map_or(0, |r| r.seq),
            self.records
                .iter()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect(),
            self.documents.counts(),
        )
    }

    fn document_count(&self, class: &DocumentClass) -> u64 {
        self.documents.count(class)
    }
}
