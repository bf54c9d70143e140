//! Persistent ledger port
//!
//! An append-only log of [`LedgerEntry`] values with snapshot-consistent
//! reads. A snapshot never shows a partially written entry.

use async_trait::async_trait;
use coach_domain::learning::RoundViolation;
use coach_domain::{DocumentClass, LedgerEntry, LedgerFilter, LedgerRecord, LedgerSnapshot};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Ledger store unavailable: {0}")]
    Unavailable(String),

    #[error("Ledger I/O error: {0}")]
    Io(String),

    #[error("Corrupt ledger record at line {line}: {message}")]
    Corrupt { line: usize, message: String },

    #[error("Rejected append: {0}")]
    RoundOutOfOrder(RoundViolation),
}

impl StoreError {
    /// Whether the store can no longer be used for this run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StoreError::RoundOutOfOrder(_))
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append one entry and return it with its sequence number.
    async fn append(&self, entry: LedgerEntry) -> Result<LedgerRecord, StoreError>;

    /// A consistent view of all records matching `filter`, ordered by sequence.
    async fn snapshot(&self, filter: &LedgerFilter) -> Result<LedgerSnapshot, StoreError>;

    /// Records matching `filter`, ordered by sequence.
    async fn query(&self, filter: &LedgerFilter) -> Result<Vec<LedgerRecord>, StoreError> {
        Ok(self
            .snapshot(filter)
            .await?
            .records
            .into_iter()
            .map(Arc::unwrap_or_clone)
            .collect())
    }

    /// Distinct documents of `class` with at least one attempt.
    async fn document_count(&self, class: &DocumentClass) -> Result<u64, StoreError> {
        Ok(self
            .snapshot(&LedgerFilter::all().class(class.clone()))
            .await?
            .distinct_documents(class))
    }
}
