//! Volatile ledger for single runs and tests.

use super::LedgerState;
use async_trait::async_trait;
use coach_application::{LedgerStore, StoreError};
use coach_domain::{DocumentClass, LedgerEntry, LedgerFilter, LedgerRecord, LedgerSnapshot};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, entry: LedgerEntry) -> Result<LedgerRecord, StoreError> {
        let mut state = self.state.write().await;
        let record = state.prepare(entry)?;
        state.commit(record.clone())?;
        Ok(record)
    }

    async fn snapshot(&self, filter: &LedgerFilter) -> Result<LedgerSnapshot, StoreError> {
        Ok(self.state.read().await.snapshot(filter))
    }

    async fn document_count(&self, class: &DocumentClass) -> Result<u64, StoreError> {
        Ok(self.state.read().await.document_count(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::test_fixtures::attempt;
    use coach_domain::{AgentId, LedgerEntryKind};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sequence_numbers_are_contiguous() {
        let store = InMemoryLedgerStore::new();
        let first = store.append(attempt("doc-1", "governance_agent", 1, 0.5)).await.unwrap();
        let second = store.append(attempt("doc-1", "governance_agent", 2, 0.7)).await.unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_out_of_order_round_is_rejected_without_side_effects() {
        let store = InMemoryLedgerStore::new();
        store.append(attempt("doc-1", "governance_agent", 1, 0.5)).await.unwrap();

        let err = store
            .append(attempt("doc-1", "governance_agent", 3, 0.5))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RoundOutOfOrder(ref v) if v.expected == 2));
        assert!(!err.is_fatal());

        let duplicate = store.append(attempt("doc-1", "governance_agent", 1, 0.5)).await;
        assert!(duplicate.is_err());

        // The expected round is still 2
        store.append(attempt("doc-1", "governance_agent", 2, 0.6)).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_snapshot_applies_filter() {
        let store = InMemoryLedgerStore::new();
        store.append(attempt("doc-1", "governance_agent", 1, 0.5)).await.unwrap();
        store.append(attempt("doc-1", "balance_sheet_agent", 1, 0.9)).await.unwrap();
        store.append(attempt("doc-2", "governance_agent", 1, 0.8)).await.unwrap();

        let filter = LedgerFilter::all()
            .agent(AgentId::new("governance_agent"))
            .kind(LedgerEntryKind::Attempt);
        let snapshot = store.snapshot(&filter).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.as_of_seq, 3);

        let later = store.query(&LedgerFilter::all().after(2)).await.unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].seq, 3);
    }

    #[tokio::test]
    async fn test_concurrent_appends_get_unique_sequence_numbers() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .append(attempt(&format!("doc-{i}"), "governance_agent", 1, 0.5))
                    .await
                    .unwrap()
                    .seq
            }));
        }
        let mut seqs = Vec::new();
        for handle in handles {
            seqs.push(handle.await.unwrap());
        }
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=16).collect::<Vec<u64>>());
    }
}
