//! Durable ledger backed by a JSON Lines file.
//!
//! Each line is one [`LedgerRecord`] (`{"seq": 1, "type": "attempt", ...}`).
//! On open the file is replayed; sequence gaps are tolerated but any
//! decrease, unparseable line or round violation is reported as
//! [`StoreError::Corrupt`] with its 1-based line number.

use super::LedgerState;
use async_trait::async_trait;
use coach_application::{LedgerStore, StoreError};
use coach_domain::{DocumentClass, LedgerEntry, LedgerFilter, LedgerRecord, LedgerSnapshot};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};

struct Inner {
    ledger: LedgerState,
    file: File,
}

pub struct JsonlLedgerStore {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl JsonlLedgerStore {
    /// Open (or create) the ledger file and replay its records.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(format!("{}: {e}", parent.display())))?;
        }

        let ledger = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => replay(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LedgerState::default(),
            Err(e) => return Err(StoreError::Io(format!("{}: {e}", path.display()))),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;

        info!(
            "Opened ledger {} ({} records)",
            path.display(),
            ledger.records.len()
        );

        Ok(Self {
            path,
            inner: RwLock::new(Inner { ledger, file }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn replay(contents: &str) -> Result<LedgerState, StoreError> {
    let mut state = LedgerState::default();
    for (i, line) in contents.lines().enumerate() {
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }
        let corrupt = |message: String| StoreError::Corrupt {
            line: line_no,
            message,
        };
        let record: LedgerRecord = serde_json::from_str(line).map_err(|e| corrupt(e.to_string()))?;
        if let Some(last) = state.records.last()
            && record.seq <= last.seq
        {
            return Err(corrupt(format!(
                "sequence {} does not follow {}",
                record.seq, last.seq
            )));
        }
        state.commit(record).map_err(|e| corrupt(e.to_string()))?;
    }
    Ok(state)
}

#[async_trait]
impl LedgerStore for JsonlLedgerStore {
    async fn append(&self, entry: LedgerEntry) -> Result<LedgerRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner.ledger.prepare(entry)?;

        let mut line = serde_json::to_string(&record).map_err(|e| StoreError::Io(e.to_string()))?;
        line.push('\n');
        inner
            .file
            .write_all(line.as_bytes())
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        inner
            .file
            .flush()
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;

        debug!("Ledger seq {} ({:?})", record.seq, record.entry.kind());
        inner.ledger.commit(record.clone())?;
        Ok(record)
    }

    async fn snapshot(&self, filter: &LedgerFilter) -> Result<LedgerSnapshot, StoreError> {
        Ok(self.inner.read().await.ledger.snapshot(filter))
    }

    async fn document_count(&self, class: &DocumentClass) -> Result<u64, StoreError> {
        Ok(self.inner.read().await.ledger.document_count(class))
    }
}
