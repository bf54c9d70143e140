//! JSONL file writer for run events.
//!
//! Each [`RunEvent`] becomes one JSON line with a `type` field and an
//! RFC 3339 `timestamp`. Object payloads are merged into the record;
//! anything else is nested under `data`.

use coach_application::{RunEvent, RunEventLogger};
use serde_json::{Value, json};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Run-event logger appending to a JSONL file.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlRunLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
    written: AtomicU64,
}

impl JsonlRunLogger {
    /// Open the log for appending, creating it and its parent directories.
    ///
    /// Returns `None` if the file cannot be opened; the run continues
    /// without an audit trail.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!("Could not create event log directory {}: {}", parent.display(), e);
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open event log {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            written: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events written by this logger instance.
    pub fn events_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

fn to_record(event: RunEvent) -> Value {
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    match event.payload {
        Value::Object(mut map) => {
            map.insert("type".to_string(), Value::String(event.event_type.to_string()));
            map.insert("timestamp".to_string(), Value::String(timestamp));
            Value::Object(map)
        }
        other => json!({
            "type": event.event_type,
            "timestamp": timestamp,
            "data": other,
        }),
    }
}

impl RunEventLogger for JsonlRunLogger {
    fn log(&self, event: RunEvent) {
        let Ok(line) = serde_json::to_string(&to_record(event)) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock()
            && writeln!(writer, "{line}").is_ok()
        {
            // Flush per event, the log is append-only
            let _ = writer.flush();
            self.written.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Drop for JsonlRunLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_record_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.events.jsonl");
        let logger = JsonlRunLogger::new(&path).unwrap();

        logger.log(RunEvent::new(
            "attempt_recorded",
            json!({"document_id": "brf_001", "agent_id": "balance_sheet_agent", "round": 1, "accuracy": 0.82}),
        ));
        logger.log(RunEvent::new(
            "decision_taken",
            json!({"agent_id": "balance_sheet_agent", "strategy": "refine", "source": "advisory"}),
        ));
        assert_eq!(logger.events_written(), 2);
        drop(logger);

        let records = read_lines(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["type"], "attempt_recorded");
        assert_eq!(records[0]["round"], 1);
        assert_eq!(records[1]["strategy"], "refine");
        for record in &records {
            let ts = record["timestamp"].as_str().unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
        }
    }

    #[test]
    fn test_non_object_payload_is_nested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let logger = JsonlRunLogger::new(&path).unwrap();
        logger.log(RunEvent::new("document_failed", json!("sectionizer unavailable")));
        drop(logger);

        let records = read_lines(&path);
        assert_eq!(records[0]["type"], "document_failed");
        assert_eq!(records[0]["data"], "sectionizer unavailable");
    }

    #[test]
    fn test_appends_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");
        for round in 1..=2 {
            let logger = JsonlRunLogger::new(&path).unwrap();
            logger.log(RunEvent::new("golden_promoted", json!({"round": round})));
        }
        assert_eq!(read_lines(&path).len(), 2);
    }

    #[test]
    fn test_unwritable_path_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        assert!(JsonlRunLogger::new(blocker.join("events.jsonl")).is_none());
    }
}
