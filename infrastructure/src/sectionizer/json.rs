//! Reads documents already sectionized by the external layout extractor.
//!
//! A document is a JSON file holding a [`Document`]:
//!
//! ```json
//! {
//!   "id": "brf_81563",
//!   "class": "brf_annual_report",
//!   "sections": [{"name": "Balansräkning", "pages": {"start": 7, "end": 8}, "kind": "table"}],
//!   "pages": [{"number": 7, "text": "..."}]
//! }
//! ```
//!
//! Ground truth for scoring lives next to it in `<stem>.reference.json`,
//! an object keyed by agent id.

use async_trait::async_trait;
use coach_application::{SectionizeError, SectionizedDocument, Sectionizer};
use coach_domain::{AgentId, Document, PageRange};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const REFERENCE_SUFFIX: &str = ".reference.json";

/// Last page assumed for documents that carry no page text.
const MAX_PAGES: u32 = 10_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSectionizer;

impl JsonSectionizer {
    pub fn new() -> Self {
        Self
    }

    fn reference_path(path: &Path) -> Option<PathBuf> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_suffix(".json")?;
        Some(path.with_file_name(format!("{stem}{REFERENCE_SUFFIX}")))
    }
}

fn is_document_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".json") && !n.ends_with(REFERENCE_SUFFIX))
}

async fn read(path: &Path) -> Result<String, SectionizeError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SectionizeError::NotFound(path.display().to_string())
        } else {
            SectionizeError::Read {
                location: path.display().to_string(),
                message: e.to_string(),
            }
        }
    })
}

fn malformed(path: &Path, message: impl Into<String>) -> SectionizeError {
    SectionizeError::Malformed {
        location: path.display().to_string(),
        message: message.into(),
    }
}

#[async_trait]
impl Sectionizer for JsonSectionizer {
    /// A file yields itself; a directory yields its document files sorted by name.
    async fn discover(&self, source: &str) -> Result<Vec<String>, SectionizeError> {
        let path = Path::new(source);
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| SectionizeError::NotFound(source.to_string()))?;

        if metadata.is_file() {
            return Ok(vec![source.to_string()]);
        }

        let mut entries = tokio::fs::read_dir(path).await.map_err(|e| SectionizeError::Read {
            location: source.to_string(),
            message: e.to_string(),
        })?;
        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| SectionizeError::Read {
            location: source.to_string(),
            message: e.to_string(),
        })? {
            let entry_path = entry.path();
            if entry_path.is_file() && is_document_file(&entry_path) {
                found.push(entry_path.display().to_string());
            }
        }
        found.sort();
        debug!("Discovered {} documents in {}", found.len(), source);
        Ok(found)
    }

    async fn sectionize(&self, location: &str) -> Result<SectionizedDocument, SectionizeError> {
        let path = Path::new(location);
        let contents = read(path).await?;
        let mut document: Document =
            serde_json::from_str(&contents).map_err(|e| malformed(path, e.to_string()))?;

        // Serde bypasses the PageRange constructor
        let last_page = document.last_page().unwrap_or(MAX_PAGES);
        for section in &mut document.sections {
            let range = PageRange::new(section.pages.start, section.pages.end)
                .map_err(|e| malformed(path, format!("section '{}': {e}", section.name)))?;
            let bounded = range.clamp_to(last_page).ok_or_else(|| {
                malformed(
                    path,
                    format!(
                        "section '{}' starts at page {} past the last page {last_page}",
                        section.name, range.start
                    ),
                )
            })?;
            if bounded != range {
                debug!(
                    "{}: section '{}' {} clamped to {}",
                    document.id, section.name, range, bounded
                );
            }
            section.pages = bounded;
        }

        let mut sectionized = SectionizedDocument::new(document);

        if let Some(reference_path) = Self::reference_path(path)
            && tokio::fs::try_exists(&reference_path).await.unwrap_or(false)
        {
            let raw = read(&reference_path).await?;
            match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => {
                    for (agent, value) in map {
                        sectionized.references.insert(AgentId::new(agent), value);
                    }
                }
                Ok(_) => warn!(
                    "Ignoring {}: reference data must be an object keyed by agent id",
                    reference_path.display()
                ),
                Err(e) => return Err(malformed(&reference_path, e.to_string())),
            }
        }

        Ok(sectionized)
    }
}
