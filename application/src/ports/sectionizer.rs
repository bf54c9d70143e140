//! Sectionizer port
//!
//! Layout extraction happens outside the engine. The sectionizer hands over
//! a document whose sections are fixed for the whole run, plus optional
//! reference data used for scoring.

use async_trait::async_trait;
use coach_domain::{AgentId, Document};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SectionizeError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Failed to read {location}: {message}")]
    Read { location: String, message: String },

    #[error("Malformed document {location}: {message}")]
    Malformed { location: String, message: String },
}

/// A document with its optional ground truth.
#[derive(Debug, Clone)]
pub struct SectionizedDocument {
    pub document: Document,
    /// Raw reference output per agent. Conformed to each agent's schema
    /// before use.
    pub references: BTreeMap<AgentId, Value>,
}

impl SectionizedDocument {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            references: BTreeMap::new(),
        }
    }

    pub fn with_reference(mut self, agent: impl Into<AgentId>, value: Value) -> Self {
        self.references.insert(agent.into(), value);
        self
    }
}

#[async_trait]
pub trait Sectionizer: Send + Sync {
    /// Locations of the documents in a source (a file or a directory).
    async fn discover(&self, source: &str) -> Result<Vec<String>, SectionizeError>;

    async fn sectionize(&self, location: &str) -> Result<SectionizedDocument, SectionizeError>;
}
