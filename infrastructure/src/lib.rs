//! Infrastructure layer for extraction-coach
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod ledger;
pub mod logging;
#[cfg(feature = "http")]
pub mod provider;
pub mod sectionizer;

// Re-export commonly used types
pub use config::{
    ConfigError, ConfigLoader, ConfigValidationError, FileConfig, FileEngineConfig,
    FilePhasesConfig, FileProviderConfig, FileRetryConfig, FileRouterConfig,
};
pub use ledger::{InMemoryLedgerStore, JsonlLedgerStore};
pub use logging::JsonlRunLogger;
#[cfg(feature = "http")]
pub use provider::{OpenAiAdvisor, OpenAiInvoker, ProviderError};
pub use sectionizer::JsonSectionizer;
