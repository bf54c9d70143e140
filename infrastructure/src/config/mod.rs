//! Configuration file loading for extraction-coach
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `COACH_` environment variables (`__` separates nested keys)
//! 2. `--config <path>` specified file
//! 3. Project root: `./coach.toml` or `./.coach.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/extraction-coach/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileEngineConfig, FilePhasesConfig, FileProviderConfig,
    FileRetryConfig, FileRouterConfig,
};
pub use loader::{ConfigError, ConfigLoader};
