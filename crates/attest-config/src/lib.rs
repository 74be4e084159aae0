//! Attest Configuration System
//!
//! Resolves the settings a test run uses:
//! - Project configuration (attest.toml)
//! - Global user configuration (~/.attest/config.toml)
//! - Environment overrides (ATTEST_*)
//!
//! # Configuration Hierarchy
//!
//! Sources are merged in the following order (later overrides earlier):
//! 1. Global config (~/.attest/config.toml)
//! 2. Project config (./attest.toml, searched upwards)
//! 3. Environment variables (ATTEST_*)
//! 4. CLI flags (applied by the harness)
//!
//! # Example
//!
//! ```no_run
//! use attest_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("parallel: {}", config.run.parallel);
//! ```

pub mod global;
pub mod loader;
pub mod project;
pub mod run;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use global::GlobalConfig;
pub use loader::{Config, ConfigLoader};
pub use project::ProjectConfig;
pub use run::{OutputConfig, OutputFormat, RunConfig};
