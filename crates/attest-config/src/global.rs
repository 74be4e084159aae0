//! Global Configuration (~/.attest/config.toml)
//!
//! User-level defaults shared by every project on the machine. Filters are
//! project specific and cannot be set here.

use crate::run::{OutputSection, RunConfig, RunSection};
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.attest/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputSection>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })
    }

    /// Get the global config file path (~/.attest/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".attest").join("config.toml"))
    }

    pub fn apply_to(&self, config: &mut RunConfig) {
        if let Some(run) = &self.run {
            config.apply_run(run);
        }
        if let Some(output) = &self.output {
            config.apply_output(output);
        }
    }
}
