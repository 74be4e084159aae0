//! Project Configuration (attest.toml)
//!
//! Settings checked into a project next to its test binaries.

use crate::run::{OutputSection, RunConfig, RunSection};
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Project configuration from attest.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunSection>,

    /// Which tests to run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputSection>,
}

/// `[filter]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct FilterSection {
    /// Run only tests whose id or display name contains one of these
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,

    /// Skip tests whose id or display name contains one of these
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip: Vec<String>,

    /// Run only tests carrying one of these tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Skip tests carrying any of these tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_tags: Vec<String>,
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        Self::parse(&content).map_err(|error| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Overlay every section present here onto `config`.
    pub fn apply_to(&self, config: &mut RunConfig) {
        if let Some(run) = &self.run {
            config.apply_run(run);
        }
        if let Some(filter) = &self.filter {
            if !filter.names.is_empty() {
                config.filter = filter.names.clone();
            }
            if !filter.skip.is_empty() {
                config.skip = filter.skip.clone();
            }
            if !filter.tags.is_empty() {
                config.include_tags = filter.tags.clone();
            }
            if !filter.exclude_tags.is_empty() {
                config.exclude_tags = filter.exclude_tags.clone();
            }
        }
        if let Some(output) = &self.output {
            config.apply_output(output);
        }
    }
}
