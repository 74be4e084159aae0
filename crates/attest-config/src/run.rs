//! Resolved run configuration
//!
//! [`RunConfig`] is what the runner and the harness consume. It starts from
//! built-in defaults and is overlaid with the `[run]`, `[filter]` and
//! `[output]` sections of each configuration source.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[run]` section, shared by project and global configs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    /// Run sibling tests concurrently (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    /// Upper bound on concurrently running invocations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    /// Time limit in seconds for tests that declare none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_time_limit: Option<u64>,

    /// Cap in seconds applied to every time limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_time_limit: Option<u64>,
}

/// `[output]` section, shared by project and global configs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    /// "human" or "json"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<bool>,
}

/// Report format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::InvalidValue {
                field: "output.format".to_string(),
                reason: format!("must be 'human' or 'json', got '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub verbose: bool,
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Human,
            verbose: false,
            color: true,
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub parallel: bool,
    pub max_parallel: Option<usize>,
    pub default_time_limit: Option<Duration>,
    pub maximum_time_limit: Option<Duration>,
    /// Substring patterns; a test must match one of them when non-empty
    pub filter: Vec<String>,
    /// Substring patterns excluding matching tests
    pub skip: Vec<String>,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub output: OutputConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_parallel: None,
            default_time_limit: None,
            maximum_time_limit: None,
            filter: Vec::new(),
            skip: Vec::new(),
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// Overlay a `[run]` section. Only values present in `section` change.
    pub fn apply_run(&mut self, section: &RunSection) {
        if let Some(parallel) = section.parallel {
            self.parallel = parallel;
        }
        if let Some(max) = section.max_parallel {
            self.max_parallel = Some(max);
        }
        if let Some(secs) = section.default_time_limit {
            self.default_time_limit = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = section.maximum_time_limit {
            self.maximum_time_limit = Some(Duration::from_secs(secs));
        }
    }

    pub fn apply_output(&mut self, section: &OutputSection) {
        if let Some(format) = section.format {
            self.output.format = format;
        }
        if let Some(verbose) = section.verbose {
            self.output.verbose = verbose;
        }
        if let Some(color) = section.color {
            self.output.color = color;
        }
    }

    /// Check settings that would make a run meaningless.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_parallel == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "run.max_parallel".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        for (field, limit) in [
            ("run.default_time_limit", self.default_time_limit),
            ("run.maximum_time_limit", self.maximum_time_limit),
        ] {
            if limit == Some(Duration::ZERO) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if let (Some(default), Some(maximum)) = (self.default_time_limit, self.maximum_time_limit) {
            if default > maximum {
                return Err(ConfigError::InvalidValue {
                    field: "run.default_time_limit".to_string(),
                    reason: format!(
                        "{:?} exceeds maximum_time_limit {:?}",
                        default, maximum
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Parse a boolean the way environment overrides spell them.
pub(crate) fn parse_bool(field: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a boolean, got '{}'", value),
        }),
    }
}

/// Parse a time limit given in (possibly fractional) seconds.
pub fn parse_seconds(field: &str, value: &str) -> ConfigResult<Duration> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        field: field.to_string(),
        reason,
    };
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| invalid(format!("expected seconds, got '{}'", value)))?;
    Duration::try_from_secs_f64(secs).map_err(|e| invalid(e.to_string()))
}

/// Split a comma separated list, dropping empty entries.
pub(crate) fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
