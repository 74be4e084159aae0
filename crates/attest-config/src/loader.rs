//! Configuration Loader
//!
//! Loads configuration from multiple sources and merges them into one
//! [`RunConfig`].

use crate::global::GlobalConfig;
use crate::project::ProjectConfig;
use crate::run::{parse_bool, parse_list, parse_seconds, RunConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the project configuration file
pub const PROJECT_FILE: &str = "attest.toml";

/// Configuration loader
///
/// Precedence, lowest first:
/// 1. Global config (~/.attest/config.toml)
/// 2. Project config (attest.toml)
/// 3. Environment variables (ATTEST_*)
/// 4. CLI flags (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    pub run: RunConfig,

    /// Directory where attest.toml was found
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Read the global config from `path` instead of the home directory.
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find attest.toml. A missing project
    /// file is not an error.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project) = find_project_config(start_dir)?;
        self.merge(project_root, &project)
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project = ProjectConfig::load_from_file(config_path)?;
        let project_root = config_path.parent().map(|p| p.to_path_buf());
        self.merge(project_root, &project)
    }

    fn merge(&mut self, project_root: Option<PathBuf>, project: &ProjectConfig) -> ConfigResult<Config> {
        let mut run = RunConfig::default();
        self.load_global_config()?.apply_to(&mut run);
        project.apply_to(&mut run);
        apply_env_overrides(&mut run)?;
        run.validate()?;

        Ok(Config { run, project_root })
    }

    /// Load global configuration; absent file or home directory yields defaults.
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        if self.global_config_path.is_none() {
            match GlobalConfig::global_config_path() {
                Ok(path) => self.global_config_path = Some(path),
                Err(ConfigError::HomeNotFound) => return Ok(GlobalConfig::default()),
                Err(e) => return Err(e),
            }
        }

        match &self.global_config_path {
            Some(path) if path.exists() => GlobalConfig::load_from_file(path),
            _ => Ok(GlobalConfig::default()),
        }
    }

    /// Get the global configuration directory (~/.attest)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".attest"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if an attest.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

fn find_project_config(start_dir: &Path) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(PROJECT_FILE);
        if config_path.exists() {
            let project = ProjectConfig::load_from_file(&config_path)?;
            return Ok((Some(current), project));
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Ok((None, ProjectConfig::default())),
        }
    }
}

/// Apply `ATTEST_*` environment variables.
///
/// | Variable                     | Field                |
/// |------------------------------|----------------------|
/// | `ATTEST_PARALLEL`            | `parallel`           |
/// | `ATTEST_MAX_PARALLEL`        | `max_parallel`       |
/// | `ATTEST_TIME_LIMIT`          | `default_time_limit` |
/// | `ATTEST_MAXIMUM_TIME_LIMIT`  | `maximum_time_limit` |
/// | `ATTEST_FILTER`              | `filter` (comma separated) |
/// | `ATTEST_SKIP`                | `skip` (comma separated) |
/// | `ATTEST_TAGS`                | `include_tags` (comma separated) |
/// | `ATTEST_EXCLUDE_TAGS`        | `exclude_tags` (comma separated) |
/// | `ATTEST_FORMAT`              | `output.format`      |
/// | `ATTEST_VERBOSE`             | `output.verbose`     |
/// | `ATTEST_COLOR`               | `output.color`       |
pub fn apply_env_overrides(config: &mut RunConfig) -> ConfigResult<()> {
    if let Ok(value) = env::var("ATTEST_PARALLEL") {
        config.parallel = parse_bool("ATTEST_PARALLEL", &value)?;
    }
    if let Ok(value) = env::var("ATTEST_MAX_PARALLEL") {
        let max = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: "ATTEST_MAX_PARALLEL".to_string(),
            reason: format!("expected a number, got '{}'", value),
        })?;
        config.max_parallel = Some(max);
    }
    if let Ok(value) = env::var("ATTEST_TIME_LIMIT") {
        config.default_time_limit = Some(parse_seconds("ATTEST_TIME_LIMIT", &value)?);
    }
    if let Ok(value) = env::var("ATTEST_MAXIMUM_TIME_LIMIT") {
        config.maximum_time_limit = Some(parse_seconds("ATTEST_MAXIMUM_TIME_LIMIT", &value)?);
    }
    if let Ok(value) = env::var("ATTEST_FILTER") {
        config.filter = parse_list(&value);
    }
    if let Ok(value) = env::var("ATTEST_SKIP") {
        config.skip = parse_list(&value);
    }
    if let Ok(value) = env::var("ATTEST_TAGS") {
        config.include_tags = parse_list(&value);
    }
    if let Ok(value) = env::var("ATTEST_EXCLUDE_TAGS") {
        config.exclude_tags = parse_list(&value);
    }
    if let Ok(value) = env::var("ATTEST_FORMAT") {
        config.output.format = value.parse()?;
    }
    if let Ok(value) = env::var("ATTEST_VERBOSE") {
        config.output.verbose = parse_bool("ATTEST_VERBOSE", &value)?;
    }
    if let Ok(value) = env::var("ATTEST_COLOR") {
        config.output.color = parse_bool("ATTEST_COLOR", &value)?;
    }
    Ok(())
}
