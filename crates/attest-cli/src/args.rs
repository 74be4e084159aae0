//! Command-line arguments for a test binary

use attest_config::run::parse_seconds;
use attest_config::{OutputFormat, RunConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Run the tests declared in this binary.
///
/// EXAMPLES:
///     cargo test --test showcase                         Run everything
///     cargo test --test showcase -- division             Tests matching "division"
///     cargo test --test showcase -- --tag formatting     Tests tagged formatting
///     cargo test --test showcase -- --list --json        List tests as JSON
///
/// ENVIRONMENT VARIABLES:
///     ATTEST_LOG        Log filter directives (default: warn)
///     ATTEST_*          Configuration overrides, see attest.toml
///     NO_COLOR          Set to disable colored output
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "attest")]
#[command(version)]
pub struct Args {
    /// Run only tests whose id or display name contains one of these
    #[arg(value_name = "FILTER")]
    pub patterns: Vec<String>,

    /// Same as a positional FILTER
    #[arg(long = "filter", value_name = "PATTERN")]
    pub filter: Vec<String>,

    /// Skip tests whose id or display name contains PATTERN
    #[arg(long, value_name = "PATTERN")]
    pub skip: Vec<String>,

    /// Run only tests carrying TAG (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Skip tests carrying TAG (repeatable)
    #[arg(long = "exclude-tag", value_name = "TAG")]
    pub exclude_tags: Vec<String>,

    /// Run tests one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Upper bound on concurrently running invocations
    #[arg(long, value_name = "N", visible_alias = "test-threads")]
    pub max_parallel: Option<usize>,

    /// Time limit in seconds for tests that declare none
    #[arg(long, value_name = "SECONDS", value_parser = parse_time_limit)]
    pub time_limit: Option<Duration>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Verbose output (one line per test, issues of passing tests)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// List the selected tests without running them
    #[arg(long)]
    pub list: bool,

    /// Read project configuration from FILE instead of searching for attest.toml
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Accepted for libtest compatibility; output is never captured
    #[arg(long, hide = true)]
    pub nocapture: bool,

    #[arg(long, short = 'q', hide = true)]
    pub quiet: bool,

    #[arg(long, hide = true)]
    pub show_output: bool,

    #[arg(long, hide = true)]
    pub include_ignored: bool,
}

fn parse_time_limit(value: &str) -> Result<Duration, String> {
    parse_seconds("--time-limit", value).map_err(|e| e.to_string())
}

impl Args {
    /// Overlay command-line flags on resolved configuration.
    pub fn apply(&self, config: &mut RunConfig) {
        let names: Vec<String> = self
            .patterns
            .iter()
            .chain(&self.filter)
            .cloned()
            .collect();
        if !names.is_empty() {
            config.filter = names;
        }
        if !self.skip.is_empty() {
            config.skip = self.skip.clone();
        }
        if !self.tags.is_empty() {
            config.include_tags = self.tags.clone();
        }
        if !self.exclude_tags.is_empty() {
            config.exclude_tags = self.exclude_tags.clone();
        }
        if self.sequential {
            config.parallel = false;
        }
        if let Some(max) = self.max_parallel {
            config.max_parallel = Some(max);
        }
        if let Some(limit) = self.time_limit {
            config.default_time_limit = Some(limit);
        }
        if self.json {
            config.output.format = OutputFormat::Json;
        }
        if self.verbose {
            config.output.verbose = true;
        }
        if self.no_color {
            config.output.color = false;
        }
    }
}
