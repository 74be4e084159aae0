//! Entry point for `harness = false` test binaries

use crate::args::Args;
use crate::logging;
use crate::reporter::Reporter;
use anyhow::{Context, Result};
use attest_config::{ConfigLoader, OutputFormat, RunConfig};
use attest_core::{Registry, RegistryResult, Runner};
use clap::Parser;
use colored::Colorize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Process exit status of a test binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Every selected test passed or was skipped
    Success = 0,
    /// At least one test failed
    TestsFailed = 1,
    /// Configuration or declaration was invalid; nothing ran
    ConfigurationError = 2,
}

impl Exit {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn exit(self) -> ! {
        std::process::exit(self.code())
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

/// Parses the command line, declares tests and reports the run.
///
/// ```no_run
/// use attest_cli::Harness;
/// use attest_core::Test;
///
/// fn main() -> std::process::ExitCode {
///     Harness::from_env()
///         .run(|registry| {
///             registry.register(Test::new("smoke", |cx| async move {
///                 cx.check(true, "always");
///                 Ok(())
///             }))?;
///             Ok(())
///         })
///         .into()
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Harness {
    args: Args,
    global_config: Option<PathBuf>,
}

impl Harness {
    /// Parse `std::env::args`, exiting with usage on bad input.
    pub fn from_env() -> Self {
        Self::new(Args::parse())
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::new(Args::try_parse_from(args)?))
    }

    pub fn new(args: Args) -> Self {
        Self {
            args,
            global_config: None,
        }
    }

    /// Read the global config from `path` instead of `~/.attest/config.toml`.
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config = Some(path.into());
        self
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Declare, run and report to stdout. Errors go to stderr.
    pub fn run<F>(&self, declare: F) -> Exit
    where
        F: FnOnce(&mut Registry) -> RegistryResult<()>,
    {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        match self.execute(declare, &mut out) {
            Ok(exit) => exit,
            Err(e) => {
                let _ = out.flush();
                eprintln!("{} {:#}", "error:".red().bold(), e);
                Exit::ConfigurationError
            }
        }
    }

    /// Like [`Harness::run`], writing the report to `out`.
    pub fn execute<F, W>(&self, declare: F, out: &mut W) -> Result<Exit>
    where
        F: FnOnce(&mut Registry) -> RegistryResult<()>,
        W: Write,
    {
        let config = self.resolve_config()?;
        logging::init(config.output.verbose);

        let mut registry = Registry::new();
        declare(&mut registry).context("Failed to declare tests")?;

        let runner = Runner::from_config(&config);
        tracing::debug!(?runner, "Resolved runner");
        let json = config.output.format == OutputFormat::Json;
        let reporter = Reporter::new(config.output.verbose).with_no_color(!config.output.color);

        if self.args.list {
            let tests = runner.list(&registry);
            if json {
                serde_json::to_writer_pretty(&mut *out, &tests)?;
                writeln!(out)?;
            } else {
                reporter.list(&tests, out)?;
            }
            return Ok(Exit::Success);
        }

        let report = runner
            .run_blocking(&registry)
            .context("Failed to start the test runtime")?;

        if json {
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        } else {
            reporter.report(&report, out)?;
        }
        out.flush()?;

        Ok(if report.is_success() {
            Exit::Success
        } else {
            Exit::TestsFailed
        })
    }

    /// Global, project and environment settings, then flags on top.
    fn resolve_config(&self) -> Result<RunConfig> {
        let mut loader = match &self.global_config {
            Some(path) => ConfigLoader::new().with_global_config_path(path),
            None => ConfigLoader::new(),
        };
        let loaded = match &self.args.config {
            Some(path) => loader.load_from_file(path)?,
            None => {
                let cwd = std::env::current_dir().context("Failed to get current directory")?;
                loader.load_from_directory(&cwd)?
            }
        };

        let mut config = loaded.run;
        self.args.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}
