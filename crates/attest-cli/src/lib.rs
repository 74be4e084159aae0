//! Attest CLI - command-line harness for test binaries
//!
//! A test target with `harness = false` hands its declarations to
//! [`Harness`], which resolves configuration (global, project, `ATTEST_*`,
//! flags), runs the selected tests and prints a colored or JSON report.

pub mod args;
pub mod harness;
pub mod logging;
pub mod reporter;

pub use args::Args;
pub use harness::{Exit, Harness};
pub use reporter::Reporter;
