//! Human-readable rendering of run reports and listings

use attest_core::{RunReport, Status, TestInfo, TestReport};
use colored::*;
use std::io::{self, Write};

/// Renders a finished run for a terminal
pub struct Reporter {
    /// One line per test instead of a progress dot
    verbose: bool,
    /// Disable colored output
    no_color: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Reporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            no_color: false,
        }
    }

    /// Disable colored output
    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// Write a report: per-test results, summary, then failure details.
    pub fn report(&self, report: &RunReport, out: &mut impl Write) -> io::Result<()> {
        if self.no_color {
            colored::control::set_override(false);
        }
        let result = self.write_report(report, out);
        if self.no_color {
            colored::control::unset_override();
        }
        result
    }

    fn write_report(&self, report: &RunReport, out: &mut impl Write) -> io::Result<()> {
        let tests = report.tests();
        for test in &tests {
            self.write_test_result(test, out)?;
        }

        // Dots need a newline
        if !self.verbose && !tests.is_empty() {
            writeln!(out)?;
        }

        writeln!(out)?;
        self.write_summary(report, out)?;
        self.write_failures(&tests, out)?;
        if self.verbose {
            self.write_known_issues(&tests, out)?;
        }
        Ok(())
    }

    fn write_test_result(&self, test: &TestReport, out: &mut impl Write) -> io::Result<()> {
        if !self.verbose {
            let mark = match test.status {
                Status::Passed => ".".green(),
                Status::Failed => "F".red().bold(),
                Status::Skipped => "S".yellow(),
            };
            write!(out, "{}", mark)?;
            return out.flush();
        }

        let label = match test.status {
            Status::Passed => "PASS".green().bold(),
            Status::Failed => "FAIL".red().bold(),
            Status::Skipped => "SKIP".yellow().bold(),
        };
        match (&test.status, &test.skip_reason) {
            (Status::Skipped, Some(reason)) => {
                writeln!(out, "{} {} ({})", label, test.id, reason.dimmed())?
            }
            _ => writeln!(out, "{} {} ({:.2?})", label, test.id, test.elapsed)?,
        }

        // Cases of a parameterized test
        for invocation in &test.invocations {
            if let Some(arguments) = &invocation.arguments {
                let mark = match invocation.status {
                    Status::Passed => "✓".green(),
                    Status::Failed => "✗".red(),
                    Status::Skipped => "-".yellow(),
                };
                writeln!(out, "    {} {}", mark, arguments)?;
            }
        }
        Ok(())
    }

    fn write_summary(&self, report: &RunReport, out: &mut impl Write) -> io::Result<()> {
        let summary = report.summary();
        writeln!(out, "{}", "─".repeat(50))?;

        let status = if summary.failed > 0 {
            "FAILED".red().bold()
        } else {
            "PASSED".green().bold()
        };
        write!(
            out,
            "Test result: {} | {} total, {} passed, {} failed, {} skipped",
            status,
            summary.tests.to_string().bold(),
            summary.passed.to_string().green().bold(),
            if summary.failed > 0 {
                summary.failed.to_string().red().bold()
            } else {
                summary.failed.to_string().normal()
            },
            summary.skipped,
        )?;
        if summary.known_issues > 0 {
            write!(
                out,
                ", {} known issues",
                summary.known_issues.to_string().yellow()
            )?;
        }
        writeln!(out)?;
        writeln!(out, "Time: {:.2?}", report.elapsed)
    }

    fn write_failures(&self, tests: &[&TestReport], out: &mut impl Write) -> io::Result<()> {
        let failures: Vec<_> = tests
            .iter()
            .filter(|t| t.status == Status::Failed)
            .collect();
        if failures.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "{}", "Failures:".red().bold())?;
        writeln!(out)?;

        for test in failures {
            writeln!(out, "  {} {}", "●".red(), test.location)?;
            writeln!(out, "    {}", test.name.bold())?;
            for bug in &test.bugs {
                writeln!(out, "    bug: {}", bug)?;
            }
            for invocation in test.invocations.iter().filter(|i| !i.issues.is_empty()) {
                if let Some(arguments) = &invocation.arguments {
                    writeln!(out, "    with {}", arguments.bold())?;
                }
                for issue in &invocation.issues {
                    writeln!(out, "      {}", issue.to_string().dimmed())?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn write_known_issues(&self, tests: &[&TestReport], out: &mut impl Write) -> io::Result<()> {
        let known: Vec<_> = tests
            .iter()
            .filter(|t| t.known_issues().next().is_some())
            .collect();
        if known.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "{}", "Known issues:".yellow().bold())?;
        for test in known {
            writeln!(out, "    {}", test.name.bold())?;
            for known_issue in test.known_issues() {
                match &known_issue.comment {
                    Some(comment) => writeln!(
                        out,
                        "      {} ({})",
                        known_issue.issue.to_string().dimmed(),
                        comment
                    )?,
                    None => writeln!(out, "      {}", known_issue.issue.to_string().dimmed())?,
                }
            }
        }
        Ok(())
    }

    /// Write the selected tests, one per line.
    pub fn list(&self, tests: &[TestInfo], out: &mut impl Write) -> io::Result<()> {
        if self.no_color {
            colored::control::set_override(false);
        }
        let result = self.write_list(tests, out);
        if self.no_color {
            colored::control::unset_override();
        }
        result
    }

    fn write_list(&self, tests: &[TestInfo], out: &mut impl Write) -> io::Result<()> {
        for info in tests {
            write!(out, "{}", info.id)?;
            if info.display_name != info.id.name() {
                write!(out, " \"{}\"", info.display_name)?;
            }
            if info.cases > 1 {
                write!(out, " {}", format!("[{} cases]", info.cases).dimmed())?;
            }
            if !info.tags.is_empty() {
                let tags: Vec<_> = info.tags.iter().map(|t| format!("#{}", t)).collect();
                write!(out, " {}", tags.join(" ").cyan())?;
            }
            writeln!(out)?;
        }
        writeln!(out)?;
        writeln!(out, "{} tests", tests.len())
    }
}
