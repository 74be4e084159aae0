//! Issues recorded against a running invocation
//!
//! An [`Issue`] is the unit of failure: soft checks, requires, error
//! expectations, confirmations, timeouts and panics all end up here. The
//! runner turns a non-empty issue list into a failed invocation.

use serde::Serialize;
use std::fmt;
use std::panic::Location;

/// Where in the test source an issue or declaration originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// Location of the caller of the enclosing `#[track_caller]` function.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }
}

impl From<&'static Location<'static>> for SourceLocation {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// What produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A soft `check` evaluated to false
    Assertion,
    /// A fatal `require` failed and aborted the invocation
    Require,
    /// An error expectation saw no error, or the wrong one
    ErrorExpectation,
    /// A confirmation finished with the wrong count or never finished
    ConfirmationMismatch,
    /// The body returned an error nobody expected
    UnexpectedError,
    /// The body, or a task it spawned, panicked
    Panic,
    /// The body's task was cancelled without panicking
    Cancelled,
    /// The invocation exceeded its time limit
    Timeout,
    /// Recorded explicitly through `TestContext::record`
    Unconditional,
    /// A known-issue scope completed without recording anything
    KnownIssueNotRecorded,
}

impl IssueKind {
    /// Short label used by reporters
    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::Assertion => "expectation failed",
            IssueKind::Require => "requirement failed",
            IssueKind::ErrorExpectation => "error expectation failed",
            IssueKind::ConfirmationMismatch => "confirmation mismatch",
            IssueKind::UnexpectedError => "caught error",
            IssueKind::Panic => "panicked",
            IssueKind::Cancelled => "cancelled",
            IssueKind::Timeout => "time limit exceeded",
            IssueKind::Unconditional => "issue recorded",
            IssueKind::KnownIssueNotRecorded => "known issue not recorded",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single recorded failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Issue {
    pub fn new(kind: IssueKind, message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
        }
    }

    /// An error that escaped the test body, rendered with its full cause chain.
    pub fn unexpected_error(error: &anyhow::Error, location: Option<SourceLocation>) -> Self {
        Self::new(IssueKind::UnexpectedError, format!("{:#}", error), location)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}

/// An issue that was expected, recorded inside a known-issue scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnownIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub issue: Issue,
}
