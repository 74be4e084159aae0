//! Expectation primitives used inside test bodies
//!
//! Every body receives a [`TestContext`]. Its methods record issues against
//! the running invocation:
//!
//! ## Soft
//! - `check(condition, message)`: record a failure, keep going
//! - `check_eq(actual, expected)` / `check_ne(actual, unexpected)`
//! - `check_throws(matcher, body)`: expect a matching error
//! - `record(message)`: record an issue unconditionally
//!
//! ## Fatal (return `Err(ExpectationFailed)`, propagate with `?`)
//! - `require(condition, message)`
//! - `require_some(option, message)`: unwrap or abort
//! - `require_ok(result)`: unwrap or abort
//! - `require_throws(matcher, body)`
//!
//! ## Scoped
//! - `confirmation(comment, expected, body)`: count events across suspension points
//! - `with_known_issue(comment, body)`: downgrade failures to annotations
//! - `check_throws_async`, `require_throws_async`, `with_known_issue_async`:
//!   the same for bodies that await
//!
//! ## Tasks
//! - `spawn(future)`: run work on a task owned by the invocation. The runner
//!   waits for it before finalizing and aborts it on timeout.

mod confirmation;
mod known_issue;
mod throws;

pub use confirmation::{Confirmation, ExpectedCount};
pub use throws::ErrorMatcher;

use crate::error::ExpectationFailed;
use crate::issue::{Issue, IssueKind, KnownIssue, SourceLocation};
use crate::registry::UnitId;
use std::fmt::{self, Debug, Display};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::{AbortHandle, JoinSet};

#[derive(Debug, Default)]
struct Recorded {
    issues: Vec<Issue>,
    known_issues: Vec<KnownIssue>,
    /// Set once the owner has collected the results
    closed: bool,
}

/// Tasks spawned through any context of one invocation.
type Spawned = Arc<Mutex<JoinSet<()>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ContextInner {
    test: UnitId,
    case: Option<String>,
    recorded: Mutex<Recorded>,
    spawned: Spawned,
}

/// Handle to the invocation a test body is running in.
///
/// Cheap to clone and safe to move into spawned tasks. Everything recorded
/// through any clone lands on the same invocation.
#[derive(Clone)]
pub struct TestContext {
    inner: Arc<ContextInner>,
}

impl TestContext {
    pub(crate) fn new(test: UnitId, case: Option<String>) -> Self {
        Self::with_spawned(test, case, Spawned::default())
    }

    fn with_spawned(test: UnitId, case: Option<String>, spawned: Spawned) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                test,
                case,
                recorded: Mutex::new(Recorded::default()),
                spawned,
            }),
        }
    }

    /// Fresh context for the same invocation with its own issue list.
    /// Tasks spawned through it still belong to the invocation.
    fn scoped(&self) -> Self {
        Self::with_spawned(
            self.inner.test.clone(),
            self.inner.case.clone(),
            Arc::clone(&self.inner.spawned),
        )
    }

    /// Identifier of the running test
    pub fn test_id(&self) -> &UnitId {
        &self.inner.test
    }

    /// Rendered arguments, for parameterized invocations
    pub fn case_label(&self) -> Option<&str> {
        self.inner.case.as_deref()
    }

    fn with_recorded<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        f(&mut lock(&self.inner.recorded))
    }

    pub(crate) fn push_issue(&self, issue: Issue) {
        let refused = self.with_recorded(|r| {
            if r.closed {
                return Some(issue);
            }
            tracing::trace!(test = %self.inner.test, %issue, "issue recorded");
            r.issues.push(issue);
            None
        });
        if let Some(issue) = refused {
            tracing::warn!(
                test = %self.inner.test,
                case = ?self.inner.case,
                %issue,
                "issue recorded after the invocation finished; use TestContext::spawn for background work"
            );
        }
    }

    pub(crate) fn push_known_issue(&self, known: KnownIssue) {
        let refused = self.with_recorded(|r| {
            if r.closed {
                return Some(known);
            }
            r.known_issues.push(known);
            None
        });
        if let Some(known) = refused {
            tracing::warn!(
                test = %self.inner.test,
                issue = %known.issue,
                "known issue recorded after the invocation finished"
            );
        }
    }

    /// Drain everything recorded and refuse further records.
    pub(crate) fn finish(&self) -> (Vec<Issue>, Vec<KnownIssue>) {
        self.with_recorded(|r| {
            r.closed = true;
            (
                std::mem::take(&mut r.issues),
                std::mem::take(&mut r.known_issues),
            )
        })
    }

    /// True once the results of this context have been collected
    pub fn is_finished(&self) -> bool {
        self.with_recorded(|r| r.closed)
    }

    /// Run `future` on a task owned by this invocation.
    ///
    /// The runner waits for every spawned task before finalizing the
    /// invocation, so issues they record are never lost. An error returned
    /// by the task is recorded like one returned by the body. Tasks still
    /// running when the time limit fires, or when the body fails, are
    /// aborted.
    ///
    /// Must be called from within the runner's tokio runtime.
    #[track_caller]
    pub fn spawn<F>(&self, future: F) -> AbortHandle
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let location = SourceLocation::caller();
        let cx = self.clone();
        lock(&self.inner.spawned).spawn(async move {
            if let Err(error) = future.await {
                cx.record_error(&error, location);
            }
        })
    }

    /// Take the invocation's spawned tasks, leaving an empty set behind.
    pub(crate) fn take_spawned(&self) -> JoinSet<()> {
        std::mem::take(&mut *lock(&self.inner.spawned))
    }

    /// Record an error that escaped a body or a spawned task. Fatal
    /// expectations already recorded their issue.
    pub(crate) fn record_error(&self, error: &anyhow::Error, location: SourceLocation) {
        if error.downcast_ref::<ExpectationFailed>().is_none() {
            self.push_issue(Issue::unexpected_error(error, Some(location)));
        }
    }

    /// Record an issue and build the error that aborts the invocation.
    pub(crate) fn fail(
        &self,
        kind: IssueKind,
        message: String,
        location: SourceLocation,
    ) -> ExpectationFailed {
        self.push_issue(Issue::new(kind, message.clone(), Some(location)));
        ExpectationFailed {
            kind,
            message,
            location,
        }
    }

    /// Drain everything recorded so far.
    #[cfg(test)]
    pub(crate) fn take_recorded(&self) -> (Vec<Issue>, Vec<KnownIssue>) {
        self.with_recorded(|r| {
            (
                std::mem::take(&mut r.issues),
                std::mem::take(&mut r.known_issues),
            )
        })
    }

    /// Number of issues recorded so far (known issues excluded).
    pub fn issue_count(&self) -> usize {
        self.with_recorded(|r| r.issues.len())
    }

    /// Record an issue unconditionally.
    #[track_caller]
    pub fn record(&self, message: impl Into<String>) {
        self.push_issue(Issue::new(
            IssueKind::Unconditional,
            message,
            Some(SourceLocation::caller()),
        ));
    }

    /// Soft check. Records a failure when `condition` is false and returns
    /// `condition` so callers can branch on it.
    #[track_caller]
    pub fn check(&self, condition: bool, message: impl Into<String>) -> bool {
        if !condition {
            self.push_issue(Issue::new(
                IssueKind::Assertion,
                message,
                Some(SourceLocation::caller()),
            ));
        }
        condition
    }

    /// Soft equality check, showing both values on failure.
    #[track_caller]
    pub fn check_eq<T>(&self, actual: T, expected: T) -> bool
    where
        T: PartialEq + Debug,
    {
        let equal = actual == expected;
        if !equal {
            self.push_issue(Issue::new(
                IssueKind::Assertion,
                format!(
                    "values not equal\n  Actual:   {:?}\n  Expected: {:?}",
                    actual, expected
                ),
                Some(SourceLocation::caller()),
            ));
        }
        equal
    }

    /// Soft inequality check.
    #[track_caller]
    pub fn check_ne<T>(&self, actual: T, unexpected: T) -> bool
    where
        T: PartialEq + Debug,
    {
        let different = actual != unexpected;
        if !different {
            self.push_issue(Issue::new(
                IssueKind::Assertion,
                format!("values should differ, both are {:?}", actual),
                Some(SourceLocation::caller()),
            ));
        }
        different
    }

    /// Fatal check. Returns `Err` when `condition` is false.
    #[track_caller]
    pub fn require(
        &self,
        condition: bool,
        message: impl Into<String>,
    ) -> Result<(), ExpectationFailed> {
        if condition {
            Ok(())
        } else {
            Err(self.fail(IssueKind::Require, message.into(), SourceLocation::caller()))
        }
    }

    /// Unwrap `value` or abort the invocation.
    #[track_caller]
    pub fn require_some<T>(
        &self,
        value: Option<T>,
        message: impl Into<String>,
    ) -> Result<T, ExpectationFailed> {
        match value {
            Some(value) => Ok(value),
            None => Err(self.fail(
                IssueKind::Require,
                format!("{} (value was None)", message.into()),
                SourceLocation::caller(),
            )),
        }
    }

    /// Unwrap an `Ok` or abort, recording the error.
    #[track_caller]
    pub fn require_ok<T, E>(&self, value: Result<T, E>) -> Result<T, ExpectationFailed>
    where
        E: Display,
    {
        match value {
            Ok(value) => Ok(value),
            Err(error) => Err(self.fail(
                IssueKind::Require,
                format!("expected Ok, got Err({})", error),
                SourceLocation::caller(),
            )),
        }
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("test", &self.inner.test)
            .field("case", &self.inner.case)
            .field("issues", &self.issue_count())
            .finish()
    }
}
