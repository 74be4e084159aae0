//! Confirmations - counting events across suspension points

use super::TestContext;
use crate::error::ExpectationFailed;
use crate::issue::{Issue, IssueKind, SourceLocation};
use std::fmt;
use std::future::Future;
use std::ops::{RangeFrom, RangeInclusive};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counter handed to a confirmation body. Clone it into event handlers and
/// tasks freely; increments are atomic.
#[derive(Debug, Clone, Default)]
pub struct Confirmation {
    count: Arc<AtomicUsize>,
}

impl Confirmation {
    pub fn confirm(&self) {
        self.confirm_count(1);
    }

    pub fn confirm_count(&self, n: usize) {
        self.count.fetch_add(n, Ordering::SeqCst);
    }

    /// Confirmations observed so far
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// How many confirmations a scope must observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedCount {
    Exactly(usize),
    /// Inclusive bounds; `max: None` means unbounded
    Range { min: usize, max: Option<usize> },
}

impl ExpectedCount {
    pub fn contains(&self, observed: usize) -> bool {
        match *self {
            ExpectedCount::Exactly(n) => observed == n,
            ExpectedCount::Range { min, max } => {
                observed >= min && max.map_or(true, |max| observed <= max)
            }
        }
    }
}

impl From<usize> for ExpectedCount {
    fn from(n: usize) -> Self {
        ExpectedCount::Exactly(n)
    }
}

impl From<RangeInclusive<usize>> for ExpectedCount {
    fn from(range: RangeInclusive<usize>) -> Self {
        ExpectedCount::Range {
            min: *range.start(),
            max: Some(*range.end()),
        }
    }
}

impl From<RangeFrom<usize>> for ExpectedCount {
    fn from(range: RangeFrom<usize>) -> Self {
        ExpectedCount::Range {
            min: range.start,
            max: None,
        }
    }
}

impl fmt::Display for ExpectedCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedCount::Exactly(n) => write!(f, "{}", n),
            ExpectedCount::Range { min, max: Some(max) } => write!(f, "{}..={}", min, max),
            ExpectedCount::Range { min, max: None } => write!(f, "{}..", min),
        }
    }
}

/// Checks the count when the scope ends.
///
/// If the scope is dropped before `finish` (the invocation was cancelled or
/// the body panicked), the confirmation is recorded as failed from `Drop`.
struct ConfirmationScope {
    cx: TestContext,
    comment: String,
    expected: ExpectedCount,
    confirmation: Confirmation,
    location: SourceLocation,
    finished: bool,
}

impl ConfirmationScope {
    fn finish(mut self) -> Result<(), ExpectationFailed> {
        self.finished = true;
        let observed = self.confirmation.count();
        if self.expected.contains(observed) {
            return Ok(());
        }
        Err(self.cx.fail(
            IssueKind::ConfirmationMismatch,
            format!(
                "confirmation '{}' was confirmed {} time(s) but expected {}",
                self.comment, observed, self.expected
            ),
            self.location,
        ))
    }
}

impl Drop for ConfirmationScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::debug!(test = %self.cx.test_id(), comment = %self.comment, "confirmation scope abandoned");
        self.cx.push_issue(Issue::new(
            IssueKind::ConfirmationMismatch,
            format!(
                "confirmation '{}' did not complete (confirmed {} time(s), expected {})",
                self.comment,
                self.confirmation.count(),
                self.expected
            ),
            Some(self.location),
        ));
    }
}

impl TestContext {
    /// Run `body` with a [`Confirmation`] and check, once it completes, that
    /// it was confirmed `expected` times.
    ///
    /// The body may suspend any number of times and hand the confirmation
    /// to other tasks. A wrong count records a `ConfirmationMismatch` issue
    /// and returns `Err`.
    ///
    /// ```
    /// # use attest_core::{Registry, Runner, Test};
    /// # let mut registry = Registry::new();
    /// registry.register(Test::new("counts_events", |cx| async move {
    ///     cx.confirmation("event fired", 3, |confirm| async move {
    ///         for _ in 0..3 {
    ///             confirm.confirm();
    ///         }
    ///     })
    ///     .await?;
    ///     Ok(())
    /// })).unwrap();
    /// # let report = Runner::new().run_blocking(&registry).unwrap();
    /// # assert!(report.is_success());
    /// ```
    #[track_caller]
    pub fn confirmation<F, Fut, R>(
        &self,
        comment: impl Into<String>,
        expected: impl Into<ExpectedCount>,
        body: F,
    ) -> impl Future<Output = Result<R, ExpectationFailed>>
    where
        F: FnOnce(Confirmation) -> Fut,
        Fut: Future<Output = R>,
    {
        let confirmation = Confirmation::default();
        let scope = ConfirmationScope {
            cx: self.clone(),
            comment: comment.into(),
            expected: expected.into(),
            confirmation: confirmation.clone(),
            location: SourceLocation::caller(),
            finished: false,
        };
        async move {
            let value = body(confirmation).await;
            scope.finish().map(|()| value)
        }
    }
}
