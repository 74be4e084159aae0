//! Known issues - failures that are expected for now

use super::TestContext;
use crate::error::ExpectationFailed;
use crate::issue::{Issue, IssueKind, KnownIssue, SourceLocation};
use std::future::Future;

impl TestContext {
    /// Run `body`, recording anything that goes wrong inside it as a known
    /// issue instead of a failure.
    ///
    /// If `body` records nothing, the known issue is considered fixed and a
    /// `KnownIssueNotRecorded` failure is recorded so the annotation gets
    /// removed.
    #[track_caller]
    pub fn with_known_issue<F>(&self, comment: impl Into<String>, body: F)
    where
        F: FnOnce(&TestContext) -> anyhow::Result<()>,
    {
        let location = SourceLocation::caller();
        let scope = self.scoped();
        let result = body(&scope);
        self.settle_known_issue(scope, result, comment.into(), false, location);
    }

    /// Like [`with_known_issue`](Self::with_known_issue), but a clean pass is
    /// accepted silently.
    #[track_caller]
    pub fn with_intermittent_known_issue<F>(&self, comment: impl Into<String>, body: F)
    where
        F: FnOnce(&TestContext) -> anyhow::Result<()>,
    {
        let location = SourceLocation::caller();
        let scope = self.scoped();
        let result = body(&scope);
        self.settle_known_issue(scope, result, comment.into(), true, location);
    }

    /// [`with_known_issue`](Self::with_known_issue) for a body that awaits.
    ///
    /// The body receives its own scope context by value.
    ///
    /// ```
    /// # use attest_core::{Registry, Runner, Test};
    /// # let mut registry = Registry::new();
    /// registry.register(Test::new("slow_division", |cx| async move {
    ///     cx.with_known_issue_async("remote division is broken", |scope| async move {
    ///         tokio::task::yield_now().await;
    ///         scope.check(false, "remote division rounds correctly");
    ///         Ok(())
    ///     })
    ///     .await;
    ///     Ok(())
    /// })).unwrap();
    /// # let report = Runner::new().run_blocking(&registry).unwrap();
    /// # assert!(report.is_success());
    /// ```
    #[track_caller]
    pub fn with_known_issue_async<F, Fut>(
        &self,
        comment: impl Into<String>,
        body: F,
    ) -> impl Future<Output = ()>
    where
        F: FnOnce(TestContext) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.known_issue_scope_async(comment.into(), false, SourceLocation::caller(), body)
    }

    /// Intermittent form of [`with_known_issue_async`](Self::with_known_issue_async).
    #[track_caller]
    pub fn with_intermittent_known_issue_async<F, Fut>(
        &self,
        comment: impl Into<String>,
        body: F,
    ) -> impl Future<Output = ()>
    where
        F: FnOnce(TestContext) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.known_issue_scope_async(comment.into(), true, SourceLocation::caller(), body)
    }

    fn known_issue_scope_async<F, Fut>(
        &self,
        comment: String,
        intermittent: bool,
        location: SourceLocation,
        body: F,
    ) -> impl Future<Output = ()>
    where
        F: FnOnce(TestContext) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let cx = self.clone();
        async move {
            let scope = cx.scoped();
            let result = body(scope.clone()).await;
            cx.settle_known_issue(scope, result, comment, intermittent, location);
        }
    }

    /// Move what `scope` recorded onto this context as known issues.
    fn settle_known_issue(
        &self,
        scope: TestContext,
        result: anyhow::Result<()>,
        comment: String,
        intermittent: bool,
        location: SourceLocation,
    ) {
        let (mut issues, nested_known) = scope.finish();

        if let Err(error) = result {
            // Fatal expectations already recorded their issue
            if error.downcast_ref::<ExpectationFailed>().is_none() {
                issues.push(Issue::unexpected_error(&error, Some(location)));
            }
        }

        for known in nested_known {
            self.push_known_issue(known);
        }

        if issues.is_empty() {
            if !intermittent {
                self.push_issue(Issue::new(
                    IssueKind::KnownIssueNotRecorded,
                    format!("known issue '{}' was not recorded", comment),
                    Some(location),
                ));
            }
            return;
        }

        tracing::debug!(test = %self.test_id(), count = issues.len(), %comment, "known issues matched");
        for issue in issues {
            self.push_known_issue(KnownIssue {
                comment: Some(comment.clone()),
                issue,
            });
        }
    }
}
