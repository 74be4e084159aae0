//! Test runner - schedule and execute registered tests
//!
//! The runner walks the plan built from a [`Registry`]:
//! - trait conditions are evaluated right before a unit is scheduled, a
//!   group before any of its children
//! - siblings run concurrently unless their group is serialized or the
//!   runner is sequential
//! - every invocation runs on its own tokio task so it can suspend freely,
//!   be aborted on timeout, and panic without taking the run down

mod filter;
mod plan;

pub use filter::Filter;

use crate::expect::TestContext;
use crate::issue::{Issue, IssueKind, SourceLocation};
use crate::registry::{Case, Registry, TestBody, TestInfo, UnitId};
use crate::report::{GroupReport, InvocationReport, RunReport, Status, TestReport, UnitReport};
use crate::traits::Enablement;
use attest_config::RunConfig;
use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use plan::{PlanNode, PlannedGroup, PlannedTest};
use std::any::Any;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::Instrument;

/// Test runner with configuration
#[derive(Debug, Clone)]
pub struct Runner {
    parallel: bool,
    max_parallel: Option<usize>,
    default_time_limit: Option<Duration>,
    maximum_time_limit: Option<Duration>,
    filter: Filter,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Parallel, unbounded, no time limits, no filter.
    pub fn new() -> Self {
        Self {
            parallel: true,
            max_parallel: None,
            default_time_limit: None,
            maximum_time_limit: None,
            filter: Filter::new(),
        }
    }

    /// Build a runner from resolved configuration.
    pub fn from_config(config: &RunConfig) -> Self {
        let mut filter = Filter::new();
        for pattern in &config.filter {
            filter = filter.with_name(pattern.as_str());
        }
        for pattern in &config.skip {
            filter = filter.with_skip(pattern.as_str());
        }
        for tag in &config.include_tags {
            filter = filter.with_tag(tag.as_str());
        }
        for tag in &config.exclude_tags {
            filter = filter.without_tag(tag.as_str());
        }

        let mut runner = Self::new()
            .with_parallel(config.parallel)
            .with_filter(filter);
        if let Some(max) = config.max_parallel {
            runner = runner.with_max_parallel(max);
        }
        runner.default_time_limit = config.default_time_limit;
        runner.maximum_time_limit = config.maximum_time_limit;
        runner
    }

    /// Set whether siblings run concurrently
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Bound the number of invocations running at once (at least 1).
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = Some(max.max(1));
        self
    }

    /// Time limit for tests that declare none
    pub fn with_default_time_limit(mut self, limit: Duration) -> Self {
        self.default_time_limit = Some(limit);
        self
    }

    /// Cap applied to every effective time limit
    pub fn with_maximum_time_limit(mut self, limit: Duration) -> Self {
        self.maximum_time_limit = Some(limit);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Tests this runner would execute, without running anything.
    pub fn list(&self, registry: &Registry) -> Vec<TestInfo> {
        plan::listing(&plan::build(registry, &self.filter))
    }

    /// Run every selected test in `registry`.
    pub async fn run(&self, registry: &Registry) -> RunReport {
        let start = Instant::now();
        let plan = plan::build(registry, &self.filter);
        let tests: usize = plan.iter().map(PlanNode::test_count).sum();
        tracing::debug!(
            tests,
            parallel = self.parallel,
            max_parallel = ?self.max_parallel,
            "starting run"
        );

        let execution = Execution {
            runner: self,
            permits: self.max_parallel.map(|n| Arc::new(Semaphore::new(n))),
        };
        let units = execution.run_children(&plan, false).await;

        let report = RunReport {
            units,
            elapsed: start.elapsed(),
        };
        tracing::debug!(status = %report.status(), elapsed = ?report.elapsed, "run finished");
        report
    }

    /// Run on a fresh multi-threaded tokio runtime.
    pub fn run_blocking(&self, registry: &Registry) -> io::Result<RunReport> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        Ok(runtime.block_on(self.run(registry)))
    }

    fn effective_time_limit(&self, declared: Option<Duration>) -> Option<Duration> {
        let limit = declared.or(self.default_time_limit);
        match (limit, self.maximum_time_limit) {
            (Some(limit), Some(maximum)) => Some(limit.min(maximum)),
            (limit, maximum) => limit.or(maximum),
        }
    }
}

struct Execution<'a> {
    runner: &'a Runner,
    permits: Option<Arc<Semaphore>>,
}

enum Outcome {
    Finished(Result<anyhow::Result<()>, JoinError>),
    TimedOut(Duration),
}

impl<'a> Execution<'a> {
    async fn run_children(&self, nodes: &[PlanNode<'_>], serialized: bool) -> Vec<UnitReport> {
        if serialized || !self.runner.parallel {
            let mut reports = Vec::with_capacity(nodes.len());
            for node in nodes {
                reports.push(self.run_node(node, serialized).await);
            }
            reports
        } else {
            join_all(nodes.iter().map(|node| self.run_node(node, false))).await
        }
    }

    fn run_node<'s, 'r: 's>(
        &'s self,
        node: &'s PlanNode<'r>,
        in_serialized: bool,
    ) -> BoxFuture<'s, UnitReport> {
        match node {
            PlanNode::Test(test) => self
                .run_test(test, in_serialized)
                .map(UnitReport::Test)
                .boxed(),
            PlanNode::Group(group) => {
                let span = tracing::debug_span!("group", id = %group.id);
                self.run_group(group)
                    .map(UnitReport::Group)
                    .instrument(span)
                    .boxed()
            }
        }
    }

    async fn run_group(&self, planned: &PlannedGroup<'_>) -> GroupReport {
        let start = Instant::now();
        tracing::debug!(id = %planned.id, children = planned.children.len(), "scheduling group");

        if let Enablement::Skipped { reason } = planned.group.trait_set().evaluate() {
            tracing::debug!(id = %planned.id, %reason, "group skipped");
            return skipped_group(planned, &reason);
        }

        let serialized = planned.group.trait_set().is_serialized();
        let children = self.run_children(&planned.children, serialized).await;
        GroupReport {
            id: planned.id.clone(),
            name: planned.name.clone(),
            status: Status::aggregate(children.iter().map(UnitReport::status)),
            skip_reason: None,
            children,
            elapsed: start.elapsed(),
        }
    }

    async fn run_test(&self, planned: &PlannedTest<'_>, in_serialized: bool) -> TestReport {
        let start = Instant::now();
        tracing::debug!(id = %planned.id, "scheduling test");

        if let Enablement::Skipped { reason } = planned.test.trait_set().evaluate() {
            tracing::debug!(id = %planned.id, %reason, "test skipped");
            return skipped_test(planned, reason);
        }

        let limit = self.runner.effective_time_limit(planned.time_limit);
        let location = planned.test.location();
        let invocations = match planned.test.body() {
            TestBody::Plain(body) => {
                let body = Arc::clone(body);
                let case = Case {
                    label: None,
                    run: Box::new(move |cx| body(cx)),
                };
                vec![self.invoke(&planned.id, case, limit, location).await]
            }
            TestBody::Parameterized(source) => {
                let sequential = in_serialized
                    || planned.test.trait_set().is_serialized()
                    || !self.runner.parallel;
                if sequential {
                    let mut reports = Vec::with_capacity(source.len());
                    for case in source.cases() {
                        reports.push(self.invoke(&planned.id, case, limit, location).await);
                    }
                    reports
                } else {
                    join_all(
                        source
                            .cases()
                            .map(|case| self.invoke(&planned.id, case, limit, location)),
                    )
                    .await
                }
            }
        };

        TestReport {
            id: planned.id.clone(),
            name: planned.name.clone(),
            location,
            tags: planned.tags.iter().cloned().collect(),
            bugs: planned.bugs.clone(),
            status: Status::aggregate(invocations.iter().map(|inv| inv.status)),
            skip_reason: None,
            invocations,
            elapsed: start.elapsed(),
        }
    }

    /// Execute one case on its own task.
    async fn invoke(
        &self,
        test: &UnitId,
        case: Case,
        limit: Option<Duration>,
        location: SourceLocation,
    ) -> InvocationReport {
        let _permit = match &self.permits {
            Some(permits) => Arc::clone(permits).acquire_owned().await.ok(),
            None => None,
        };

        let Case { label, run } = case;
        let cx = TestContext::new(test.clone(), label.clone());
        let span = tracing::trace_span!(
            "invocation",
            test = %test,
            case = label.as_deref().unwrap_or("")
        );
        tracing::trace!(parent: &span, "started");

        let start = Instant::now();
        let mut handle = tokio::spawn(run(cx.clone()).instrument(span));
        // The body and every task it spawned share the time limit
        let body_and_tasks = async {
            let joined = (&mut handle).await;
            if matches!(joined, Ok(Ok(()))) {
                join_spawned(&cx, location).await;
            } else {
                abort_spawned(&cx).await;
            }
            joined
        };
        let outcome = match limit {
            Some(limit) => match tokio::time::timeout(limit, body_and_tasks).await {
                Ok(joined) => Outcome::Finished(joined),
                Err(_) => {
                    handle.abort();
                    // Wait for the body to be dropped so cancelled scopes finalize first
                    let _ = handle.await;
                    abort_spawned(&cx).await;
                    Outcome::TimedOut(limit)
                }
            },
            None => Outcome::Finished(body_and_tasks.await),
        };
        let elapsed = start.elapsed();

        record_outcome(&cx, outcome, location);
        let (issues, known_issues) = cx.finish();
        let status = if issues.is_empty() {
            Status::Passed
        } else {
            Status::Failed
        };
        tracing::trace!(%test, case = ?label, %status, issues = issues.len(), "finished");

        InvocationReport {
            arguments: label,
            status,
            issues,
            known_issues,
            elapsed,
        }
    }
}

/// Wait for the tasks spawned through `cx`, including ones they spawn in turn.
async fn join_spawned(cx: &TestContext, location: SourceLocation) {
    loop {
        let mut tasks = cx.take_spawned();
        if tasks.is_empty() {
            return;
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(join_error) = joined {
                if join_error.is_panic() {
                    let message = panic_message(join_error.into_panic());
                    tracing::warn!(test = %cx.test_id(), %message, "spawned task panicked");
                    cx.push_issue(Issue::new(
                        IssueKind::Panic,
                        format!("spawned task panicked: {}", message),
                        Some(location),
                    ));
                }
            }
        }
    }
}

/// Abort the tasks spawned through `cx` and wait until they are gone.
async fn abort_spawned(cx: &TestContext) {
    loop {
        let mut tasks = cx.take_spawned();
        if tasks.is_empty() {
            return;
        }
        tracing::debug!(test = %cx.test_id(), tasks = tasks.len(), "aborting spawned tasks");
        tasks.shutdown().await;
    }
}

/// Turn how the body ended into issues on `cx`.
fn record_outcome(cx: &TestContext, outcome: Outcome, location: SourceLocation) {
    match outcome {
        Outcome::Finished(Ok(Ok(()))) => {}
        Outcome::Finished(Ok(Err(error))) => cx.record_error(&error, location),
        Outcome::Finished(Err(join_error)) if join_error.is_panic() => {
            let message = panic_message(join_error.into_panic());
            tracing::warn!(test = %cx.test_id(), %message, "test body panicked");
            cx.push_issue(Issue::new(IssueKind::Panic, message, Some(location)));
        }
        Outcome::Finished(Err(_)) => {
            tracing::warn!(test = %cx.test_id(), "test task was cancelled");
            cx.push_issue(Issue::new(
                IssueKind::Cancelled,
                "test task was cancelled before it finished",
                Some(location),
            ));
        }
        Outcome::TimedOut(limit) => {
            tracing::warn!(test = %cx.test_id(), ?limit, "time limit exceeded");
            cx.push_issue(Issue::new(
                IssueKind::Timeout,
                format!("exceeded time limit of {:?}", limit),
                Some(location),
            ));
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "test body panicked".to_string()
    }
}

fn skipped_test(planned: &PlannedTest<'_>, reason: String) -> TestReport {
    TestReport {
        id: planned.id.clone(),
        name: planned.name.clone(),
        location: planned.test.location(),
        tags: planned.tags.iter().cloned().collect(),
        bugs: planned.bugs.clone(),
        status: Status::Skipped,
        skip_reason: Some(reason),
        invocations: Vec::new(),
        elapsed: Duration::ZERO,
    }
}

/// Skip a group and everything under it without evaluating the children.
fn skipped_group(planned: &PlannedGroup<'_>, reason: &str) -> GroupReport {
    let children: Vec<_> = planned
        .children
        .iter()
        .map(|child| match child {
            PlanNode::Test(test) => UnitReport::Test(skipped_test(test, reason.to_string())),
            PlanNode::Group(group) => UnitReport::Group(skipped_group(group, reason)),
        })
        .collect();
    GroupReport {
        id: planned.id.clone(),
        name: planned.name.clone(),
        status: Status::Skipped,
        skip_reason: Some(reason.to_string()),
        children,
        elapsed: Duration::ZERO,
    }
}
