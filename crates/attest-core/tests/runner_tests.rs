//! Scheduling, trait evaluation and aggregation tests

use attest_core::{
    Arguments, Filter, Group, IssueKind, Registry, RunReport, Runner, Status, Test, Trait,
    UnitReport,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn passing(name: &str) -> Test {
    Test::new(name, |_cx| async { Ok(()) })
}

fn status_of(report: &RunReport, id: &str) -> Status {
    report
        .find(id)
        .map(UnitReport::status)
        .unwrap_or_else(|| panic!("no report for {id}"))
}

fn test_report<'a>(report: &'a RunReport, id: &str) -> &'a attest_core::TestReport {
    match report.find(id) {
        Some(UnitReport::Test(test)) => test,
        other => panic!("expected a test report for {id}, got {other:?}"),
    }
}

/// Tracks how many bodies are inside the critical section at once.
#[derive(Default)]
struct Occupancy {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Occupancy {
    async fn visit(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

fn occupying(name: &str, occupancy: &Arc<Occupancy>) -> Test {
    let occupancy = Arc::clone(occupancy);
    Test::new(name, move |_cx| {
        let occupancy = Arc::clone(&occupancy);
        async move {
            occupancy.visit().await;
            Ok(())
        }
    })
}

// ============================================================================
// Basic outcomes
// ============================================================================

#[tokio::test]
async fn test_passing_body_passes() {
    let mut registry = Registry::new();
    registry
        .register(Test::new("arithmetic", |cx| async move {
            cx.check(2 < 3, "two is less than three");
            cx.require(1 + 1 == 2, "addition")?;
            Ok(())
        }))
        .unwrap();

    let report = Runner::new().run(&registry).await;
    assert_eq!(status_of(&report, "arithmetic"), Status::Passed);
    assert!(report.is_success());
    let summary = report.summary();
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.issues, 0);
}

#[tokio::test]
async fn test_soft_failures_keep_running() {
    let reached_end = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&reached_end);
    let mut registry = Registry::new();
    registry
        .register(Test::new("soft", move |cx| {
            let flag = Arc::clone(&flag);
            async move {
                cx.check(false, "first");
                cx.check_eq(1, 2);
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        }))
        .unwrap();

    let report = Runner::new().run(&registry).await;
    let test = test_report(&report, "soft");
    assert_eq!(test.status, Status::Failed);
    assert_eq!(test.issues().count(), 2);
    assert!(reached_end.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_require_stops_the_body() {
    let reached_end = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&reached_end);
    let mut registry = Registry::new();
    registry
        .register(Test::new("fatal", move |cx| {
            let flag = Arc::clone(&flag);
            async move {
                cx.require(false, "stop here")?;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        }))
        .unwrap();

    let report = Runner::new().run(&registry).await;
    let test = test_report(&report, "fatal");
    let kinds: Vec<_> = test.issues().map(|issue| issue.kind).collect();
    assert_eq!(kinds, vec![IssueKind::Require]);
    assert!(!reached_end.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_panic_is_recorded_not_propagated() {
    let mut registry = Registry::new();
    registry
        .register(Test::new("panics", |_cx| async {
            let items: Vec<u8> = Vec::new();
            if items.is_empty() {
                panic!("kaboom");
            }
            Ok(())
        }))
        .unwrap();
    registry.register(passing("survivor")).unwrap();

    let report = Runner::new().run(&registry).await;
    let test = test_report(&report, "panics");
    let issue = test.issues().next().unwrap();
    assert_eq!(issue.kind, IssueKind::Panic);
    assert_eq!(issue.message, "kaboom");
    assert_eq!(status_of(&report, "survivor"), Status::Passed);
}

// ============================================================================
// Enablement
// ============================================================================

#[tokio::test]
async fn test_disabled_body_never_runs() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    let mut registry = Registry::new();
    registry
        .register(
            Test::new("disabled", move |_cx| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .with_trait(Trait::disabled("not ready")),
        )
        .unwrap();

    let report = Runner::new().run(&registry).await;
    let test = test_report(&report, "disabled");
    assert_eq!(test.status, Status::Skipped);
    assert_eq!(test.skip_reason.as_deref(), Some("not ready"));
    assert!(test.invocations.is_empty());
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_conditions_evaluated_at_run_time() {
    let enabled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&enabled);
    let mut registry = Registry::new();
    registry
        .register(passing("conditional").with_trait(Trait::enabled_if(move || {
            flag.load(Ordering::SeqCst)
        })))
        .unwrap();

    let runner = Runner::new();
    let first = runner.run(&registry).await;
    assert_eq!(status_of(&first, "conditional"), Status::Skipped);

    enabled.store(true, Ordering::SeqCst);
    let second = runner.run(&registry).await;
    assert_eq!(status_of(&second, "conditional"), Status::Passed);
}

#[tokio::test]
async fn test_disabled_group_skips_descendants_without_evaluating() {
    let evaluated = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&evaluated);
    let mut registry = Registry::new();
    registry
        .register(
            Group::new("feature")
                .with_trait(Trait::disabled_if(|| true).comment("feature flag off"))
                .child(passing("a").with_trait(Trait::enabled_if(move || {
                    flag.store(true, Ordering::SeqCst);
                    true
                })))
                .child(Group::new("nested").child(passing("b"))),
        )
        .unwrap();

    let report = Runner::new().run(&registry).await;
    assert_eq!(status_of(&report, "feature"), Status::Skipped);
    assert_eq!(status_of(&report, "feature/nested/b"), Status::Skipped);
    assert_eq!(
        test_report(&report, "feature/a").skip_reason.as_deref(),
        Some("feature flag off")
    );
    assert!(!evaluated.load(Ordering::SeqCst));
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn test_group_status_aggregation() {
    let mut registry = Registry::new();
    registry
        .register(
            Group::new("mixed")
                .child(passing("ok"))
                .child(passing("skipped").with_trait(Trait::disabled("later")))
                .child(Test::new("bad", |cx| async move {
                    cx.record("always fails");
                    Ok(())
                })),
        )
        .unwrap();
    registry
        .register(
            Group::new("all_skipped")
                .child(passing("x").with_trait(Trait::disabled("off")))
                .child(passing("y").with_trait(Trait::disabled("off"))),
        )
        .unwrap();
    registry
        .register(
            Group::new("partly_skipped")
                .child(passing("x"))
                .child(passing("y").with_trait(Trait::disabled("off"))),
        )
        .unwrap();
    registry.register(Group::new("empty")).unwrap();

    let report = Runner::new().run(&registry).await;
    assert_eq!(status_of(&report, "mixed"), Status::Failed);
    assert_eq!(status_of(&report, "all_skipped"), Status::Skipped);
    assert_eq!(status_of(&report, "partly_skipped"), Status::Passed);
    assert_eq!(status_of(&report, "empty"), Status::Passed);
    assert!(!report.is_success());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_serialized_group_runs_one_at_a_time() {
    let occupancy = Arc::new(Occupancy::default());
    let mut registry = Registry::new();
    registry
        .register(
            Group::new("serialized_tests")
                .with_trait(Trait::serialized())
                .child(occupying("first", &occupancy))
                .child(occupying("second", &occupancy))
                .child(occupying("third", &occupancy)),
        )
        .unwrap();

    let report = Runner::new().run(&registry).await;
    assert!(report.is_success());
    assert_eq!(occupancy.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_serialized_group_preserves_declaration_order() {
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let mut group = Group::new("ordered").with_trait(Trait::serialized());
    for name in ["one", "two", "three", "four"] {
        let order = Arc::clone(&order);
        group = group.child(Test::new(name, move |cx| {
            let order = Arc::clone(&order);
            async move {
                tokio::task::yield_now().await;
                order.lock().unwrap().push(cx.test_id().name().to_string());
                Ok(())
            }
        }));
    }
    let mut registry = Registry::new();
    registry.register(group).unwrap();

    Runner::new().run(&registry).await;
    assert_eq!(*order.lock().unwrap(), vec!["one", "two", "three", "four"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_siblings_overlap() {
    let occupancy = Arc::new(Occupancy::default());
    let mut registry = Registry::new();
    registry
        .register(
            Group::new("parallel")
                .child(occupying("a", &occupancy))
                .child(occupying("b", &occupancy))
                .child(occupying("c", &occupancy)),
        )
        .unwrap();

    Runner::new().run(&registry).await;
    assert!(occupancy.peak.load(Ordering::SeqCst) > 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_max_parallel_bounds_invocations() {
    let occupancy = Arc::new(Occupancy::default());
    let mut group = Group::new("bounded");
    for i in 0..8 {
        group = group.child(occupying(&format!("t{i}"), &occupancy));
    }
    let mut registry = Registry::new();
    registry.register(group).unwrap();

    Runner::new().with_max_parallel(2).run(&registry).await;
    assert!(occupancy.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sequential_runner() {
    let occupancy = Arc::new(Occupancy::default());
    let mut registry = Registry::new();
    registry.register(occupying("a", &occupancy)).unwrap();
    registry.register(occupying("b", &occupancy)).unwrap();

    Runner::new().with_parallel(false).run(&registry).await;
    assert_eq!(occupancy.peak.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Time limits
// ============================================================================

#[tokio::test]
async fn test_time_limit_aborts_invocation() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let mut registry = Registry::new();
    registry
        .register(
            Test::new("slow", move |_cx| {
                let flag = Arc::clone(&flag);
                async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
            .with_trait(Trait::time_limit(Duration::from_millis(50))),
        )
        .unwrap();

    let report = Runner::new().run(&registry).await;
    let test = test_report(&report, "slow");
    assert_eq!(test.status, Status::Failed);
    assert_eq!(test.issues().next().unwrap().kind, IssueKind::Timeout);
    assert!(test.elapsed < Duration::from_secs(5));
    assert!(!finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_group_time_limit_applies_to_children() {
    let mut registry = Registry::new();
    registry
        .register(
            Group::new("limited")
                .with_trait(Trait::time_limit(Duration::from_millis(50)))
                .child(Test::new("sleeper", |_cx| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                })),
        )
        .unwrap();

    let report = Runner::new().run(&registry).await;
    assert_eq!(status_of(&report, "limited/sleeper"), Status::Failed);
}

#[tokio::test]
async fn test_default_time_limit_from_runner() {
    let mut registry = Registry::new();
    registry
        .register(Test::new("sleeper", |_cx| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }))
        .unwrap();

    let report = Runner::new()
        .with_default_time_limit(Duration::from_millis(50))
        .run(&registry)
        .await;
    assert_eq!(status_of(&report, "sleeper"), Status::Failed);
}

// ============================================================================
// Spawned tasks
// ============================================================================

#[tokio::test]
async fn test_time_limit_stops_spawned_tasks() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let mut registry = Registry::new();
    registry
        .register(
            Test::new("ticker", move |cx| {
                let counter = Arc::clone(&counter);
                async move {
                    cx.spawn(async move {
                        loop {
                            counter.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    });
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
            })
            .with_trait(Trait::time_limit(Duration::from_millis(30))),
        )
        .unwrap();

    let report = Runner::new().run(&registry).await;
    let test = test_report(&report, "ticker");
    assert_eq!(test.status, Status::Failed);
    assert_eq!(test.issues().next().unwrap().kind, IssueKind::Timeout);

    let after_run = ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), after_run);
}

#[tokio::test]
async fn test_spawned_task_outlives_body_and_still_fails_test() {
    let mut registry = Registry::new();
    registry
        .register(Test::new("late_check", |cx| async move {
            let background = cx.clone();
            cx.spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                background.check(false, "background work finished cleanly");
                Ok(())
            });
            Ok(())
        }))
        .unwrap();

    let report = Runner::new().run(&registry).await;
    let test = test_report(&report, "late_check");
    assert_eq!(test.status, Status::Failed);
    let issue = test.issues().next().unwrap();
    assert_eq!(issue.kind, IssueKind::Assertion);
    assert_eq!(issue.message, "background work finished cleanly");
}

#[tokio::test]
async fn test_spawned_task_errors_and_panics_are_recorded() {
    let mut registry = Registry::new();
    registry
        .register(Test::new("returns_error", |cx| async move {
            cx.spawn(async { anyhow::bail!("connection reset") });
            Ok(())
        }))
        .unwrap();
    registry
        .register(Test::new("panics", |cx| async move {
            cx.spawn(async {
                tokio::task::yield_now().await;
                panic!("worker exploded");
            });
            Ok(())
        }))
        .unwrap();

    let report = Runner::new().run(&registry).await;

    let error = test_report(&report, "returns_error");
    assert_eq!(error.status, Status::Failed);
    let issue = error.issues().next().unwrap();
    assert_eq!(issue.kind, IssueKind::UnexpectedError);
    assert!(issue.message.contains("connection reset"));

    let panic = test_report(&report, "panics");
    assert_eq!(panic.status, Status::Failed);
    let issue = panic.issues().next().unwrap();
    assert_eq!(issue.kind, IssueKind::Panic);
    assert!(issue.message.contains("worker exploded"));
}

#[tokio::test]
async fn test_failing_body_aborts_spawned_tasks() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let mut registry = Registry::new();
    registry
        .register(Test::new("early_exit", move |cx| {
            let flag = Arc::clone(&flag);
            async move {
                cx.spawn(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                });
                cx.require(false, "precondition")?;
                Ok(())
            }
        }))
        .unwrap();

    let report = Runner::new().run(&registry).await;
    let test = test_report(&report, "early_exit");
    assert_eq!(test.status, Status::Failed);
    assert_eq!(test.issues().count(), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!finished.load(Ordering::SeqCst));
}

// ============================================================================
// Parameterized tests
// ============================================================================

#[tokio::test]
async fn test_product_and_zip_invocation_counts() {
    let mut registry = Registry::new();
    registry
        .register(Test::parameterized(
            "product",
            Arguments::product(1..=5, ["only"]),
            |_cx, _pair| async { Ok(()) },
        ))
        .unwrap();
    registry
        .register(Test::parameterized(
            "zip",
            Arguments::zip(1..=5, ["only"]),
            |_cx, _pair| async { Ok(()) },
        ))
        .unwrap();

    let report = Runner::new().run(&registry).await;
    assert_eq!(test_report(&report, "product").invocations.len(), 5);
    assert_eq!(test_report(&report, "zip").invocations.len(), 1);
}

#[tokio::test]
async fn test_failing_case_fails_test() {
    let mut registry = Registry::new();
    registry
        .register(Test::parameterized(
            "even",
            Arguments::new([2, 4, 5, 8]),
            |cx, n: i32| async move {
                cx.check(n % 2 == 0, format!("{n} is odd"));
                Ok(())
            },
        ))
        .unwrap();

    let report = Runner::new().run(&registry).await;
    let test = test_report(&report, "even");
    assert_eq!(test.status, Status::Failed);
    let failed: Vec<_> = test
        .invocations
        .iter()
        .filter(|inv| inv.status == Status::Failed)
        .map(|inv| inv.arguments.clone())
        .collect();
    assert_eq!(failed, vec![Some("5".to_string())]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_serialized_parameterized_cases() {
    let occupancy = Arc::new(Occupancy::default());
    let shared = Arc::clone(&occupancy);
    let mut registry = Registry::new();
    registry
        .register(
            Test::parameterized("one_by_one", Arguments::new(0..4), move |_cx, _n: i32| {
                let occupancy = Arc::clone(&shared);
                async move {
                    occupancy.visit().await;
                    Ok(())
                }
            })
            .with_trait(Trait::serialized()),
        )
        .unwrap();

    Runner::new().run(&registry).await;
    assert_eq!(occupancy.peak.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Filtering
// ============================================================================

#[tokio::test]
async fn test_filtered_tests_are_omitted() {
    let mut registry = Registry::new();
    registry
        .register(
            Group::new("tag_tests")
                .child(passing("formatting").with_trait(Trait::tag("formatting")))
                .child(passing("new_feature").with_trait(Trait::tag("is_new"))),
        )
        .unwrap();
    registry.register(Group::new("other").child(passing("plain"))).unwrap();

    let runner = Runner::new().with_filter(Filter::new().with_tag("formatting"));
    let report = runner.run(&registry).await;

    let ids: Vec<_> = report.tests().iter().map(|t| t.id.to_string()).collect();
    assert_eq!(ids, vec!["tag_tests/formatting"]);
    assert!(report.find("other").is_none());

    let listed: Vec<_> = runner.list(&registry).into_iter().map(|t| t.id.to_string()).collect();
    assert_eq!(listed, ids);
}

#[test]
fn test_run_blocking_outside_runtime() {
    let mut registry = Registry::new();
    registry.register(passing("blocking")).unwrap();
    let report = Runner::new().run_blocking(&registry).unwrap();
    assert!(report.is_success());
}
