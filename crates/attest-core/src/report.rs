//! Run reports
//!
//! The runner produces one [`RunReport`] per run. It mirrors the declared
//! tree: groups contain child reports, tests contain one
//! [`InvocationReport`] per executed case.

use crate::issue::{Issue, KnownIssue, SourceLocation};
use crate::registry::UnitId;
use crate::traits::{Bug, Tag};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

/// Final state of an invocation, test, or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

impl Status {
    /// Combine child statuses: any failure fails, all skipped skips,
    /// everything else (including no children) passes.
    pub fn aggregate<I>(statuses: I) -> Status
    where
        I: IntoIterator<Item = Status>,
    {
        let mut any = false;
        let mut all_skipped = true;
        for status in statuses {
            any = true;
            match status {
                Status::Failed => return Status::Failed,
                Status::Passed => all_skipped = false,
                Status::Skipped => {}
            }
        }
        if any && all_skipped {
            Status::Skipped
        } else {
            Status::Passed
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Passed => f.write_str("passed"),
            Status::Failed => f.write_str("failed"),
            Status::Skipped => f.write_str("skipped"),
        }
    }
}

/// Outcome of one executed case
#[derive(Debug, Clone, Serialize)]
pub struct InvocationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    pub status: Status,
    pub issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub known_issues: Vec<KnownIssue>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub id: UnitId,
    pub name: String,
    pub location: SourceLocation,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bugs: Vec<Bug>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub invocations: Vec<InvocationReport>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

impl TestReport {
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.invocations.iter().flat_map(|inv| inv.issues.iter())
    }

    pub fn known_issues(&self) -> impl Iterator<Item = &KnownIssue> {
        self.invocations.iter().flat_map(|inv| inv.known_issues.iter())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub id: UnitId,
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub children: Vec<UnitReport>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitReport {
    Test(TestReport),
    Group(GroupReport),
}

impl UnitReport {
    pub fn id(&self) -> &UnitId {
        match self {
            UnitReport::Test(test) => &test.id,
            UnitReport::Group(group) => &group.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            UnitReport::Test(test) => &test.name,
            UnitReport::Group(group) => &group.name,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            UnitReport::Test(test) => test.status,
            UnitReport::Group(group) => group.status,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            UnitReport::Test(test) => test.elapsed,
            UnitReport::Group(group) => group.elapsed,
        }
    }

    fn collect_tests<'a>(&'a self, out: &mut Vec<&'a TestReport>) {
        match self {
            UnitReport::Test(test) => out.push(test),
            UnitReport::Group(group) => {
                for child in &group.children {
                    child.collect_tests(out);
                }
            }
        }
    }

    fn find(&self, id: &str) -> Option<&UnitReport> {
        if self.id().as_str() == id {
            return Some(self);
        }
        match self {
            UnitReport::Test(_) => None,
            UnitReport::Group(group) => group.children.iter().find_map(|c| c.find(id)),
        }
    }
}

/// Counts over every test in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub invocations: usize,
    pub issues: usize,
    pub known_issues: usize,
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub units: Vec<UnitReport>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn status(&self) -> Status {
        Status::aggregate(self.units.iter().map(UnitReport::status))
    }

    /// True unless some test failed
    pub fn is_success(&self) -> bool {
        self.status() != Status::Failed
    }

    /// Every test report, depth first.
    pub fn tests(&self) -> Vec<&TestReport> {
        let mut out = Vec::new();
        for unit in &self.units {
            unit.collect_tests(&mut out);
        }
        out
    }

    /// Find a unit by its full identifier.
    pub fn find(&self, id: &str) -> Option<&UnitReport> {
        self.units.iter().find_map(|unit| unit.find(id))
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for test in self.tests() {
            summary.tests += 1;
            match test.status {
                Status::Passed => summary.passed += 1,
                Status::Failed => summary.failed += 1,
                Status::Skipped => summary.skipped += 1,
            }
            summary.invocations += test.invocations.len();
            summary.issues += test.issues().count();
            summary.known_issues += test.known_issues().count();
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueKind;
    use rstest::rstest;

    #[rstest]
    #[case(vec![], Status::Passed)]
    #[case(vec![Status::Passed, Status::Skipped], Status::Passed)]
    #[case(vec![Status::Skipped, Status::Skipped], Status::Skipped)]
    #[case(vec![Status::Passed, Status::Failed, Status::Skipped], Status::Failed)]
    #[case(vec![Status::Skipped, Status::Failed], Status::Failed)]
    fn test_aggregate(#[case] statuses: Vec<Status>, #[case] expected: Status) {
        assert_eq!(Status::aggregate(statuses), expected);
    }

    fn test_report(id: UnitId, status: Status, issues: Vec<Issue>) -> UnitReport {
        UnitReport::Test(TestReport {
            name: id.name().to_string(),
            id,
            location: SourceLocation {
                file: "demo.rs",
                line: 1,
                column: 1,
            },
            tags: Vec::new(),
            bugs: Vec::new(),
            status,
            skip_reason: None,
            invocations: vec![InvocationReport {
                arguments: None,
                status,
                issues,
                known_issues: Vec::new(),
                elapsed: Duration::from_millis(2),
            }],
            elapsed: Duration::from_millis(2),
        })
    }

    fn sample() -> RunReport {
        let group_id = UnitId::root("suite");
        RunReport {
            units: vec![
                UnitReport::Group(GroupReport {
                    id: group_id.clone(),
                    name: "suite".to_string(),
                    status: Status::Failed,
                    skip_reason: None,
                    children: vec![
                        test_report(group_id.child("ok"), Status::Passed, vec![]),
                        test_report(
                            group_id.child("bad"),
                            Status::Failed,
                            vec![Issue::new(IssueKind::Assertion, "nope", None)],
                        ),
                    ],
                    elapsed: Duration::from_millis(4),
                }),
                test_report(UnitId::root("alone"), Status::Skipped, vec![]),
            ],
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = sample().summary();
        assert_eq!(
            summary,
            Summary {
                tests: 3,
                passed: 1,
                failed: 1,
                skipped: 1,
                invocations: 3,
                issues: 1,
                known_issues: 0,
            }
        );
    }

    #[test]
    fn test_find_nested() {
        let report = sample();
        assert_eq!(report.find("suite/bad").map(UnitReport::status), Some(Status::Failed));
        assert!(report.find("suite/missing").is_none());
        assert!(!report.is_success());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["units"][0]["kind"], "group");
        assert_eq!(json["units"][0]["children"][1]["status"], "failed");
        assert_eq!(
            json["units"][0]["children"][1]["invocations"][0]["issues"][0]["kind"],
            "assertion"
        );
        assert_eq!(json["units"][1]["id"], "alone");
        assert!(json["elapsed_ms"].as_f64().unwrap() > 4.0);
    }
}
