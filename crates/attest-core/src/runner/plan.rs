//! Execution plan
//!
//! Resolves what each unit inherits from its enclosing groups (tags, bugs,
//! the tightest time limit) and drops tests the filter excludes. The plan
//! borrows the registry; nothing is cloned out of the declarations.

use super::filter::Filter;
use crate::registry::{Group, Registry, Test, TestInfo, Unit, UnitId};
use crate::traits::{Bug, Tag};
use std::collections::BTreeSet;
use std::time::Duration;

pub(crate) struct PlannedTest<'r> {
    pub(crate) id: UnitId,
    pub(crate) name: String,
    pub(crate) test: &'r Test,
    pub(crate) tags: BTreeSet<Tag>,
    pub(crate) bugs: Vec<Bug>,
    pub(crate) time_limit: Option<Duration>,
}

pub(crate) struct PlannedGroup<'r> {
    pub(crate) id: UnitId,
    pub(crate) name: String,
    pub(crate) group: &'r Group,
    pub(crate) children: Vec<PlanNode<'r>>,
}

pub(crate) enum PlanNode<'r> {
    Test(PlannedTest<'r>),
    Group(PlannedGroup<'r>),
}

impl PlanNode<'_> {
    pub(crate) fn test_count(&self) -> usize {
        match self {
            PlanNode::Test(_) => 1,
            PlanNode::Group(group) => group.children.iter().map(PlanNode::test_count).sum(),
        }
    }
}

#[derive(Default)]
struct Inherited {
    tags: BTreeSet<Tag>,
    bugs: Vec<Bug>,
    time_limit: Option<Duration>,
}

fn tighter(a: Option<Duration>, b: Option<Duration>) -> Option<Duration> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

pub(crate) fn build<'r>(registry: &'r Registry, filter: &Filter) -> Vec<PlanNode<'r>> {
    let root = Inherited::default();
    registry
        .units()
        .iter()
        .filter_map(|unit| plan_unit(unit, UnitId::root(unit.name()), &root, filter))
        .collect()
}

fn plan_unit<'r>(
    unit: &'r Unit,
    id: UnitId,
    inherited: &Inherited,
    filter: &Filter,
) -> Option<PlanNode<'r>> {
    let traits = unit.trait_set();
    let mut scope = Inherited {
        tags: inherited.tags.clone(),
        bugs: inherited.bugs.clone(),
        time_limit: tighter(inherited.time_limit, traits.time_limit()),
    };
    scope.tags.extend(traits.tags());
    for bug in traits.bugs() {
        if !scope.bugs.contains(&bug) {
            scope.bugs.push(bug);
        }
    }
    let name = unit.display_name().to_string();

    match unit {
        Unit::Test(test) => {
            if !filter.matches(&id, &name, &scope.tags) {
                tracing::trace!(%id, "filtered out");
                return None;
            }
            Some(PlanNode::Test(PlannedTest {
                id,
                name,
                test,
                tags: scope.tags,
                bugs: scope.bugs,
                time_limit: scope.time_limit,
            }))
        }
        Unit::Group(group) => {
            let children: Vec<_> = group
                .units()
                .iter()
                .filter_map(|child| plan_unit(child, id.child(child.name()), &scope, filter))
                .collect();
            // Declared-empty groups stay visible unless a filter is active
            let declared_empty = group.units().is_empty();
            if children.is_empty() && !(declared_empty && filter.is_empty()) {
                return None;
            }
            Some(PlanNode::Group(PlannedGroup {
                id,
                name,
                group,
                children,
            }))
        }
    }
}

/// Flatten the plan into listing entries.
pub(crate) fn listing(nodes: &[PlanNode<'_>]) -> Vec<TestInfo> {
    let mut out = Vec::new();
    for node in nodes {
        collect(node, &mut out);
    }
    out
}

fn collect(node: &PlanNode<'_>, out: &mut Vec<TestInfo>) {
    match node {
        PlanNode::Test(planned) => out.push(TestInfo {
            id: planned.id.clone(),
            parent: planned.id.parent(),
            display_name: planned.name.clone(),
            tags: planned.tags.clone(),
            cases: planned.test.case_count(),
            location: planned.test.location(),
        }),
        PlanNode::Group(group) => {
            for child in &group.children {
                collect(child, out);
            }
        }
    }
}
