//! Test registry - declared tests and groups
//!
//! Tests and groups are declared as values and registered on an explicit
//! [`Registry`] owned by the entry point:
//!
//! ```
//! use attest_core::{Group, Registry, Test, Trait};
//!
//! let mut registry = Registry::new();
//! registry
//!     .register(
//!         Group::new("serialized_tests")
//!             .with_trait(Trait::serialized())
//!             .child(Test::new("first", |cx| async move {
//!                 cx.require(2 < 3, "two is less than three")?;
//!                 Ok(())
//!             }))
//!             .child(Test::new("second", |_cx| async { Ok(()) })),
//!     )
//!     .unwrap();
//! assert_eq!(registry.len(), 1);
//! ```
//!
//! Registration validates the whole unit up front, so duplicate identifiers
//! and malformed argument sources are reported before any test runs.

use crate::arguments::{case_count, Arguments, Strategy};
use crate::error::{ConfigurationError, RegistryResult};
use crate::expect::TestContext;
use crate::issue::SourceLocation;
use crate::traits::{Tag, Trait, TraitSet};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Future returned by a test body.
pub type BodyFuture = BoxFuture<'static, anyhow::Result<()>>;

type PlainBody = Arc<dyn Fn(TestContext) -> BodyFuture + Send + Sync>;

/// `/`-separated path from the outermost group to a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub const SEPARATOR: char = '/';

    /// Identifier of a top-level unit
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}{}{}", self.0, Self::SEPARATOR, name))
    }

    pub fn parent(&self) -> Option<UnitId> {
        self.0
            .rsplit_once(Self::SEPARATOR)
            .map(|(parent, _)| UnitId(parent.to_string()))
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.0
            .rsplit_once(Self::SEPARATOR)
            .map_or(self.0.as_str(), |(_, name)| name)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(Self::SEPARATOR)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One concrete execution of a test body.
pub(crate) struct Case {
    /// Debug rendering of the arguments, for parameterized tests
    pub(crate) label: Option<String>,
    pub(crate) run: Box<dyn FnOnce(TestContext) -> BodyFuture + Send>,
}

/// Type-erased parameterized body.
pub(crate) trait CaseSource: Send + Sync {
    fn len(&self) -> usize;
    fn sizes(&self) -> &[usize];
    fn strategy(&self) -> Strategy;
    fn cases(&self) -> Box<dyn Iterator<Item = Case> + Send + '_>;
}

struct Parameterized<T> {
    arguments: Arguments<T>,
    body: Arc<dyn Fn(TestContext, T) -> BodyFuture + Send + Sync>,
}

impl<T> CaseSource for Parameterized<T>
where
    T: Debug + Send + 'static,
{
    fn len(&self) -> usize {
        self.arguments.len()
    }

    fn sizes(&self) -> &[usize] {
        self.arguments.sizes()
    }

    fn strategy(&self) -> Strategy {
        self.arguments.strategy()
    }

    fn cases(&self) -> Box<dyn Iterator<Item = Case> + Send + '_> {
        Box::new(self.arguments.iter().map(move |value| {
            let body = Arc::clone(&self.body);
            Case {
                label: Some(format!("{:?}", value)),
                run: Box::new(move |cx| body(cx, value)),
            }
        }))
    }
}

pub(crate) enum TestBody {
    Plain(PlainBody),
    Parameterized(Box<dyn CaseSource>),
}

/// A declared test.
pub struct Test {
    name: String,
    traits: TraitSet,
    body: TestBody,
    location: SourceLocation,
}

impl Test {
    /// Declare a test with an async body.
    #[track_caller]
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            traits: TraitSet::new(),
            body: TestBody::Plain(Arc::new(move |cx| body(cx).boxed())),
            location: SourceLocation::caller(),
        }
    }

    /// Declare a test that runs once per argument case.
    #[track_caller]
    pub fn parameterized<T, F, Fut>(
        name: impl Into<String>,
        arguments: Arguments<T>,
        body: F,
    ) -> Self
    where
        T: Debug + Send + 'static,
        F: Fn(TestContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let source = Parameterized {
            arguments,
            body: Arc::new(move |cx, value| body(cx, value).boxed()),
        };
        Self {
            name: name.into(),
            traits: TraitSet::new(),
            body: TestBody::Parameterized(Box::new(source)),
            location: SourceLocation::caller(),
        }
    }

    pub fn with_trait(mut self, t: Trait) -> Self {
        self.traits.push(t);
        self
    }

    pub fn traits(mut self, traits: impl IntoIterator<Item = Trait>) -> Self {
        self.traits.extend(traits);
        self
    }

    pub fn display_name(self, name: impl Into<String>) -> Self {
        self.with_trait(Trait::display_name(name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trait_set(&self) -> &TraitSet {
        &self.traits
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }

    pub fn is_parameterized(&self) -> bool {
        matches!(self.body, TestBody::Parameterized(_))
    }

    /// Invocations this test expands to (1 for a plain test)
    pub fn case_count(&self) -> usize {
        match &self.body {
            TestBody::Plain(_) => 1,
            TestBody::Parameterized(source) => source.len(),
        }
    }

    pub(crate) fn body(&self) -> &TestBody {
        &self.body
    }
}

impl Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("name", &self.name)
            .field("traits", &self.traits)
            .field("cases", &self.case_count())
            .field("location", &self.location)
            .finish()
    }
}

/// A named group of tests and nested groups.
#[derive(Debug)]
pub struct Group {
    name: String,
    traits: TraitSet,
    children: Vec<Unit>,
    location: SourceLocation,
}

impl Group {
    #[track_caller]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            traits: TraitSet::new(),
            children: Vec::new(),
            location: SourceLocation::caller(),
        }
    }

    pub fn with_trait(mut self, t: Trait) -> Self {
        self.traits.push(t);
        self
    }

    pub fn traits(mut self, traits: impl IntoIterator<Item = Trait>) -> Self {
        self.traits.extend(traits);
        self
    }

    pub fn display_name(self, name: impl Into<String>) -> Self {
        self.with_trait(Trait::display_name(name))
    }

    pub fn child(mut self, unit: impl Into<Unit>) -> Self {
        self.children.push(unit.into());
        self
    }

    pub fn children<I, U>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Unit>,
    {
        self.children.extend(units.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trait_set(&self) -> &TraitSet {
        &self.traits
    }

    pub fn units(&self) -> &[Unit] {
        &self.children
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }
}

/// Anything that can be registered.
#[derive(Debug)]
pub enum Unit {
    Test(Test),
    Group(Group),
}

impl Unit {
    pub fn name(&self) -> &str {
        match self {
            Unit::Test(test) => test.name(),
            Unit::Group(group) => group.name(),
        }
    }

    pub fn trait_set(&self) -> &TraitSet {
        match self {
            Unit::Test(test) => test.trait_set(),
            Unit::Group(group) => group.trait_set(),
        }
    }

    pub fn location(&self) -> SourceLocation {
        match self {
            Unit::Test(test) => test.location(),
            Unit::Group(group) => group.location(),
        }
    }

    /// Display name override, or the declared name
    pub fn display_name(&self) -> &str {
        self.trait_set().display_name().unwrap_or_else(|| self.name())
    }
}

impl From<Test> for Unit {
    fn from(test: Test) -> Self {
        Unit::Test(test)
    }
}

impl From<Group> for Unit {
    fn from(group: Group) -> Self {
        Unit::Group(group)
    }
}

/// Listing entry for a registered test, with inherited tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestInfo {
    pub id: UnitId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<UnitId>,
    pub display_name: String,
    pub tags: BTreeSet<Tag>,
    pub cases: usize,
    pub location: SourceLocation,
}

/// All declared units, in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    units: Vec<Unit>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a unit.
    ///
    /// Nothing is added when validation fails.
    pub fn register(&mut self, unit: impl Into<Unit>) -> RegistryResult<UnitId> {
        let unit = unit.into();
        let id = UnitId::root(unit.name());

        let mut seen: HashSet<UnitId> = self
            .units
            .iter()
            .map(|existing| UnitId::root(existing.name()))
            .collect();
        validate(&unit, &id, &mut seen)?;

        tracing::debug!(%id, "registered");
        self.units.push(unit);
        Ok(id)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Number of top-level units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Look up a unit by its full identifier.
    pub fn get(&self, id: &UnitId) -> Option<&Unit> {
        let mut segments = id.segments();
        let first = segments.next()?;
        let mut current = self.units.iter().find(|u| u.name() == first)?;
        for segment in segments {
            current = match current {
                Unit::Group(group) => group.units().iter().find(|u| u.name() == segment)?,
                Unit::Test(_) => return None,
            };
        }
        Some(current)
    }

    /// Every registered test, depth first, in declaration order.
    pub fn tests(&self) -> Vec<TestInfo> {
        let mut out = Vec::new();
        for unit in &self.units {
            collect_tests(unit, UnitId::root(unit.name()), &BTreeSet::new(), &mut out);
        }
        out
    }
}

fn collect_tests(unit: &Unit, id: UnitId, inherited: &BTreeSet<Tag>, out: &mut Vec<TestInfo>) {
    let mut tags = inherited.clone();
    tags.extend(unit.trait_set().tags());

    match unit {
        Unit::Test(test) => out.push(TestInfo {
            parent: id.parent(),
            display_name: unit.display_name().to_string(),
            tags,
            cases: test.case_count(),
            location: test.location(),
            id,
        }),
        Unit::Group(group) => {
            for child in group.units() {
                collect_tests(child, id.child(child.name()), &tags, out);
            }
        }
    }
}

fn validate(unit: &Unit, id: &UnitId, seen: &mut HashSet<UnitId>) -> RegistryResult<()> {
    let name = unit.name();
    if name.is_empty() {
        return Err(ConfigurationError::invalid_name(
            name,
            "names must not be empty",
            unit.location(),
        ));
    }
    if name.contains(UnitId::SEPARATOR) {
        return Err(ConfigurationError::invalid_name(
            name,
            "names must not contain '/'",
            unit.location(),
        ));
    }
    if !seen.insert(id.clone()) {
        return Err(ConfigurationError::duplicate(id.clone(), unit.location()));
    }
    if unit.trait_set().time_limit() == Some(Duration::ZERO) {
        return Err(ConfigurationError::InvalidTimeLimit { id: id.clone() });
    }

    match unit {
        Unit::Test(test) => {
            if let TestBody::Parameterized(source) = test.body() {
                match case_count(source.sizes(), source.strategy()) {
                    Some(0) => return Err(ConfigurationError::EmptyArguments { id: id.clone() }),
                    Some(_) => {}
                    None => {
                        let reason = if source.sizes().is_empty() {
                            "no argument sources"
                        } else {
                            "argument product overflows"
                        };
                        return Err(ConfigurationError::MalformedArguments {
                            id: id.clone(),
                            reason: reason.to_string(),
                        });
                    }
                }
            }
            Ok(())
        }
        Unit::Group(group) => {
            let mut children = HashSet::new();
            for child in group.units() {
                validate(child, &id.child(child.name()), &mut children)?;
            }
            Ok(())
        }
    }
}
