//! Attest Core - declare, select and run tests
//!
//! This library provides:
//! - Declarations: tests, parameterized tests and groups on an explicit registry
//! - Traits: tags, bugs, enable/disable conditions, time limits, serialization
//! - Argument expansion (single source, product, zip)
//! - An async runner with per-invocation tasks, time limits and filters
//! - Expectations: soft checks, requires, error expectations, confirmations,
//!   known issues
//!
//! ```
//! use attest_core::{Arguments, Group, Registry, Runner, Test, Trait};
//!
//! let mut registry = Registry::new();
//! registry
//!     .register(
//!         Group::new("ice_cream")
//!             .with_trait(Trait::tag("flavors"))
//!             .child(Test::parameterized(
//!                 "contains_no_nuts",
//!                 Arguments::new(["vanilla", "chocolate", "strawberry"]),
//!                 |cx, flavor| async move {
//!                     cx.check(!flavor.contains("nut"), format!("{flavor} has nuts"));
//!                     Ok(())
//!                 },
//!             )),
//!     )
//!     .unwrap();
//!
//! let report = Runner::new().run_blocking(&registry).unwrap();
//! assert!(report.is_success());
//! assert_eq!(report.summary().invocations, 3);
//! ```

/// Attest core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod arguments;
pub mod error;
pub mod expect;
pub mod issue;
pub mod registry;
pub mod report;
pub mod runner;
pub mod traits;

pub use arguments::{Arguments, Strategy};
pub use error::{ConfigurationError, ExpectationFailed, RegistryResult};
pub use expect::{Confirmation, ErrorMatcher, ExpectedCount, TestContext};
pub use issue::{Issue, IssueKind, KnownIssue, SourceLocation};
pub use registry::{BodyFuture, Group, Registry, Test, TestInfo, Unit, UnitId};
pub use report::{GroupReport, InvocationReport, RunReport, Status, Summary, TestReport, UnitReport};
pub use runner::{Filter, Runner};
pub use traits::{Bug, Condition, Enablement, Tag, Trait, TraitSet};
