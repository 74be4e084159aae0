//! Trait model - declarative metadata attached to tests and groups
//!
//! Traits are plain values composed at declaration time:
//!
//! ```
//! use attest_core::{Test, Trait};
//! use std::time::Duration;
//!
//! let test = Test::new("fetches_profile", |_cx| async { Ok(()) })
//!     .with_trait(Trait::tag("networking"))
//!     .with_trait(Trait::bug("https://github.com/example/issues/12"))
//!     .with_trait(Trait::time_limit(Duration::from_secs(60)));
//! ```
//!
//! Nothing is evaluated when a trait is attached. Enable/disable predicates
//! are stored and called by the runner right before the unit is scheduled.

use crate::issue::SourceLocation;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A tag used to select or exclude tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a bug tracker entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bug {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl fmt::Display for Bug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reference = match (&self.id, &self.url) {
            (Some(id), Some(url)) => format!("{} <{}>", id, url),
            (Some(id), None) => id.clone(),
            (None, Some(url)) => url.clone(),
            (None, None) => "unidentified bug".to_string(),
        };
        match &self.title {
            Some(title) => write!(f, "{} ({})", reference, title),
            None => f.write_str(&reference),
        }
    }
}

/// A lazily evaluated enable/disable predicate.
#[derive(Clone)]
pub struct Condition {
    predicate: Arc<dyn Fn() -> bool + Send + Sync>,
    comment: Option<String>,
    location: SourceLocation,
}

impl Condition {
    #[track_caller]
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            comment: None,
            location: SourceLocation::caller(),
        }
    }

    /// Call the predicate. Never cached.
    pub fn evaluate(&self) -> bool {
        (self.predicate)()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("comment", &self.comment)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Metadata attached to a test or group.
#[derive(Debug, Clone)]
pub enum Trait {
    Tag(Tag),
    Bug(Bug),
    /// Run only when the predicate holds
    EnabledIf(Condition),
    /// Skip when the predicate holds
    DisabledIf(Condition),
    /// Always skip
    Disabled { reason: Option<String> },
    /// Maximum wall-clock time for a single invocation
    TimeLimit(Duration),
    /// Run children (or argument cases) one at a time
    Serialized,
    /// Override the name shown in reports
    DisplayName(String),
}

impl Trait {
    pub fn tag(name: impl Into<Tag>) -> Self {
        Trait::Tag(name.into())
    }

    /// Several tags at once, for `Test::traits`.
    pub fn tags<I, T>(names: I) -> Vec<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        names.into_iter().map(Trait::tag).collect()
    }

    pub fn bug(url: impl Into<String>) -> Self {
        Trait::Bug(Bug {
            url: Some(url.into()),
            id: None,
            title: None,
        })
    }

    pub fn bug_id(id: impl Into<String>) -> Self {
        Trait::Bug(Bug {
            url: None,
            id: Some(id.into()),
            title: None,
        })
    }

    #[track_caller]
    pub fn enabled_if<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Trait::EnabledIf(Condition::new(predicate))
    }

    #[track_caller]
    pub fn disabled_if<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Trait::DisabledIf(Condition::new(predicate))
    }

    /// Unconditionally disable, explaining why.
    pub fn disabled(reason: impl Into<String>) -> Self {
        Trait::Disabled {
            reason: Some(reason.into()),
        }
    }

    pub fn time_limit(limit: Duration) -> Self {
        Trait::TimeLimit(limit)
    }

    pub fn serialized() -> Self {
        Trait::Serialized
    }

    pub fn display_name(name: impl Into<String>) -> Self {
        Trait::DisplayName(name.into())
    }

    /// Attach a human-readable comment.
    ///
    /// Becomes the skip reason for conditions and `Disabled`, and the title
    /// of a `Bug`. Other traits are returned unchanged.
    pub fn comment(self, text: impl Into<String>) -> Self {
        let text = text.into();
        match self {
            Trait::EnabledIf(mut condition) => {
                condition.comment = Some(text);
                Trait::EnabledIf(condition)
            }
            Trait::DisabledIf(mut condition) => {
                condition.comment = Some(text);
                Trait::DisabledIf(condition)
            }
            Trait::Disabled { .. } => Trait::Disabled { reason: Some(text) },
            Trait::Bug(mut bug) => {
                bug.title = Some(text);
                Trait::Bug(bug)
            }
            other => other,
        }
    }
}

/// Result of evaluating a unit's enable/disable traits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enablement {
    Enabled,
    Skipped { reason: String },
}

impl Enablement {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Enablement::Enabled)
    }
}

/// Ordered list of traits on one declaration.
#[derive(Debug, Clone, Default)]
pub struct TraitSet {
    traits: Vec<Trait>,
}

impl TraitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, t: Trait) {
        self.traits.push(t);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trait> {
        self.traits.iter()
    }

    pub fn len(&self) -> usize {
        self.traits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    pub fn tags(&self) -> BTreeSet<Tag> {
        self.traits
            .iter()
            .filter_map(|t| match t {
                Trait::Tag(tag) => Some(tag.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn bugs(&self) -> Vec<Bug> {
        self.traits
            .iter()
            .filter_map(|t| match t {
                Trait::Bug(bug) => Some(bug.clone()),
                _ => None,
            })
            .collect()
    }

    /// Most restrictive time limit declared here, if any.
    pub fn time_limit(&self) -> Option<Duration> {
        self.traits
            .iter()
            .filter_map(|t| match t {
                Trait::TimeLimit(limit) => Some(*limit),
                _ => None,
            })
            .min()
    }

    pub fn is_serialized(&self) -> bool {
        self.traits.iter().any(|t| matches!(t, Trait::Serialized))
    }

    /// Last declared display name wins.
    pub fn display_name(&self) -> Option<&str> {
        self.traits.iter().rev().find_map(|t| match t {
            Trait::DisplayName(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Evaluate enable/disable traits in declaration order.
    ///
    /// Any disabling trait that holds, or any `EnabledIf` that does not,
    /// skips the unit. Evaluation stops at the first trait that skips.
    pub fn evaluate(&self) -> Enablement {
        for t in &self.traits {
            match t {
                Trait::Disabled { reason } => {
                    return Enablement::Skipped {
                        reason: reason.clone().unwrap_or_else(|| "disabled".to_string()),
                    };
                }
                Trait::DisabledIf(condition) if condition.evaluate() => {
                    return Enablement::Skipped {
                        reason: condition.comment().map(str::to_string).unwrap_or_else(|| {
                            format!("disabled by condition at {}", condition.location())
                        }),
                    };
                }
                Trait::EnabledIf(condition) if !condition.evaluate() => {
                    return Enablement::Skipped {
                        reason: condition.comment().map(str::to_string).unwrap_or_else(|| {
                            format!("enabling condition at {} was false", condition.location())
                        }),
                    };
                }
                _ => {}
            }
        }
        Enablement::Enabled
    }
}

impl FromIterator<Trait> for TraitSet {
    fn from_iter<I: IntoIterator<Item = Trait>>(iter: I) -> Self {
        Self {
            traits: iter.into_iter().collect(),
        }
    }
}

impl Extend<Trait> for TraitSet {
    fn extend<I: IntoIterator<Item = Trait>>(&mut self, iter: I) {
        self.traits.extend(iter);
    }
}
