/// Error types for declaration and test execution
use crate::issue::{IssueKind, SourceLocation};
use crate::registry::UnitId;
use thiserror::Error;

pub type RegistryResult<T> = Result<T, ConfigurationError>;

/// Problems with how tests were declared. Raised at registration, before
/// anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Duplicate identifier '{id}' declared at {location}")]
    DuplicateIdentifier { id: UnitId, location: SourceLocation },

    #[error("Invalid name '{name}' at {location}: {reason}")]
    InvalidName {
        name: String,
        reason: &'static str,
        location: SourceLocation,
    },

    #[error("Parameterized test '{id}' expands to no cases")]
    EmptyArguments { id: UnitId },

    #[error("Malformed arguments for '{id}': {reason}")]
    MalformedArguments { id: UnitId, reason: String },

    #[error("Time limit on '{id}' must be greater than zero")]
    InvalidTimeLimit { id: UnitId },
}

impl ConfigurationError {
    pub fn duplicate(id: UnitId, location: SourceLocation) -> Self {
        Self::DuplicateIdentifier { id, location }
    }

    pub fn invalid_name(name: impl Into<String>, reason: &'static str, location: SourceLocation) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason,
            location,
        }
    }
}

/// Returned by fatal expectations (`require`, `require_throws`,
/// `confirmation`) to abort the current invocation.
///
/// The matching issue is already recorded when this is created, so the
/// runner ignores it when it comes back out of a test body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message} ({location})")]
pub struct ExpectationFailed {
    pub kind: IssueKind,
    pub message: String,
    pub location: SourceLocation,
}
