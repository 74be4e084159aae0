//! Error expectations

use super::TestContext;
use crate::error::ExpectationFailed;
use crate::issue::{Issue, IssueKind, SourceLocation};
use std::fmt::{self, Debug, Display};
use std::future::Future;

type ErrorPredicate = Box<dyn Fn(&anyhow::Error) -> bool + Send + Sync>;

/// Describes which error an expectation accepts.
pub struct ErrorMatcher {
    description: String,
    predicate: ErrorPredicate,
}

impl ErrorMatcher {
    /// Accept any error.
    pub fn any() -> Self {
        Self {
            description: "any error".to_string(),
            predicate: Box::new(|_| true),
        }
    }

    /// Accept an error whose concrete type is `E`.
    pub fn of_type<E>() -> Self
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        Self {
            description: format!("an error of type {}", std::any::type_name::<E>()),
            predicate: Box::new(|error| error.downcast_ref::<E>().is_some()),
        }
    }

    /// Accept an error equal to `expected`.
    pub fn value<E>(expected: E) -> Self
    where
        E: PartialEq + Display + Debug + Send + Sync + 'static,
    {
        Self {
            description: format!("{:?}", expected),
            predicate: Box::new(move |error| error.downcast_ref::<E>() == Some(&expected)),
        }
    }

    /// Accept errors for which `predicate` returns true.
    pub fn matching<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Box::new(predicate),
        }
    }

    pub fn matches(&self, error: &anyhow::Error) -> bool {
        (self.predicate)(error)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for ErrorMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorMatcher")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Compare a body's outcome against `matcher`.
fn evaluate<T, E>(matcher: &ErrorMatcher, outcome: Result<T, E>) -> Result<anyhow::Error, String>
where
    E: Into<anyhow::Error>,
{
    match outcome {
        Ok(_) => Err(format!(
            "expected {} to be thrown, but no error was thrown",
            matcher.description()
        )),
        Err(error) => {
            let error = error.into();
            if matcher.matches(&error) {
                Ok(error)
            } else {
                Err(format!(
                    "expected {} to be thrown, but got {:?}",
                    matcher.description(),
                    error
                ))
            }
        }
    }
}

impl TestContext {
    /// Expect `body` to fail with an error accepted by `matcher`.
    ///
    /// A matching error is consumed and handed back. No error, or a
    /// different one, records a failure and returns `None`.
    #[track_caller]
    pub fn check_throws<T, E, F>(&self, matcher: ErrorMatcher, body: F) -> Option<anyhow::Error>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<anyhow::Error>,
    {
        let location = SourceLocation::caller();
        match evaluate(&matcher, body()) {
            Ok(error) => Some(error),
            Err(message) => {
                self.push_issue(Issue::new(
                    IssueKind::ErrorExpectation,
                    message,
                    Some(location),
                ));
                None
            }
        }
    }

    /// Like [`check_throws`](Self::check_throws) but aborts the invocation
    /// when the expectation is not met.
    #[track_caller]
    pub fn require_throws<T, E, F>(
        &self,
        matcher: ErrorMatcher,
        body: F,
    ) -> Result<anyhow::Error, ExpectationFailed>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<anyhow::Error>,
    {
        let location = SourceLocation::caller();
        evaluate(&matcher, body())
            .map_err(|message| self.fail(IssueKind::ErrorExpectation, message, location))
    }

    /// [`check_throws`](Self::check_throws) for a body that awaits.
    #[track_caller]
    pub fn check_throws_async<T, E, F, Fut>(
        &self,
        matcher: ErrorMatcher,
        body: F,
    ) -> impl Future<Output = Option<anyhow::Error>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        let location = SourceLocation::caller();
        let cx = self.clone();
        async move {
            match evaluate(&matcher, body().await) {
                Ok(error) => Some(error),
                Err(message) => {
                    cx.push_issue(Issue::new(
                        IssueKind::ErrorExpectation,
                        message,
                        Some(location),
                    ));
                    None
                }
            }
        }
    }

    /// [`require_throws`](Self::require_throws) for a body that awaits.
    #[track_caller]
    pub fn require_throws_async<T, E, F, Fut>(
        &self,
        matcher: ErrorMatcher,
        body: F,
    ) -> impl Future<Output = Result<anyhow::Error, ExpectationFailed>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        let location = SourceLocation::caller();
        let cx = self.clone();
        async move {
            evaluate(&matcher, body().await)
                .map_err(|message| cx.fail(IssueKind::ErrorExpectation, message, location))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::UnitId;
    use thiserror::Error;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    enum CalculationError {
        #[error("division by zero")]
        DivisionByZero,
        #[error("overflow")]
        Overflow,
    }

    #[derive(Debug, Error)]
    #[error("unrelated")]
    struct Unrelated;

    fn division(a: i32, b: i32) -> Result<i32, CalculationError> {
        if b == 0 {
            return Err(CalculationError::DivisionByZero);
        }
        Ok(a / b)
    }

    fn context() -> TestContext {
        TestContext::new(UnitId::root("throws"), None)
    }

    #[test]
    fn test_any_error_matches() {
        let cx = context();
        assert!(cx.check_throws(ErrorMatcher::any(), || division(1, 0)).is_some());
        assert_eq!(cx.issue_count(), 0);
    }

    #[test]
    fn test_exact_value_matches() {
        let cx = context();
        let error = cx
            .check_throws(ErrorMatcher::value(CalculationError::DivisionByZero), || {
                division(1, 0)
            })
            .unwrap();
        assert_eq!(error.to_string(), "division by zero");
        assert_eq!(cx.issue_count(), 0);
    }

    #[test]
    fn test_wrong_value_records_mismatch() {
        let cx = context();
        assert!(cx
            .check_throws(ErrorMatcher::value(CalculationError::Overflow), || {
                division(1, 0)
            })
            .is_none());
        let (issues, _) = cx.take_recorded();
        assert_eq!(issues[0].kind, IssueKind::ErrorExpectation);
        assert!(issues[0].message.contains("Overflow"));
        assert!(issues[0].message.contains("DivisionByZero"));
    }

    #[test]
    fn test_wrong_type_records_failure() {
        let cx = context();
        assert!(cx
            .check_throws(ErrorMatcher::of_type::<Unrelated>(), || division(1, 0))
            .is_none());
        assert_eq!(cx.issue_count(), 1);
    }

    #[test]
    fn test_no_error_records_failure() {
        let cx = context();
        assert!(cx.check_throws(ErrorMatcher::any(), || division(4, 2)).is_none());
        let (issues, _) = cx.take_recorded();
        assert_eq!(
            issues[0].message,
            "expected any error to be thrown, but no error was thrown"
        );
    }

    #[test]
    fn test_custom_predicate() {
        let cx = context();
        let matcher = ErrorMatcher::matching("division by zero", |error| {
            matches!(
                error.downcast_ref::<CalculationError>(),
                Some(CalculationError::DivisionByZero)
            )
        });
        assert!(cx.check_throws(matcher, || division(1, 0)).is_some());
    }

    async fn remote_division(a: i32, b: i32) -> Result<i32, CalculationError> {
        tokio::task::yield_now().await;
        division(a, b)
    }

    #[tokio::test]
    async fn test_async_error_expectations() {
        let cx = context();
        let error = cx
            .check_throws_async(ErrorMatcher::value(CalculationError::DivisionByZero), || {
                remote_division(1, 0)
            })
            .await;
        assert!(error.is_some());
        assert_eq!(cx.issue_count(), 0);

        assert!(cx
            .check_throws_async(ErrorMatcher::any(), || remote_division(4, 2))
            .await
            .is_none());
        let failed = cx
            .require_throws_async(ErrorMatcher::of_type::<Unrelated>(), || remote_division(1, 0))
            .await
            .unwrap_err();
        assert_eq!(failed.kind, IssueKind::ErrorExpectation);
        assert_eq!(cx.issue_count(), 2);
    }

    #[test]
    fn test_require_throws_aborts_without_error() {
        let cx = context();
        assert!(cx
            .require_throws(ErrorMatcher::of_type::<CalculationError>(), || division(1, 0))
            .is_ok());
        let failed = cx
            .require_throws(ErrorMatcher::any(), || division(9, 3))
            .unwrap_err();
        assert_eq!(failed.kind, IssueKind::ErrorExpectation);
        assert_eq!(cx.issue_count(), 1);
    }
}
