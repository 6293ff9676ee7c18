use std::time::Duration;
use thiserror::Error;

/// Error type shared by every step, with variants designed around what the
/// caller can do about them.
#[derive(Debug, Error)]
pub enum StepError {
    /// Bad input or step logic error. Don't retry, fix the code.
    #[error("invalid: {0}")]
    Invalid(String),
    /// Transient failure (network, rate limit). Retrying might help.
    #[error("transient: {0}")]
    Transient(String),
    /// A step decided to fail explicitly.
    #[error("failed: {0}")]
    Failed(String),
    /// Everything else. Inspect the message for details.
    #[error("{0}")]
    Other(String),

    /// An [`OptionalStep`](crate::OptionalStep) was built without a step.
    #[error("optional step is absent")]
    StepAbsent,
    /// An [`EitherStep`](crate::EitherStep) was built with neither branch.
    #[error("no step available in either branch")]
    NoStepAvailable,
    /// A bounded [`Loop`](crate::Loop) ran out of iterations.
    #[error("loop condition not met after {iterations} iterations")]
    ConditionNotMet { iterations: usize },

    /// Every member of a [`Parallel`](crate::Parallel) failed.
    #[error("all {} parallel members failed: {}", .0.len(), join_errors(.0))]
    AllFailed(Vec<StepError>),
    /// A [`Parallel`](crate::Parallel) had no members to run.
    #[error("parallel step produced no results")]
    NoResults,
    /// Every racer of a [`Race`](crate::Race) failed.
    #[error("race produced no successful results ({} failures)", .0.len())]
    NoSuccessfulResults(Vec<StepError>),

    /// A deadline elapsed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// Cancellation was observed at a suspension point.
    #[error("cancelled")]
    Cancelled,
    /// A spawned member task panicked or was torn down.
    #[error("task failed: {0}")]
    Task(String),
}

fn join_errors(errors: &[StepError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<std::io::Error> for StepError {
    fn from(e: std::io::Error) -> Self {
        StepError::Other(e.to_string())
    }
}

impl From<serde_json::Error> for StepError {
    fn from(e: serde_json::Error) -> Self {
        StepError::Invalid(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StepError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            StepError::Cancelled
        } else {
            StepError::Task(e.to_string())
        }
    }
}

impl StepError {
    /// Create an [`Invalid`](StepError::Invalid) error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        StepError::Invalid(msg.into())
    }

    /// Create an [`Other`](StepError::Other) error.
    pub fn other(msg: impl Into<String>) -> Self {
        StepError::Other(msg.into())
    }

    /// Create a [`Transient`](StepError::Transient) error.
    pub fn transient(msg: impl Into<String>) -> Self {
        StepError::Transient(msg.into())
    }

    /// Create a [`Failed`](StepError::Failed) error.
    pub fn failed(msg: impl Into<String>) -> Self {
        StepError::Failed(msg.into())
    }

    /// Whether a caller-supplied retry loop could reasonably try again.
    /// The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StepError::Transient(_) | StepError::Timeout(_))
    }

    /// The underlying errors of an aggregate failure, empty otherwise.
    pub fn causes(&self) -> &[StepError] {
        match self {
            StepError::AllFailed(errors) | StepError::NoSuccessfulResults(errors) => errors,
            _ => &[],
        }
    }
}

/// Failures at the tool invocation boundary. These are rendered into the
/// tool's string result instead of propagating.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("missing parameters: {0}")]
    MissingParameters(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<StepError> for ToolError {
    fn from(e: StepError) -> Self {
        ToolError::ExecutionFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- constructors ---

    #[test]
    fn invalid_constructor() {
        let err = StepError::invalid("bad input");
        assert!(matches!(err, StepError::Invalid(msg) if msg == "bad input"));
    }

    #[test]
    fn other_constructor() {
        let err = StepError::other("something");
        assert!(matches!(err, StepError::Other(msg) if msg == "something"));
    }

    #[test]
    fn transient_constructor() {
        let err = StepError::transient("rate limited");
        assert!(matches!(err, StepError::Transient(msg) if msg == "rate limited"));
    }

    // --- Display ---

    #[test]
    fn display_basic_variants() {
        assert_eq!(StepError::Invalid("bad".into()).to_string(), "invalid: bad");
        assert_eq!(StepError::Other("something".into()).to_string(), "something");
        assert_eq!(StepError::Transient("slow".into()).to_string(), "transient: slow");
        assert_eq!(StepError::Failed("nope".into()).to_string(), "failed: nope");
    }

    #[test]
    fn display_condition_not_met() {
        let err = StepError::ConditionNotMet { iterations: 3 };
        assert_eq!(err.to_string(), "loop condition not met after 3 iterations");
    }

    #[test]
    fn display_all_failed_lists_every_cause() {
        let err = StepError::AllFailed(vec![StepError::other("a"), StepError::failed("b")]);
        assert_eq!(err.to_string(), "all 2 parallel members failed: a; failed: b");
    }

    #[test]
    fn display_timeout() {
        let err = StepError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "timed out after 250ms");
    }

    // --- helpers ---

    #[test]
    fn retryable_only_for_transient_and_timeout() {
        assert!(StepError::transient("x").is_retryable());
        assert!(StepError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!StepError::invalid("x").is_retryable());
        assert!(!StepError::Cancelled.is_retryable());
    }

    #[test]
    fn causes_of_aggregates() {
        let err = StepError::NoSuccessfulResults(vec![StepError::other("a")]);
        assert_eq!(err.causes().len(), 1);
        assert!(StepError::NoResults.causes().is_empty());
    }

    // --- From conversions ---

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let step_err: StepError = io_err.into();
        assert!(matches!(step_err, StepError::Other(msg) if msg.contains("file missing")));
    }

    #[test]
    fn from_json_error_is_invalid() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let step_err: StepError = json_err.into();
        assert!(matches!(step_err, StepError::Invalid(_)));
    }

    #[test]
    fn step_error_becomes_tool_execution_failure() {
        let tool_err: ToolError = StepError::failed("disk full").into();
        assert_eq!(tool_err.to_string(), "execution failed: failed: disk full");
    }
}
