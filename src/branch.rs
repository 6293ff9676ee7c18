use crate::error::StepError;
use crate::step::{Step, StepResult};
use async_trait::async_trait;

/// A step that may or may not have been supplied when the pipeline was built.
///
/// The decision is made once, at construction. Running an absent step fails
/// with [`StepError::StepAbsent`].
pub struct OptionalStep<S> {
    inner: Option<S>,
}

impl<S: Step> OptionalStep<S> {
    pub fn new(inner: Option<S>) -> Self {
        Self { inner }
    }

    /// Build the step only if `cond` holds.
    pub fn when(cond: bool, build: impl FnOnce() -> S) -> Self {
        Self {
            inner: cond.then(build),
        }
    }

    pub fn is_present(&self) -> bool {
        self.inner.is_some()
    }
}

#[async_trait]
impl<S: Step> Step for OptionalStep<S> {
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: S::Input) -> StepResult<S::Output> {
        match &self.inner {
            Some(step) => step.run(input).await,
            None => Err(StepError::StepAbsent),
        }
    }

    fn name(&self) -> &str {
        self.inner.as_ref().map_or("optional(absent)", |s| s.name())
    }
}

enum Branch<A, B> {
    First(A),
    Second(B),
    Neither,
}

/// One of two differently typed steps with the same contract, picked once at
/// construction.
pub struct EitherStep<A, B> {
    branch: Branch<A, B>,
}

impl<A, B> EitherStep<A, B>
where
    A: Step,
    B: Step<Input = A::Input, Output = A::Output>,
{
    /// Pick `first` when `cond` holds, `second` otherwise. Only the chosen
    /// builder is called.
    pub fn select(cond: bool, first: impl FnOnce() -> A, second: impl FnOnce() -> B) -> Self {
        if cond {
            Self::first(first())
        } else {
            Self::second(second())
        }
    }

    pub fn first(step: A) -> Self {
        Self {
            branch: Branch::First(step),
        }
    }

    pub fn second(step: B) -> Self {
        Self {
            branch: Branch::Second(step),
        }
    }

    /// An either step with no branch. Running it fails with
    /// [`StepError::NoStepAvailable`].
    pub fn neither() -> Self {
        Self {
            branch: Branch::Neither,
        }
    }

    pub fn is_first(&self) -> bool {
        matches!(self.branch, Branch::First(_))
    }
}

impl<A, B> Default for EitherStep<A, B>
where
    A: Step,
    B: Step<Input = A::Input, Output = A::Output>,
{
    fn default() -> Self {
        Self::neither()
    }
}

#[async_trait]
impl<A, B> Step for EitherStep<A, B>
where
    A: Step,
    B: Step<Input = A::Input, Output = A::Output>,
{
    type Input = A::Input;
    type Output = A::Output;

    async fn run(&self, input: A::Input) -> StepResult<A::Output> {
        match &self.branch {
            Branch::First(step) => step.run(input).await,
            Branch::Second(step) => step.run(input).await,
            Branch::Neither => Err(StepError::NoStepAvailable),
        }
    }

    fn name(&self) -> &str {
        match &self.branch {
            Branch::First(step) => step.name(),
            Branch::Second(step) => step.name(),
            Branch::Neither => "either(neither)",
        }
    }
}
