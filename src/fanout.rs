use crate::error::StepError;
use crate::step::{SharedStep, Step, StepResult};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

fn spawn_all<I, O>(members: &[SharedStep<I, O>], input: &I) -> JoinSet<StepResult<O>>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    let mut set = JoinSet::new();
    for member in members {
        let member = Arc::clone(member);
        let input = input.clone();
        set.spawn(async move { member.run(input).await });
    }
    set
}

// ---------------------------------------------------------------------------
// Parallel
// ---------------------------------------------------------------------------

/// Runs every member concurrently on the same input and collects the
/// successes in completion order.
///
/// Partial failure is tolerated: the step succeeds when at least one member
/// does. When all members fail it returns [`StepError::AllFailed`] with one
/// error per member. With no members it returns [`StepError::NoResults`].
///
/// Member tasks live inside this call. Dropping the returned future aborts
/// whatever is still running.
pub struct Parallel<I, O> {
    members: Vec<SharedStep<I, O>>,
}

impl<I, O> Parallel<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    pub fn member<S>(mut self, step: S) -> Self
    where
        S: Step<Input = I, Output = O> + 'static,
    {
        self.members.push(Arc::new(step));
        self
    }

    pub fn members(mut self, steps: impl IntoIterator<Item = SharedStep<I, O>>) -> Self {
        self.members.extend(steps);
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<I, O> Default for Parallel<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I, O> Step for Parallel<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = Vec<O>;

    async fn run(&self, input: I) -> StepResult<Vec<O>> {
        if self.members.is_empty() {
            return Err(StepError::NoResults);
        }

        let mut set = spawn_all(&self.members, &input);
        let mut results = Vec::with_capacity(self.members.len());
        let mut errors = Vec::new();

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(value)) => results.push(value),
                Ok(Err(err)) => {
                    tracing::trace!(error = %err, "parallel member failed");
                    errors.push(err);
                }
                Err(join_err) => {
                    tracing::warn!(error = %join_err, "parallel member task did not complete");
                    errors.push(join_err.into());
                }
            }
        }

        if results.is_empty() {
            tracing::debug!(failures = errors.len(), "all parallel members failed");
            return Err(StepError::AllFailed(errors));
        }
        Ok(results)
    }

    fn name(&self) -> &str {
        "parallel"
    }
}

// ---------------------------------------------------------------------------
// Race
// ---------------------------------------------------------------------------

/// Runs every racer concurrently on the same input and returns the first
/// success. The losers are aborted, and their teardown is awaited before
/// `run` returns.
///
/// Racer failures are ignored until every racer has failed, which yields
/// [`StepError::NoSuccessfulResults`]. That includes racers failing with their
/// own [`StepError::Timeout`].
///
/// [`with_timeout`](Race::with_timeout) adds a [`Timeout`] racer that bounds
/// the race as a whole: when it fires first the race fails with its error at
/// the deadline. It can never win, so a race whose other racers all fail
/// early still ends with the timeout once it elapses.
pub struct Race<I, O> {
    racers: Vec<SharedStep<I, O>>,
    deadline: Option<Timeout<I, O>>,
}

impl<I, O> Race<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            racers: Vec::new(),
            deadline: None,
        }
    }

    pub fn racer<S>(mut self, step: S) -> Self
    where
        S: Step<Input = I, Output = O> + 'static,
    {
        self.racers.push(Arc::new(step));
        self
    }

    pub fn racers(mut self, steps: impl IntoIterator<Item = SharedStep<I, O>>) -> Self {
        self.racers.extend(steps);
        self
    }

    /// Add a [`Timeout`] racer, bounding the whole race by `deadline`.
    /// Calling it again replaces the previous deadline.
    pub fn with_timeout(mut self, deadline: Duration) -> Self {
        self.deadline = Some(Timeout::new(deadline));
        self
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline.as_ref().map(Timeout::deadline)
    }

    /// Number of racers, not counting the deadline.
    pub fn len(&self) -> usize {
        self.racers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.racers.is_empty()
    }
}

impl<I, O> Default for Race<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I, O> Step for Race<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn run(&self, input: I) -> StepResult<O> {
        let mut set = spawn_all(&self.racers, &input);

        let outcome = match &self.deadline {
            None => first_success(&mut set).await,
            Some(timeout) => {
                let mut expiry = timeout.run(input);
                let settled = tokio::select! {
                    outcome = first_success(&mut set) => Some(outcome),
                    _ = &mut expiry => None,
                };
                match settled {
                    Some(Ok(value)) => Ok(value),
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "every racer failed before the deadline");
                        expiry.await
                    }
                    None => {
                        let deadline = timeout.deadline();
                        tracing::debug!(?deadline, remaining = set.len(), "race deadline elapsed");
                        Err(StepError::Timeout(deadline))
                    }
                }
            }
        };

        if !set.is_empty() {
            tracing::debug!(remaining = set.len(), "cancelling remaining racers");
            set.shutdown().await;
        }
        outcome
    }

    fn name(&self) -> &str {
        "race"
    }
}

async fn first_success<O>(set: &mut JoinSet<StepResult<O>>) -> StepResult<O>
where
    O: Send + 'static,
{
    let mut errors = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                tracing::trace!(error = %err, "racer failed");
                errors.push(err);
            }
            Err(join_err) => {
                tracing::warn!(error = %join_err, "racer task did not complete");
                errors.push(join_err.into());
            }
        }
    }
    Err(StepError::NoSuccessfulResults(errors))
}

// ---------------------------------------------------------------------------
// Timeout
// ---------------------------------------------------------------------------

/// A step that never produces a value: it waits for its deadline, then fails
/// with [`StepError::Timeout`]. Meant to be one racer in a [`Race`].
pub struct Timeout<I, O> {
    deadline: Duration,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> Timeout<I, O> {
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            _types: PhantomData,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

#[async_trait]
impl<I, O> Step for Timeout<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn run(&self, _input: I) -> StepResult<O> {
        tokio::time::sleep(self.deadline).await;
        Err(StepError::Timeout(self.deadline))
    }

    fn name(&self) -> &str {
        "timeout"
    }
}
