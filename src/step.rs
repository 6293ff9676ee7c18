use crate::chain::Chain;
use crate::error::StepError;
use crate::monitor::Monitor;
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// The result of running a step.
pub type StepResult<T> = Result<T, StepError>;

/// A type-erased, owned step.
pub type BoxStep<I, O> = Box<dyn Step<Input = I, Output = O>>;

/// A type-erased step that can be handed to several tasks at once.
pub type SharedStep<I, O> = Arc<dyn Step<Input = I, Output = O>>;

/// An async unit of work: one typed input in, one typed output (or an error) out.
///
/// Steps are built once and run many times. `run` borrows `self`, so the same
/// step may be driven repeatedly, and from several tasks concurrently when it
/// is a member of a [`Parallel`](crate::Parallel) or [`Race`](crate::Race).
#[async_trait]
pub trait Step: Send + Sync {
    type Input: Send;
    type Output: Send;

    /// Run the step once.
    async fn run(&self, input: Self::Input) -> StepResult<Self::Output>;

    /// A name for logs. Defaults to the type name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<S: Step + ?Sized> Step for Box<S> {
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: Self::Input) -> StepResult<Self::Output> {
        (**self).run(input).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<S: Step + ?Sized> Step for Arc<S> {
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: Self::Input) -> StepResult<Self::Output> {
        (**self).run(input).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A step made from an async closure.
pub struct StepFn<I, O, F> {
    f: F,
    name: &'static str,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O, F, Fut> StepFn<I, O, F>
where
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = StepResult<O>> + Send,
    I: Send,
    O: Send,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            name: "step_fn",
            _types: PhantomData,
        }
    }

    /// Give the step a name for logs.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl<I, O, F, Fut> Step for StepFn<I, O, F>
where
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = StepResult<O>> + Send,
    I: Send,
    O: Send,
{
    type Input = I;
    type Output = O;

    async fn run(&self, input: I) -> StepResult<O> {
        (self.f)(input).await
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Fluent composition, available on every [`Step`].
pub trait StepExt: Step + Sized {
    /// Feed this step's output into `next`.
    fn then<N>(self, next: N) -> Chain<Self, N>
    where
        N: Step<Input = Self::Output>,
    {
        Chain::new(self, next)
    }

    /// Wrap this step so callbacks can observe its input and output.
    fn monitor(self) -> Monitor<Self> {
        Monitor::new(self)
    }

    /// Log the input and output through `tracing` under `label`.
    fn print(self, label: &'static str) -> Monitor<Self>
    where
        Self::Input: Debug,
        Self::Output: Debug,
    {
        Monitor::new(self)
            .before(move |input| tracing::info!(step = label, ?input, "step input"))
            .after(move |output| tracing::info!(step = label, ?output, "step output"))
    }

    fn boxed(self) -> BoxStep<Self::Input, Self::Output>
    where
        Self: 'static,
    {
        Box::new(self)
    }

    fn shared(self) -> SharedStep<Self::Input, Self::Output>
    where
        Self: 'static,
    {
        Arc::new(self)
    }
}

impl<S: Step> StepExt for S {}
