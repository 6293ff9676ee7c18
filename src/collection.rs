use crate::step::{Step, StepResult};
use async_trait::async_trait;
use std::marker::PhantomData;

/// Transforms every element of a `Vec` with a step built for that element.
///
/// Elements are processed one at a time, in order, and the output keeps the
/// input order. The first failure aborts the whole map.
pub struct Map<E, F> {
    build: F,
    _element: PhantomData<fn(E)>,
}

impl<E, F, S> Map<E, F>
where
    E: Send + Sync + 'static,
    F: Fn(&E, usize) -> S + Send + Sync,
    S: Step<Input = E>,
{
    pub fn new(build: F) -> Self {
        Self {
            build,
            _element: PhantomData,
        }
    }
}

#[async_trait]
impl<E, F, S> Step for Map<E, F>
where
    E: Send + Sync + 'static,
    F: Fn(&E, usize) -> S + Send + Sync,
    S: Step<Input = E>,
{
    type Input = Vec<E>;
    type Output = Vec<S::Output>;

    async fn run(&self, input: Vec<E>) -> StepResult<Vec<S::Output>> {
        let mut out = Vec::with_capacity(input.len());
        for (index, element) in input.into_iter().enumerate() {
            let step = (self.build)(&element, index);
            out.push(step.run(element).await?);
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "map"
    }
}

/// Folds a `Vec` into an accumulator, one element at a time.
///
/// For each element a step is built from `(element, index)` and run with the
/// current accumulator, so `[a, b, c]` from `init` gives
/// `f(f(f(init, a, 0), b, 1), c, 2)`.
pub struct Reduce<E, R, F> {
    initial: R,
    build: F,
    _element: PhantomData<fn(E)>,
}

impl<E, R, F, S> Reduce<E, R, F>
where
    E: Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    F: Fn(&E, usize) -> S + Send + Sync,
    S: Step<Input = R, Output = R>,
{
    pub fn new(initial: R, build: F) -> Self {
        Self {
            initial,
            build,
            _element: PhantomData,
        }
    }
}

#[async_trait]
impl<E, R, F, S> Step for Reduce<E, R, F>
where
    E: Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    F: Fn(&E, usize) -> S + Send + Sync,
    S: Step<Input = R, Output = R>,
{
    type Input = Vec<E>;
    type Output = R;

    async fn run(&self, input: Vec<E>) -> StepResult<R> {
        let mut acc = self.initial.clone();
        for (index, element) in input.iter().enumerate() {
            acc = (self.build)(element, index).run(acc).await?;
        }
        Ok(acc)
    }

    fn name(&self) -> &str {
        "reduce"
    }
}

/// Concatenates strings with a fixed separator. Never fails.
#[derive(Debug, Clone, Default)]
pub struct Join {
    separator: String,
}

impl Join {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }
}

#[async_trait]
impl Step for Join {
    type Input = Vec<String>;
    type Output = String;

    async fn run(&self, input: Vec<String>) -> StepResult<String> {
        Ok(input.join(&self.separator))
    }

    fn name(&self) -> &str {
        "join"
    }
}
