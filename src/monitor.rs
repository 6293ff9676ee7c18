use crate::error::StepError;
use crate::step::{Step, StepResult};
use async_trait::async_trait;

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Wraps a step with callbacks that see its input, its output, or its error.
///
/// Callbacks only observe. The inner result is returned unchanged.
pub struct Monitor<S: Step> {
    inner: S,
    before: Option<Callback<S::Input>>,
    after: Option<Callback<S::Output>>,
    on_error: Option<Callback<StepError>>,
}

impl<S: Step> Monitor<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            before: None,
            after: None,
            on_error: None,
        }
    }

    /// Called with the input before the inner step runs.
    pub fn before(mut self, cb: impl Fn(&S::Input) + Send + Sync + 'static) -> Self {
        self.before = Some(Box::new(cb));
        self
    }

    /// Called with the output after the inner step succeeds.
    pub fn after(mut self, cb: impl Fn(&S::Output) + Send + Sync + 'static) -> Self {
        self.after = Some(Box::new(cb));
        self
    }

    /// Called with the error when the inner step fails.
    pub fn on_error(mut self, cb: impl Fn(&StepError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(cb));
        self
    }
}

#[async_trait]
impl<S: Step> Step for Monitor<S> {
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: S::Input) -> StepResult<S::Output> {
        if let Some(cb) = &self.before {
            cb(&input);
        }

        let result = self.inner.run(input).await;

        match &result {
            Ok(output) => {
                if let Some(cb) = &self.after {
                    cb(output);
                }
            }
            Err(err) => {
                if let Some(cb) = &self.on_error {
                    cb(err);
                }
            }
        }
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
