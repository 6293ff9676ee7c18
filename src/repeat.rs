use crate::error::StepError;
use crate::step::{Step, StepResult};
use async_trait::async_trait;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;

/// A loop with no termination check. Used as the `C` parameter of an
/// unbounded [`Loop`].
pub struct Never<T>(PhantomData<fn(T)>);

#[async_trait]
impl<T: Send + 'static> Step for Never<T> {
    type Input = T;
    type Output = bool;

    async fn run(&self, _input: T) -> StepResult<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "never"
    }
}

enum Mode<C> {
    Bounded { max: usize, until: C },
    Unbounded,
}

/// Repeatedly build a step from the current value and run it.
///
/// Bounded loops check `until` against every iteration's output and return
/// the first output it accepts. If `max` iterations pass without that, the
/// loop fails with [`StepError::ConditionNotMet`]. A failing `until` counts
/// as "not yet". A failing body ends the loop with the body's error.
///
/// Unbounded loops ([`Loop::forever`]) only end when the body fails or the
/// loop is cancelled.
pub struct Loop<T, F, C> {
    body: F,
    mode: Mode<C>,
    cancel: Option<CancellationToken>,
    _value: PhantomData<fn(T) -> T>,
}

impl<T, F, S, C> Loop<T, F, C>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> S + Send + Sync,
    S: Step<Input = T, Output = T>,
    C: Step<Input = T, Output = bool>,
{
    pub fn new(max: usize, body: F, until: C) -> Self {
        Self {
            body,
            mode: Mode::Bounded { max, until },
            cancel: None,
            _value: PhantomData,
        }
    }
}

impl<T, F, S> Loop<T, F, Never<T>>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> S + Send + Sync,
    S: Step<Input = T, Output = T>,
{
    pub fn forever(body: F) -> Self {
        Self {
            body,
            mode: Mode::Unbounded,
            cancel: None,
            _value: PhantomData,
        }
    }
}

impl<T, F, C> Loop<T, F, C> {
    /// Stop at the next iteration boundary once `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn check_cancelled(&self) -> StepResult<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(StepError::Cancelled),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<T, F, S, C> Step for Loop<T, F, C>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> S + Send + Sync,
    S: Step<Input = T, Output = T>,
    C: Step<Input = T, Output = bool>,
{
    type Input = T;
    type Output = T;

    async fn run(&self, input: T) -> StepResult<T> {
        let mut current = input;

        match &self.mode {
            Mode::Bounded { max, until } => {
                for iteration in 0..*max {
                    self.check_cancelled()?;

                    let output = (self.body)(&current).run(current).await?;
                    match until.run(output.clone()).await {
                        Ok(true) => {
                            tracing::trace!(iteration, "loop condition met");
                            return Ok(output);
                        }
                        Ok(false) => {}
                        Err(err) => {
                            tracing::debug!(iteration, error = %err, "loop condition check failed");
                        }
                    }
                    current = output;
                }

                tracing::debug!(max = *max, "loop exhausted");
                Err(StepError::ConditionNotMet { iterations: *max })
            }
            Mode::Unbounded => {
                let mut iteration: u64 = 0;
                loop {
                    self.check_cancelled()?;
                    tokio::task::yield_now().await;

                    current = (self.body)(&current).run(current).await?;
                    tracing::trace!(iteration, "loop iteration finished");
                    iteration += 1;
                }
            }
        }
    }

    fn name(&self) -> &str {
        "loop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepFn;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Increment {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Step for Increment {
        type Input = i32;
        type Output = i32;

        async fn run(&self, input: i32) -> StepResult<i32> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(input + 1)
        }
    }

    fn increment(runs: Arc<AtomicUsize>) -> impl Fn(&i32) -> Increment + Send + Sync {
        move |_current: &i32| Increment {
            runs: Arc::clone(&runs),
        }
    }

    fn at_least(n: i32) -> impl Step<Input = i32, Output = bool> {
        StepFn::new(move |x: i32| async move { Ok(x >= n) })
    }

    // --- bounded ---

    #[tokio::test]
    async fn returns_first_output_that_meets_condition() {
        let runs = Arc::new(AtomicUsize::new(0));
        let looped = Loop::new(10, increment(Arc::clone(&runs)), at_least(3));

        assert_eq!(looped.run(0).await.unwrap(), 3);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_after_exactly_max_iterations() {
        let runs = Arc::new(AtomicUsize::new(0));
        let looped = Loop::new(4, increment(Arc::clone(&runs)), at_least(100));

        let err = looped.run(0).await.unwrap_err();
        assert!(matches!(err, StepError::ConditionNotMet { iterations: 4 }));
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn zero_max_never_runs_body() {
        let runs = Arc::new(AtomicUsize::new(0));
        let looped = Loop::new(0, increment(Arc::clone(&runs)), at_least(0));

        let err = looped.run(0).await.unwrap_err();
        assert!(matches!(err, StepError::ConditionNotMet { iterations: 0 }));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn body_is_built_from_current_value() {
        let looped = Loop::new(
            5,
            |current: &i32| {
                let step_by = *current + 1;
                StepFn::new(move |x: i32| async move { Ok(x + step_by) })
            },
            at_least(7),
        );
        // 1 -> 3 -> 7
        assert_eq!(looped.run(1).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn body_failure_propagates_immediately() {
        let checks = Arc::new(AtomicUsize::new(0));
        let checks_clone = Arc::clone(&checks);
        let looped = Loop::new(
            5,
            |_: &i32| StepFn::new(|_: i32| async { Err::<i32, _>(StepError::transient("model down")) }),
            StepFn::new(move |_: i32| {
                checks_clone.fetch_add(1, Ordering::SeqCst);
                async { Ok(true) }
            }),
        );

        let err = looped.run(0).await.unwrap_err();
        assert!(matches!(err, StepError::Transient(msg) if msg == "model down"));
        assert_eq!(checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_condition_counts_as_not_met() {
        let runs = Arc::new(AtomicUsize::new(0));
        let looped = Loop::new(
            3,
            increment(Arc::clone(&runs)),
            StepFn::new(|_: i32| async { Err::<bool, _>(StepError::other("judge unavailable")) }),
        );

        let err = looped.run(0).await.unwrap_err();
        assert!(matches!(err, StepError::ConditionNotMet { iterations: 3 }));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancelled_token_stops_bounded_loop() {
        let token = CancellationToken::new();
        token.cancel();
        let runs = Arc::new(AtomicUsize::new(0));
        let looped = Loop::new(3, increment(Arc::clone(&runs)), at_least(100)).cancel_on(token);

        let err = looped.run(0).await.unwrap_err();
        assert!(matches!(err, StepError::Cancelled));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    // --- unbounded ---

    #[tokio::test]
    async fn forever_ends_on_body_failure() {
        let looped = Loop::forever(|current: &i32| {
            let fail = *current >= 5;
            StepFn::new(move |x: i32| async move {
                if fail {
                    Err(StepError::failed(format!("stopped at {x}")))
                } else {
                    Ok(x + 1)
                }
            })
        });

        let err = looped.run(0).await.unwrap_err();
        assert!(matches!(err, StepError::Failed(msg) if msg == "stopped at 5"));
    }

    #[tokio::test]
    async fn forever_observes_cancellation() {
        let token = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let looped = Arc::new(
            Loop::forever(increment(Arc::clone(&runs))).cancel_on(token.clone()),
        );

        let handle = tokio::spawn({
            let looped = Arc::clone(&looped);
            async move { looped.run(0).await }
        });

        while runs.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        token.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, StepError::Cancelled));
    }

    #[tokio::test]
    async fn forever_stops_when_dropped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let looped = Loop::forever(increment(Arc::clone(&runs)));

        let outcome = tokio::time::timeout(Duration::from_millis(20), looped.run(0)).await;
        assert!(outcome.is_err());

        let seen = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), seen);
    }
}
