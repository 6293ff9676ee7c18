use crate::error::StepError;
use crate::step::{BoxStep, Step, StepResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::Instrument;

/// Passed to the `on_finish` hook after each successful run.
pub struct RunEvent<'a> {
    pub agent: &'a str,
    pub invocation: u64,
    pub duration: Duration,
}

/// Passed to the `on_error` hook when a run fails.
pub struct ErrorEvent<'a> {
    pub agent: &'a str,
    pub invocation: u64,
    pub error: &'a StepError,
    pub duration: Duration,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent name is empty")]
    EmptyName,
    #[error("agent '{0}' has no body step")]
    MissingBody(String),
}

type RunHook = Box<dyn Fn(&RunEvent) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&ErrorEvent) + Send + Sync>;

// ---------------------------------------------------------------------------
// AgentBuilder
// ---------------------------------------------------------------------------

pub struct AgentBuilder<I, O> {
    name: String,
    body: Option<BoxStep<I, O>>,
    on_finish: Option<RunHook>,
    on_error: Option<ErrorHook>,
}

impl<I: Send + 'static, O: Send + 'static> AgentBuilder<I, O> {
    /// The step graph every run delegates to. Built once, here.
    pub fn body<S>(mut self, step: S) -> Self
    where
        S: Step<Input = I, Output = O> + 'static,
    {
        self.body = Some(Box::new(step));
        self
    }

    /// Register a callback that fires after each successful run.
    pub fn on_finish(mut self, cb: impl Fn(&RunEvent) + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Box::new(cb));
        self
    }

    /// Register a callback that fires when a run fails.
    pub fn on_error(mut self, cb: impl Fn(&ErrorEvent) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(cb));
        self
    }

    /// Set both hooks to log runs and failures through `tracing`.
    pub fn with_tracing(self) -> Self {
        self.on_finish(|e| {
            tracing::info!(
                agent = e.agent,
                invocation = e.invocation,
                secs = e.duration.as_secs_f64(),
                "agent run finished"
            );
        })
        .on_error(|e| {
            tracing::warn!(
                agent = e.agent,
                invocation = e.invocation,
                error = %e.error,
                "agent run failed"
            );
        })
    }

    pub fn build(self) -> Result<Agent<I, O>, AgentError> {
        if self.name.trim().is_empty() {
            return Err(AgentError::EmptyName);
        }
        let body = self.body.ok_or_else(|| AgentError::MissingBody(self.name.clone()))?;

        Ok(Agent {
            name: self.name,
            body,
            invocations: AtomicU64::new(0),
            on_finish: self.on_finish,
            on_error: self.on_error,
        })
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// A named pipeline root.
///
/// The body is composed once when the agent is built and reused by every run.
/// State that should outlive a single run lives in [`State`](crate::State)
/// cells owned next to the agent, and reaches the body through relays.
///
/// An agent is itself a [`Step`], so agents nest inside other pipelines.
pub struct Agent<I, O> {
    name: String,
    body: BoxStep<I, O>,
    invocations: AtomicU64,
    on_finish: Option<RunHook>,
    on_error: Option<ErrorHook>,
}

impl<I: Send + 'static, O: Send + 'static> Agent<I, O> {
    pub fn builder(name: impl Into<String>) -> AgentBuilder<I, O> {
        AgentBuilder {
            name: name.into(),
            body: None,
            on_finish: None,
            on_error: None,
        }
    }

    /// Shorthand for a builder with only a body.
    pub fn new<S>(name: impl Into<String>, body: S) -> Result<Self, AgentError>
    where
        S: Step<Input = I, Output = O> + 'static,
    {
        Self::builder(name).body(body).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// How many runs have started on this instance.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<I: Send + 'static, O: Send + 'static> Step for Agent<I, O> {
    type Input = I;
    type Output = O;

    async fn run(&self, input: I) -> StepResult<O> {
        let invocation = self.invocations.fetch_add(1, Ordering::Relaxed) + 1;
        let span = tracing::debug_span!("agent", name = %self.name, invocation);

        let start = Instant::now();
        let result = self.body.run(input).instrument(span).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                if let Some(cb) = &self.on_finish {
                    cb(&RunEvent {
                        agent: &self.name,
                        invocation,
                        duration,
                    });
                }
            }
            Err(error) => {
                if let Some(cb) = &self.on_error {
                    cb(&ErrorEvent {
                        agent: &self.name,
                        invocation,
                        error,
                        duration,
                    });
                }
            }
        }
        result
    }

    fn name(&self) -> &str {
        &self.name
    }
}
