//! Typed async steps and the combinators that compose them into agent
//! pipelines.
//!
//! A [`Step`] takes one input and asynchronously produces one output or a
//! [`StepError`]. Pipelines are built once out of steps with [`Chain`]
//! (`.then()` / [`chain!`]), branch at build time with [`OptionalStep`] and
//! [`EitherStep`], repeat with [`Loop`], fan out with [`Parallel`] and
//! [`Race`], and walk collections with [`Map`], [`Reduce`] and [`Join`].
//! State that outlives one run sits in a [`State`] cell and reaches steps
//! through [`Relay`]s. An [`Agent`] gives a pipeline a name and run hooks.
//!
//! # Quick start
//!
//! ```rust
//! use agent_pipe::{Agent, State, Step, StepExt, StepFn};
//!
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let history = State::new(Vec::<String>::new());
//! let log = history.relay();
//!
//! let agent = Agent::new(
//!     "greeter",
//!     StepFn::new(|name: String| async move { Ok(format!("hello, {name}")) })
//!         .then(StepFn::new(move |greeting: String| {
//!             let log = log.clone();
//!             async move {
//!                 log.update(|h| h.push(greeting.clone()));
//!                 Ok(greeting)
//!             }
//!         })),
//! )
//! .unwrap();
//!
//! assert_eq!(agent.run("ada".into()).await.unwrap(), "hello, ada");
//! agent.run("grace".into()).await.unwrap();
//! assert_eq!(history.get().len(), 2);
//! # });
//! ```

mod agent;
mod branch;
mod chain;
mod collection;
mod error;
mod fanout;
mod monitor;
mod repeat;
mod state;
mod step;
pub mod tools;

pub use agent::{Agent, AgentBuilder, AgentError, ErrorEvent, RunEvent};
pub use branch::{EitherStep, OptionalStep};
pub use chain::{Chain, Identity};
pub use collection::{Join, Map, Reduce};
pub use error::{StepError, ToolError};
pub use fanout::{Parallel, Race, Timeout};
pub use monitor::Monitor;
pub use repeat::{Loop, Never};
pub use state::{Relay, State};
pub use step::{BoxStep, SharedStep, Step, StepExt, StepFn, StepResult};
pub use tools::{Tool, ToolBox, ToolBoxBuilder, ToolBoxError, ToolCall, ToolSpec};

pub use tokio_util::sync::CancellationToken;
