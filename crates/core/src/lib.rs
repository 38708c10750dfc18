//! Core logic of a step-by-step agent: the step parser, the transcript,
//! the tool registry, and the agent loop that ties them together.
//!
//! The model is asked to answer with one JSON step at a time (`start`,
//! `plan`, `action`, `result`). Actions are dispatched to registered tools
//! and their output is fed back as `observe` steps until the model
//! produces a result.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
mod model_client;
pub mod step;
pub mod tool;
pub mod transcript;

pub use agent::{
    Agent, AgentBuilder, AgentError, DEFAULT_MAX_STEPS, DEFAULT_RETRY_WINDOW,
    Reply, Stage, TOOLS_PLACEHOLDER, UnknownToolPolicy, is_exit_command,
};
pub use step::{Action, Step, StepError, StepKind};
pub use transcript::{Role, Transcript, Turn};
