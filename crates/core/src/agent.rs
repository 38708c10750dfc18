mod builder;
mod error;
mod state;

use std::time::Duration;

use stepwise_model::ResponseFormat;

use crate::model_client::ModelClient;
use crate::step::Step;
use crate::tool::{Registry, ToolDescriptor};
use crate::transcript::Transcript;
pub use builder::{AgentBuilder, TOOLS_PLACEHOLDER};
pub use error::AgentError;
pub use state::Stage;

/// Completions allowed per query unless configured otherwise.
pub const DEFAULT_MAX_STEPS: usize = 25;

/// How long transient provider errors are retried by default.
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(60);

/// What the agent does when the model calls a tool that isn't registered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UnknownToolPolicy {
    /// Ignores the action and asks the model for the next step.
    Skip,
    /// Appends an observation explaining that the tool doesn't exist.
    Observe,
    /// Ends the query with [`AgentError::UnknownTool`].
    #[default]
    FailTurn,
}

/// The outcome of a submitted line of user input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// The model finished the query with this answer.
    Result(String),
    /// The user asked to end the session.
    Exit,
}

/// Returns `true` if `input` is one of the words that end a session.
pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim();
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

/// An agent session: one transcript, one model, one set of tools.
///
/// The agent owns its transcript exclusively and takes `&mut self` for
/// every query, so steps are strictly serialized: the next completion is
/// never requested before the previous observation has been appended.
pub struct Agent {
    model_client: ModelClient,
    registry: Registry,
    transcript: Transcript,
    stage: Stage,
    max_steps: usize,
    unknown_tool_policy: UnknownToolPolicy,
    response_format: ResponseFormat,
    on_step: Option<Box<dyn Fn(&Step) + Send + Sync>>,
}

impl Agent {
    /// Handles one line of user input.
    ///
    /// Exit words end the session without contacting the model. Anything
    /// else is sent as a query and driven through the step loop until the
    /// model produces a result.
    ///
    /// A failed query leaves the session usable; only an exit ends it.
    pub async fn submit(&mut self, input: &str) -> Result<Reply, AgentError> {
        if self.stage == Stage::Ended {
            return Err(AgentError::SessionEnded);
        }
        if is_exit_command(input) {
            debug!("session ended by user");
            self.stage = Stage::Ended;
            return Ok(Reply::Exit);
        }

        let result = self.run_query(input).await;
        self.stage = Stage::AwaitingUserInput;
        result.map(Reply::Result)
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn history(&self) -> &Transcript {
        &self.transcript
    }

    /// Returns what the agent is currently doing.
    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the tools available to the model.
    #[inline]
    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.registry.list()
    }
}
