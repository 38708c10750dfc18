use std::fmt::{self, Display};

use stepwise_model::{ModelFinishReason, ModelRequest};

use super::{Agent, AgentError, UnknownToolPolicy};
use crate::step::{Action, Step, StepError};

/// The point of the step loop the agent is at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Idle, waiting for the next line of user input.
    #[default]
    AwaitingUserInput,
    /// Waiting for the model's next step.
    AwaitingModelStep,
    /// Running a tool the model asked for.
    Dispatching,
    /// The user ended the session.
    Ended,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::AwaitingUserInput => "awaiting user input",
            Stage::AwaitingModelStep => "awaiting model step",
            Stage::Dispatching => "dispatching",
            Stage::Ended => "ended",
        })
    }
}

/// What the loop does after a step has been handled.
enum Flow {
    Continue,
    Finish(String),
}

impl Agent {
    pub(super) async fn run_query(
        &mut self,
        query: &str,
    ) -> Result<String, AgentError> {
        self.transcript.push_user_query(query);

        for step_index in 0..self.max_steps {
            self.stage = Stage::AwaitingModelStep;
            let step = self.next_step().await?;
            trace!("step {step_index}: {step:?}");

            if let Flow::Finish(content) = self.handle_step(step).await? {
                return Ok(content);
            }
        }

        warn!("no result after {} steps", self.max_steps);
        Err(AgentError::BudgetExceeded {
            max_steps: self.max_steps,
        })
    }

    async fn next_step(&mut self) -> Result<Step, AgentError> {
        let request = ModelRequest {
            messages: self.transcript.to_messages(),
            response_format: self.response_format,
        };
        let resp = self.model_client.send_request(request).await?;
        if resp.finish_reason == Some(ModelFinishReason::Length) {
            warn!("model reply was truncated");
        }

        let step = Step::parse(&resp.text).inspect_err(|err| {
            warn!("rejected model reply ({err}): {}", resp.text);
        })?;
        Ok(step)
    }

    async fn handle_step(&mut self, step: Step) -> Result<Flow, AgentError> {
        if let Step::Observe { .. } = step {
            // Observations only come from tools.
            warn!("model emitted an observation");
            return Err(StepError::SchemaViolation(
                "observe steps are produced by tools, not the model"
                    .to_owned(),
            )
            .into());
        }

        self.transcript.push_model_step(&step);
        self.notify(&step);

        match step {
            Step::Start { .. } | Step::Plan { .. } => Ok(Flow::Continue),
            Step::Result { content } => Ok(Flow::Finish(content)),
            Step::Action(action) => {
                self.dispatch(action).await?;
                Ok(Flow::Continue)
            }
            Step::Observe { .. } => Ok(Flow::Continue),
        }
    }

    async fn dispatch(&mut self, action: Action) -> Result<(), AgentError> {
        let Action {
            function, input, ..
        } = action;

        let tool = match self.registry.resolve(&function) {
            Ok(tool) => tool,
            Err(err) => {
                warn!("{err}, policy: {:?}", self.unknown_tool_policy);
                match self.unknown_tool_policy {
                    UnknownToolPolicy::Skip => return Ok(()),
                    UnknownToolPolicy::Observe => {
                        self.observe(format!("Error: {err}"));
                        return Ok(());
                    }
                    UnknownToolPolicy::FailTurn => return Err(err.into()),
                }
            }
        };

        self.stage = Stage::Dispatching;
        let output = tool.invoke(input).await;
        self.observe(output);
        Ok(())
    }

    fn observe(&mut self, output: String) {
        let step = Step::observation(output);
        self.transcript.push_model_step(&step);
        self.notify(&step);
    }

    #[inline]
    fn notify(&self, step: &Step) {
        if let Some(on_step) = &self.on_step {
            on_step(step);
        }
    }
}
