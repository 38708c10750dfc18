use std::time::Duration;

use stepwise_model::{ModelProvider, ResponseFormat};

use super::{
    Agent, DEFAULT_MAX_STEPS, DEFAULT_RETRY_WINDOW, Stage, UnknownToolPolicy,
};
use crate::model_client::ModelClient;
use crate::step::Step;
use crate::tool::{Approval, Registry, Tool, render_tool_list};
use crate::transcript::Transcript;

/// The placeholder in a system prompt that is replaced by the tool list.
pub const TOOLS_PLACEHOLDER: &str = "{{TOOLS}}";

const DEFAULT_SYSTEM_PROMPT: &str = include_str!("system_prompt.md");

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    registry: Registry,
    system_prompt: String,
    max_steps: usize,
    unknown_tool_policy: UnknownToolPolicy,
    response_format: ResponseFormat,
    on_step: Option<Box<dyn Fn(&Step) + Send + Sync>>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        let mut model_client = ModelClient::new(provider);
        model_client.set_retry_window(DEFAULT_RETRY_WINDOW);
        Self {
            model_client,
            registry: Registry::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
            max_steps: DEFAULT_MAX_STEPS,
            unknown_tool_policy: UnknownToolPolicy::default(),
            response_format: ResponseFormat::Json,
            on_step: None,
        }
    }

    /// Sets the system prompt that seeds the transcript.
    ///
    /// Any `{{TOOLS}}` placeholder is replaced by a listing of the
    /// registered tools when the agent is built.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.registry.register(tool);
        self
    }

    /// Sets how many completions one query may take. Values below 1 are
    /// raised to 1.
    #[inline]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Sets what happens when the model calls an unregistered tool.
    #[inline]
    pub fn with_unknown_tool_policy(
        mut self,
        policy: UnknownToolPolicy,
    ) -> Self {
        self.unknown_tool_policy = policy;
        self
    }

    /// Sets how long transient provider errors are retried.
    /// `Duration::ZERO` disables retries.
    #[inline]
    pub fn with_retry_window(mut self, retry_window: Duration) -> Self {
        self.model_client.set_retry_window(retry_window);
        self
    }

    /// Sets the output format requested from the model. Defaults to JSON.
    #[inline]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    /// Attaches a callback invoked for every step appended to the
    /// transcript, including observations.
    #[inline]
    pub fn on_step(
        mut self,
        on_step: impl Fn(&Step) + Send + Sync + 'static,
    ) -> Self {
        self.on_step = Some(Box::new(on_step));
        self
    }

    /// Attaches a callback that decides on tool calls needing approval.
    ///
    /// Without one, every tool call is approved.
    #[inline]
    pub fn on_tool_call_request(
        mut self,
        on_request: impl Fn(Approval) + Send + Sync + 'static,
    ) -> Self {
        self.registry.on_request(on_request);
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Agent {
        let Self {
            model_client,
            registry,
            system_prompt,
            max_steps,
            unknown_tool_policy,
            response_format,
            on_step,
        } = self;

        let system_prompt = system_prompt
            .replace(TOOLS_PLACEHOLDER, &render_tool_list(&registry.list()));
        debug!("agent built with {} tools", registry.len());

        Agent {
            model_client,
            registry,
            transcript: Transcript::new(system_prompt),
            stage: Stage::AwaitingUserInput,
            max_steps,
            unknown_tool_policy,
            response_format,
            on_step,
        }
    }
}
