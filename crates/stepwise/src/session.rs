use std::fmt::{self, Display};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use stepwise_core::tool::{Approval, ToolDescriptor};
use stepwise_core::{
    Agent, AgentBuilder, AgentError, Reply, Stage, Step, Transcript,
    UnknownToolPolicy,
};
use stepwise_model::ModelProvider;

use crate::tools::*;

/// The placeholder in a profile prompt replaced by the host OS name.
pub const HOST_OS_PLACEHOLDER: &str = "{{HOST_OS}}";

/// A preset combination of tools and instructions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Profile {
    /// A terminal assistant that runs commands.
    #[default]
    Terminal,
    /// A weather assistant.
    Weather,
    /// A coding assistant that scaffolds projects and edits files.
    Coding,
}

impl Profile {
    /// All profiles, in the order they are listed to users.
    pub const ALL: [Profile; 3] =
        [Profile::Terminal, Profile::Weather, Profile::Coding];

    /// Returns the name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Terminal => "terminal",
            Profile::Weather => "weather",
            Profile::Coding => "coding",
        }
    }

    /// Returns the system prompt template of this profile.
    ///
    /// The template contains `{{TOOLS}}` and `{{HOST_OS}}` placeholders.
    pub fn prompt_template(&self) -> &'static str {
        match self {
            Profile::Terminal => include_str!("prompts/terminal.md"),
            Profile::Weather => include_str!("prompts/weather.md"),
            Profile::Coding => include_str!("prompts/coding.md"),
        }
    }
}

impl Display for Profile {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing an unknown profile name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownProfile(String);

impl Display for UnknownProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown profile `{}`, expected one of: ", self.0)?;
        for (i, profile) in Profile::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(profile.as_str())?;
        }
        Ok(())
    }
}

impl std::error::Error for UnknownProfile {}

impl FromStr for Profile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::ALL
            .into_iter()
            .find(|profile| profile.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownProfile(s.to_owned()))
    }
}

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    profile: Profile,
    project_dir: PathBuf,
    weather_url: Option<String>,
    system_prompt: Option<String>,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self {
            agent_builder,
            profile: Profile::default(),
            project_dir: PathBuf::from("."),
            weather_url: None,
            system_prompt: None,
        }
    }

    /// Selects the tools and instructions of the session.
    #[inline]
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Sets the directory file tools and commands work in.
    #[inline]
    pub fn with_project_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.project_dir = dir.into();
        self
    }

    /// Overrides the service the weather tool queries.
    #[inline]
    pub fn with_weather_url<S: Into<String>>(mut self, url: S) -> Self {
        self.weather_url = Some(url.into());
        self
    }

    /// Replaces the profile's system prompt template.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets how many model steps one query may take.
    #[inline]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.agent_builder = self.agent_builder.with_max_steps(max_steps);
        self
    }

    /// Sets what happens when the model calls an unknown tool.
    #[inline]
    pub fn with_unknown_tool_policy(
        mut self,
        policy: UnknownToolPolicy,
    ) -> Self {
        self.agent_builder =
            self.agent_builder.with_unknown_tool_policy(policy);
        self
    }

    /// Sets how long transient model errors are retried.
    #[inline]
    pub fn with_retry_window(mut self, retry_window: Duration) -> Self {
        self.agent_builder = self.agent_builder.with_retry_window(retry_window);
        self
    }

    /// Attaches a callback to be invoked for every step of the agent.
    #[inline]
    pub fn on_step(
        mut self,
        on_step: impl Fn(&Step) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_step(on_step);
        self
    }

    /// Attaches a callback to be invoked when a tool call request is received.
    #[inline]
    pub fn on_tool_call_request(
        mut self,
        on_tool_call_request: impl Fn(Approval) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self
            .agent_builder
            .on_tool_call_request(on_tool_call_request);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let Self {
            agent_builder,
            profile,
            project_dir,
            weather_url,
            system_prompt,
        } = self;

        let mut agent_builder = match profile {
            Profile::Terminal => agent_builder
                .with_tool(ExecuteCommandTool::new(&project_dir))
                .with_tool(ExecuteShellCommandTool::new(&project_dir)),
            Profile::Weather => agent_builder.with_tool(match weather_url {
                Some(url) => GetWeatherTool::with_base_url(url),
                None => GetWeatherTool::new(),
            }),
            Profile::Coding => agent_builder
                .with_tool(ExecuteCommandTool::new(&project_dir))
                .with_tool(ExecuteShellCommandTool::new(&project_dir))
                .with_tool(CreateProjectStructureTool::new(&project_dir))
                .with_tool(WriteCodeToFileTool::new(&project_dir))
                .with_tool(ReadFileTool::new(&project_dir)),
        };

        let prompt = system_prompt
            .as_deref()
            .unwrap_or(profile.prompt_template())
            .replace(HOST_OS_PLACEHOLDER, host_os());
        agent_builder = agent_builder.with_system_prompt(prompt);

        debug!("building {profile} session in {}", project_dir.display());
        Session {
            agent: agent_builder.build(),
            profile,
        }
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The session holds a fully configured agent that you can use directly, and
/// it is basically a wrapper around [`Agent`].
pub struct Session {
    agent: Agent,
    profile: Profile,
}

impl Session {
    /// Sends a line of user input to the session.
    ///
    /// See [`Agent::submit`].
    #[inline]
    pub async fn submit(&mut self, input: &str) -> Result<Reply, AgentError> {
        self.agent.submit(input).await
    }

    /// Returns the profile this session was built with.
    #[inline]
    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn history(&self) -> &Transcript {
        self.agent.history()
    }

    /// Returns what the agent is currently doing.
    #[inline]
    pub fn stage(&self) -> Stage {
        self.agent.stage()
    }

    /// Returns the tools available in this session.
    #[inline]
    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.agent.tools()
    }
}

/// Returns a readable name of the OS this process runs on.
#[inline]
pub fn host_os() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        _ => "some other OS",
    }
}

#[cfg(test)]
mod tests {
    use stepwise_test_model::TestModelProvider;

    use super::*;

    fn tool_names(session: &Session) -> Vec<String> {
        session.tools().into_iter().map(|tool| tool.name).collect()
    }

    #[test]
    fn test_profile_toolsets() {
        let session =
            SessionBuilder::with_model_provider(TestModelProvider::default())
                .build();
        assert_eq!(session.profile(), Profile::Terminal);
        assert_eq!(
            tool_names(&session),
            ["execute_command", "execute_shell_command"]
        );

        let session =
            SessionBuilder::with_model_provider(TestModelProvider::default())
                .with_profile(Profile::Weather)
                .build();
        assert_eq!(tool_names(&session), ["get_weather"]);

        let session =
            SessionBuilder::with_model_provider(TestModelProvider::default())
                .with_profile(Profile::Coding)
                .build();
        assert_eq!(
            tool_names(&session),
            [
                "create_project_structure",
                "execute_command",
                "execute_shell_command",
                "read_file",
                "write_code_to_file",
            ]
        );
    }

    #[test]
    fn test_prompt_placeholders() {
        for profile in Profile::ALL {
            let session = SessionBuilder::with_model_provider(
                TestModelProvider::default(),
            )
            .with_profile(profile)
            .build();

            let prompt = session.history().system_prompt();
            assert!(!prompt.contains("{{"), "{profile}: {prompt}");
            for tool in session.tools() {
                assert!(prompt.contains(&format!("- {}: ", tool.name)));
            }
        }
    }

    #[test]
    fn test_parse_profile() {
        assert_eq!("coding".parse::<Profile>(), Ok(Profile::Coding));
        assert_eq!("Weather".parse::<Profile>(), Ok(Profile::Weather));
        let err = "chef".parse::<Profile>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown profile `chef`, expected one of: terminal, weather, coding"
        );
    }
}
