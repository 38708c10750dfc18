use std::env;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use stepwise_core::tool::{Approval, Error as ToolError, Tool, ToolResult};
use tokio::process::Command;

/// A command line to run through the shell.
#[derive(Deserialize, JsonSchema)]
#[schemars(description = "The command line to run, e.g. `ls -la`.")]
pub struct CommandLine(pub String);

/// Runs a command with the terminal attached and reports its exit code.
pub struct ExecuteCommandTool {
    parameter_schema: Value,
    working_dir: PathBuf,
}

impl ExecuteCommandTool {
    /// The name the model calls this tool by.
    pub const NAME: &'static str = "execute_command";

    /// Creates a tool that runs commands in `working_dir`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(working_dir: P) -> Self {
        Self {
            parameter_schema: schema_for!(CommandLine).to_value(),
            working_dir: working_dir.into(),
        }
    }
}

impl Tool for ExecuteCommandTool {
    type Input = CommandLine;

    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Execute a command on the operating system. The output goes \
         straight to the user's terminal; only the exit code is returned."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn make_approval(&self, input: &CommandLine) -> Option<Approval> {
        Some(Approval::new(&input.0, "Agent wants to run the command"))
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: CommandLine,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let mut command = shell_command(&input.0);
        command
            .current_dir(&self.working_dir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        async move {
            let status = command.status().await.map_err(execution_error)?;
            Ok(match status.code() {
                Some(code) => code.to_string(),
                None => "terminated by signal".to_owned(),
            })
        }
    }
}

/// Runs a command and returns what it printed.
pub struct ExecuteShellCommandTool {
    parameter_schema: Value,
    working_dir: PathBuf,
}

impl ExecuteShellCommandTool {
    /// Creates a tool that runs commands in `working_dir`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(working_dir: P) -> Self {
        Self {
            parameter_schema: schema_for!(CommandLine).to_value(),
            working_dir: working_dir.into(),
        }
    }
}

impl Tool for ExecuteShellCommandTool {
    type Input = CommandLine;

    fn name(&self) -> &str {
        "execute_shell_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. On failure the \
         command's stderr is returned instead."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn make_approval(&self, input: &CommandLine) -> Option<Approval> {
        Some(Approval::new(&input.0, "Agent wants to run the command"))
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: CommandLine,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let mut command = shell_command(&input.0);
        command.current_dir(&self.working_dir).stdin(Stdio::null());
        async move {
            let output = command.output().await.map_err(execution_error)?;
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
            } else {
                Ok(format!(
                    "Command failed with error: {}",
                    String::from_utf8_lossy(&output.stderr)
                ))
            }
        }
    }
}

#[cfg(not(windows))]
fn shell_command(cmdline: &str) -> Command {
    let shell = env::var_os("SHELL").unwrap_or_else(|| "/bin/sh".into());
    let mut command = Command::new(shell);
    command.arg("-c").arg(cmdline);
    command
}

#[cfg(windows)]
fn shell_command(cmdline: &str) -> Command {
    let shell = env::var_os("COMSPEC").unwrap_or_else(|| "cmd.exe".into());
    let mut command = Command::new(shell);
    command.arg("/C").arg(cmdline);
    command
}

#[inline]
fn execution_error(err: io::Error) -> ToolError {
    ToolError::execution_error().with_reason(err.to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_command_output() {
        let tool = ExecuteShellCommandTool::new(".");
        let output = tool
            .execute(CommandLine("echo 'Hello, World!'".to_owned()))
            .await;
        assert_eq!(output.unwrap(), "Hello, World!");

        let output = tool
            .execute(CommandLine("echo oops >&2; exit 3".to_owned()))
            .await;
        assert_eq!(output.unwrap(), "Command failed with error: oops\n");
    }

    #[tokio::test]
    async fn test_command_exit_code() {
        let tool = ExecuteCommandTool::new(".");
        let output = tool.execute(CommandLine("true".to_owned())).await;
        assert_eq!(output.unwrap(), "0");

        let output = tool.execute(CommandLine("exit 7".to_owned())).await;
        assert_eq!(output.unwrap(), "7");
    }

    #[tokio::test]
    async fn test_missing_working_dir() {
        let tool = ExecuteShellCommandTool::new("/definitely/not/here");
        let err = tool
            .execute(CommandLine("ls".to_owned()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), stepwise_core::tool::ErrorKind::ExecutionError);
    }
}
