//! Tool call supports.

mod approval;
mod error;
mod object;
mod registry;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use approval::{Approval, ApprovalResult};
pub use error::{Error, ErrorKind};
pub use registry::{Registry, ToolHandle, UnknownToolError};

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access additional information
/// about the current execution context, such as the working directory or the
/// current user. To do this, make the context an immutable state of the tool,
/// which can be set during initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    ///
    /// The raw input from the model is decoded into this type before the
    /// tool runs. A JSON-encoded string is decoded as well, so tools never
    /// have to parse their own payloads.
    type Input: DeserializeOwned + Send;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Returns an approval to present before running with `input`, or
    /// `None` if the call doesn't need one.
    fn make_approval(&self, input: &Self::Input) -> Option<Approval>;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// A registered tool as advertised to the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Name of the tool.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema of the input.
    pub parameters: Value,
}

/// Renders descriptors as a bullet list for a system prompt.
pub fn render_tool_list(descriptors: &[ToolDescriptor]) -> String {
    let mut list = String::new();
    for descriptor in descriptors {
        if !list.is_empty() {
            list.push('\n');
        }
        list.push_str(&format!(
            "- {}: {}\n  Input schema: {}",
            descriptor.name,
            descriptor.description.trim(),
            descriptor.parameters
        ));
    }
    list
}

/// Formats a tool result as observation text.
#[inline]
pub(crate) fn render_result(result: ToolResult) -> String {
    match result {
        Ok(output) => output,
        Err(err) => format!("Error: {err}"),
    }
}
