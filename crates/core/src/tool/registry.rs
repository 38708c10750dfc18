use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use super::object::{ApprovalHandler, ToolObject, ToolObjectImpl};
use super::{Approval, Tool, ToolDescriptor, ToolResult, render_result};

/// The model asked for a tool that isn't registered.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool `{name}`")]
pub struct UnknownToolError {
    /// The requested name.
    pub name: String,
}

/// The set of tools the model may call.
///
/// Every call goes through the registry, which decodes the raw input into
/// the tool's input type and runs the approval gate before the tool body.
#[derive(Default)]
pub struct Registry {
    tools: HashMap<String, Arc<dyn ToolObject>>,
    on_request: Option<ApprovalHandler>,
}

impl Registry {
    /// Registers a tool, replacing any tool with the same name.
    pub fn register<T: Tool>(&mut self, tool: T) {
        let name = tool.name().to_owned();
        if self
            .tools
            .insert(name.clone(), Arc::new(ToolObjectImpl(tool)))
            .is_some()
        {
            debug!("replaced tool: {name}");
        }
    }

    /// Sets the handler that decides on approval requests.
    ///
    /// Without a handler, every request is approved.
    #[inline]
    pub fn on_request<F: Fn(Approval) + Send + Sync + 'static>(
        &mut self,
        on_request: F,
    ) {
        self.on_request = Some(Arc::new(on_request));
    }

    /// Looks up a tool by name.
    pub fn resolve(&self, name: &str) -> Result<ToolHandle, UnknownToolError> {
        let Some(tool) = self.tools.get(name) else {
            return Err(UnknownToolError {
                name: name.to_owned(),
            });
        };
        Ok(ToolHandle {
            tool: Arc::clone(tool),
            on_request: self.on_request.clone(),
        })
    }

    /// Returns descriptors of all tools, sorted by name.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<_> = self
            .tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs a tool by name and returns its output as text.
    ///
    /// This never fails: unknown tools, invalid input, rejections, and tool
    /// errors all come back as an `Error: ...` string.
    pub async fn invoke(&self, name: &str, input: Value) -> String {
        match self.resolve(name) {
            Ok(tool) => tool.invoke(input).await,
            Err(err) => format!("Error: {err}"),
        }
    }
}

/// A resolved tool, ready to be called.
#[derive(Clone)]
pub struct ToolHandle {
    tool: Arc<dyn ToolObject>,
    on_request: Option<ApprovalHandler>,
}

impl ToolHandle {
    /// Returns the name of the tool.
    #[inline]
    pub fn name(&self) -> &str {
        self.tool.name()
    }

    /// Calls the tool with raw model input.
    pub async fn call(&self, input: Value) -> ToolResult {
        let span = debug_span!("tool call", name = self.tool.name());
        let fut = {
            let _enter = span.enter();
            trace!("calling tool with input: {input:?}");
            Arc::clone(&self.tool).execute(input, self.on_request.as_ref())
        };
        fut.instrument(span).await
    }

    /// Calls the tool and renders the result as observation text.
    #[inline]
    pub async fn invoke(&self, input: Value) -> String {
        render_result(self.call(input).await)
    }
}
