use std::io;
use std::path::PathBuf;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use stepwise_core::tool::{Approval, Error as ToolError, Tool, ToolResult};
use tokio::fs;

use super::resolve_path;

const DEFAULT_BASE: &str = "project";

/// A manifest of folders and empty files to create.
#[derive(Deserialize, JsonSchema)]
pub struct ProjectStructure {
    #[schemars(
        description = "Directory to create everything in, default to `project`."
    )]
    #[serde(default)]
    base: Option<String>,
    #[schemars(description = "Folders to create, relative to `base`.")]
    #[serde(default)]
    folders: Vec<String>,
    #[schemars(
        description = "Empty files to create, relative to `base`. \
                       Existing files are truncated."
    )]
    #[serde(default)]
    files: Vec<String>,
}

impl ProjectStructure {
    #[inline]
    fn base(&self) -> &str {
        self.base.as_deref().unwrap_or(DEFAULT_BASE)
    }
}

/// Scaffolds folders and empty files for a new project.
pub struct CreateProjectStructureTool {
    parameter_schema: Value,
    root: PathBuf,
}

impl CreateProjectStructureTool {
    /// Creates a tool that scaffolds projects under `root`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            parameter_schema: schema_for!(ProjectStructure).to_value(),
            root: root.into(),
        }
    }
}

impl Tool for CreateProjectStructureTool {
    type Input = ProjectStructure;

    fn name(&self) -> &str {
        "create_project_structure"
    }

    fn description(&self) -> &str {
        "Create a project structure: a base directory with the given \
         folders and empty files."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn make_approval(&self, input: &ProjectStructure) -> Option<Approval> {
        let mut summary = format!("{}/", input.base());
        for folder in &input.folders {
            summary.push_str(&format!("\n  {folder}/"));
        }
        for file in &input.files {
            summary.push_str(&format!("\n  {file}"));
        }
        Some(Approval::new(
            summary,
            "Agent wants to create these folders and files",
        ))
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ProjectStructure,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let base_path = resolve_path(&self.root, input.base());
        async move {
            for folder in &input.folders {
                let path = base_path.join(folder);
                fs::create_dir_all(&path).await.map_err(execution_error)?;
                debug!("created folder: {}", path.display());
            }
            for file in &input.files {
                let path = base_path.join(file);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(execution_error)?;
                }
                fs::write(&path, b"").await.map_err(execution_error)?;
                debug!("created file: {}", path.display());
            }
            Ok(format!("Project structure created at {}", input.base()))
        }
    }
}

/// Code to write and where to write it.
#[derive(Deserialize, JsonSchema)]
pub struct WriteCode {
    #[schemars(description = "Path of the file, relative to the project.")]
    path: String,
    #[schemars(description = "The full contents of the file.")]
    code: String,
}

/// Writes (and overwrites) a source file.
pub struct WriteCodeToFileTool {
    parameter_schema: Value,
    root: PathBuf,
}

impl WriteCodeToFileTool {
    /// Creates a tool that writes files under `root`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            parameter_schema: schema_for!(WriteCode).to_value(),
            root: root.into(),
        }
    }
}

impl Tool for WriteCodeToFileTool {
    type Input = WriteCode;

    fn name(&self) -> &str {
        "write_code_to_file"
    }

    fn description(&self) -> &str {
        "Write code to a file, replacing whatever the file contained."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn make_approval(&self, input: &WriteCode) -> Option<Approval> {
        Some(Approval::new(
            format!("{} ({} bytes)", input.path, input.code.len()),
            "Agent wants to write this file",
        ))
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: WriteCode,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let path = resolve_path(&self.root, &input.path);
        async move {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.map_err(execution_error)?;
            }
            fs::write(&path, input.code).await.map_err(execution_error)?;
            debug!("wrote code to: {}", path.display());
            Ok(format!("Code written to {}", input.path))
        }
    }
}

#[inline]
fn execution_error(err: io::Error) -> ToolError {
    ToolError::execution_error().with_reason(err.to_string())
}
