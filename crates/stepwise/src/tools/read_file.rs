use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use stepwise_core::tool::{Approval, Tool, ToolResult};
use tokio::fs;

use super::resolve_path;

/// The file to read.
#[derive(Deserialize, JsonSchema)]
pub struct ReadFile {
    #[schemars(description = "Path of the file, relative to the project.")]
    path: String,
}

/// A tool for reading the whole content of a file.
///
/// Failures are reported in the output text, so the model can react to a
/// missing file instead of the call failing.
pub struct ReadFileTool {
    parameter_schema: Value,
    root: PathBuf,
}

impl ReadFileTool {
    /// Creates a tool that reads files under `root`.
    #[inline]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        ReadFileTool {
            parameter_schema: schema_for!(ReadFile).to_value(),
            root: root.into(),
        }
    }
}

impl Tool for ReadFileTool {
    type Input = ReadFile;

    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn make_approval(&self, _input: &ReadFile) -> Option<Approval> {
        None
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ReadFile,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let path = resolve_path(&self.root, &input.path);
        async move {
            Ok(match fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(err) if err.kind() == IoErrorKind::NotFound => {
                    format!("Error: File '{}' not found.", input.path)
                }
                Err(err) => format!("Error reading file: {err}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn read(path: &str) -> ReadFile {
        ReadFile {
            path: path.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_read_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.js"), "console.log('hi');\n")
            .unwrap();
        let tool = ReadFileTool::new(dir.path());

        let first = tool.execute(read("index.js")).await.unwrap();
        let second = tool.execute(read("index.js")).await.unwrap();
        assert_eq!(first, "console.log('hi');\n");
        assert_eq!(first, second);

        let absolute = dir.path().join("index.js");
        let output = tool
            .execute(read(absolute.to_str().unwrap()))
            .await
            .unwrap();
        assert_eq!(output, first);
    }

    #[tokio::test]
    async fn test_read_file_errors() {
        let dir = TempDir::new().unwrap();
        let tool = ReadFileTool::new(dir.path());

        let output = tool.execute(read("missing.txt")).await.unwrap();
        assert_eq!(output, "Error: File 'missing.txt' not found.");

        // A directory can't be read as a file.
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let output = tool.execute(read("src")).await.unwrap();
        assert!(output.starts_with("Error reading file: "), "{output}");
    }
}
