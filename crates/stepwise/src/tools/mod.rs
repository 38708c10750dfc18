//! The built-in tools that models can use.
//!
//! Tools that touch the filesystem are bound to a project directory:
//! relative paths from the model are resolved against it, and commands
//! run inside it.

mod project;
mod read_file;
mod shell;
mod weather;

use std::path::{Path, PathBuf};

pub use project::{
    CreateProjectStructureTool, ProjectStructure, WriteCode,
    WriteCodeToFileTool,
};
pub use read_file::{ReadFile, ReadFileTool};
pub use shell::{CommandLine, ExecuteCommandTool, ExecuteShellCommandTool};
pub use weather::{DEFAULT_WEATHER_URL, GetWeatherTool, Location};

#[inline]
fn resolve_path(root: &Path, path: &str) -> PathBuf {
    // `join` keeps absolute paths as they are.
    root.join(path)
}
