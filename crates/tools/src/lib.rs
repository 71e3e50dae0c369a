//! Built-in tools for Loopwright agents.
//!
//! - `terminate` signals that the task is complete
//! - `file_saver` writes text files under a workspace directory

pub mod file_saver;
pub mod terminate;

use std::path::PathBuf;

use loopwright_core::tool::ToolRegistry;

pub use file_saver::FileSaverTool;
pub use terminate::TerminateTool;

/// Create a registry with every built-in tool.
///
/// `file_saver` resolves relative paths against `workspace_dir`.
pub fn default_registry(workspace_dir: impl Into<PathBuf>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(file_saver::FileSaverTool::new(workspace_dir)));
    registry.register(Box::new(terminate::TerminateTool));
    registry
}
