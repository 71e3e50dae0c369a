//! File saver tool: write or append text to a file under the workspace.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolResult};
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub struct FileSaverTool {
    /// Relative paths are resolved against this directory.
    workspace_dir: PathBuf,
}

impl FileSaverTool {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
        }
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let requested = Path::new(path);
        if requested
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(ToolError::InvalidArguments(format!(
                "Path traversal detected in '{path}'"
            )));
        }
        if requested.is_absolute() {
            Ok(requested.to_path_buf())
        } else {
            Ok(self.workspace_dir.join(requested))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Overwrite,
    Append,
}

impl WriteMode {
    fn parse(raw: Option<&str>) -> Result<Self, ToolError> {
        match raw {
            None | Some("w") => Ok(Self::Overwrite),
            Some("a") => Ok(Self::Append),
            Some(other) => Err(ToolError::InvalidArguments(format!(
                "Unsupported mode '{other}', expected 'w' or 'a'"
            ))),
        }
    }
}

#[async_trait]
impl Tool for FileSaverTool {
    fn name(&self) -> &str {
        "file_saver"
    }

    fn description(&self) -> &str {
        "Save content to a local file. Creates the file and any missing directories; overwrites by default or appends with mode 'a'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path, relative to the workspace or absolute"
                },
                "content": {
                    "type": "string",
                    "description": "The content to save"
                },
                "mode": {
                    "type": "string",
                    "enum": ["w", "a"],
                    "description": "'w' to overwrite (default), 'a' to append"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let mode = WriteMode::parse(arguments["mode"].as_str())?;
        let target = self.resolve(path)?;

        if let Some(parent) = target.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ToolResult::failure(format!(
                "Failed to create directory: {e}"
            )));
        }

        let written = match mode {
            WriteMode::Overwrite => tokio::fs::write(&target, content).await,
            WriteMode::Append => append(&target, content).await,
        };

        match written {
            Ok(()) => {
                debug!(path = %target.display(), bytes = content.len(), ?mode, "Saved file");
                Ok(ToolResult::success(format!(
                    "Content successfully saved to {}",
                    target.display()
                )))
            }
            Err(e) => Ok(ToolResult::failure(format!("Error saving file: {e}"))),
        }
    }
}

async fn append(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}
